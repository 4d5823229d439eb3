//! 扁平数据构造树形结构
//!
//! 每行记录先序列化为 JSON 对象，再按 pid 组装，节点附带
//! `hasChild`、`children`、`childCount`、`totalCount` 字段。

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::core::error::CoreResult;

pub type TreeNode = Map<String, Value>;

/// 参与构树的记录
pub trait TreeRow {
    fn id(&self) -> i64;
    fn pid(&self) -> i64;

    /// 是否隐藏，隐藏节点的所有下级同时隐藏
    fn is_hide(&self) -> bool {
        false
    }

    /// 逗号分隔的祖先路径，包含自身；为空时沿 pid 逐级查找上级
    fn path(&self) -> &str {
        ""
    }
}

type ItemHandler = Box<dyn Fn(TreeNode) -> TreeNode + Send + Sync>;

pub struct TreeOption {
    pub pid_name: String,
    /// 为 true 时过滤隐藏节点及其下级
    pub enable: bool,
    pub item_handler: Option<ItemHandler>,
}

impl Default for TreeOption {
    fn default() -> Self {
        Self {
            pid_name: "pid".to_string(),
            enable: false,
            item_handler: None,
        }
    }
}

impl fmt::Debug for TreeOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeOption")
            .field("pid_name", &self.pid_name)
            .field("enable", &self.enable)
            .field("item_handler", &self.item_handler.is_some())
            .finish()
    }
}

impl TreeOption {
    pub fn enable(mut self, enable: bool) -> Self {
        self.enable = enable;
        self
    }

    pub fn pid_name(mut self, name: impl Into<String>) -> Self {
        self.pid_name = name.into();
        self
    }

    pub fn item_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(TreeNode) -> TreeNode + Send + Sync + 'static,
    {
        self.item_handler = Some(Box::new(handler));
        self
    }
}

fn value_to_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_to_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn into_array(nodes: Vec<TreeNode>) -> Value {
    Value::Array(nodes.into_iter().map(Value::Object).collect())
}

/// 过滤掉隐藏节点及其所有下级
///
/// 有路径时按路径判断，否则在全部行中沿 pid 链向上查找，结果与行顺序无关。
fn visible_rows<T: TreeRow>(rows: &[T]) -> Vec<&T> {
    let hidden: HashSet<i64> = rows.iter().filter(|r| r.is_hide()).map(|r| r.id()).collect();
    if hidden.is_empty() {
        return rows.iter().collect();
    }
    let parents: HashMap<i64, i64> = rows.iter().map(|r| (r.id(), r.pid())).collect();

    rows.iter()
        .filter(|row| {
            if hidden.contains(&row.id()) {
                return false;
            }
            let path = row.path().trim();
            if !path.is_empty() {
                return !path
                    .split(',')
                    .filter_map(|p| p.trim().parse::<i64>().ok())
                    .any(|p| hidden.contains(&p));
            }
            !has_hidden_ancestor(row.pid(), &parents, &hidden)
        })
        .collect()
}

fn has_hidden_ancestor(pid: i64, parents: &HashMap<i64, i64>, hidden: &HashSet<i64>) -> bool {
    let mut visited = HashSet::new();
    let mut current = pid;
    while visited.insert(current) {
        if hidden.contains(&current) {
            return true;
        }
        match parents.get(&current) {
            Some(next) => current = *next,
            None => return false,
        }
    }
    false
}

/// 行列表构树
pub fn tree<T: TreeRow + Serialize>(rows: &[T], option: &TreeOption) -> CoreResult<Vec<TreeNode>> {
    let rows: Vec<&T> = if option.enable {
        visible_rows(rows)
    } else {
        rows.iter().collect()
    };

    // 根节点的 pid 不是任何保留行的 id
    let ids: HashSet<i64> = rows.iter().map(|r| r.id()).collect();
    let mut roots: Vec<i64> = Vec::new();
    for row in &rows {
        let pid = row.pid();
        if !ids.contains(&pid) && !roots.contains(&pid) {
            roots.push(pid);
        }
    }

    let list = rows
        .iter()
        .map(|row| -> CoreResult<TreeNode> {
            match serde_json::to_value(row)? {
                Value::Object(map) => Ok(map),
                _ => Ok(TreeNode::new()),
            }
        })
        .collect::<CoreResult<Vec<_>>>()?;

    Ok(tree_builds(&list, &roots, option))
}

/// 依次以多个 id 为上级构树，已构建过的 id 跳过
pub fn tree_builds(list: &[TreeNode], ids: &[i64], option: &TreeOption) -> Vec<TreeNode> {
    let mut result = Vec::new();
    let mut already = Vec::new();
    for id in ids {
        if already.contains(id) {
            continue;
        }
        result.extend(tree_build(list, *id, option, &mut already));
    }
    result
}

/// 构建 `id` 的所有下级
pub fn tree_build(
    list: &[TreeNode],
    id: i64,
    option: &TreeOption,
    already: &mut Vec<i64>,
) -> Vec<TreeNode> {
    let mut ancestors = Vec::new();
    build_children(list, id, option, already, &mut ancestors)
}

fn build_children(
    list: &[TreeNode],
    id: i64,
    option: &TreeOption,
    already: &mut Vec<i64>,
    ancestors: &mut Vec<i64>,
) -> Vec<TreeNode> {
    let mut result = Vec::new();
    ancestors.push(id);

    for row in list {
        if value_to_i64(row.get(&option.pid_name)) != Some(id) {
            continue;
        }
        let row_id = value_to_i64(row.get("id")).unwrap_or_default();
        if ancestors.contains(&row_id) {
            continue;
        }
        if !already.contains(&id) {
            already.push(id);
        }

        let mut node = match &option.item_handler {
            Some(handler) => handler(row.clone()),
            None => row.clone(),
        };

        let children = build_children(list, row_id, option, already, ancestors);
        let child_count = children.len();
        let total_count = 1 + children
            .iter()
            .map(|c| value_to_i64(c.get("totalCount")).unwrap_or(1))
            .sum::<i64>();

        node.insert("hasChild".to_string(), Value::Bool(child_count > 0));
        if child_count > 0 {
            node.insert("children".to_string(), into_array(children));
        }
        node.insert("childCount".to_string(), Value::from(child_count));
        node.insert("totalCount".to_string(), Value::from(total_count));
        result.push(node);
    }

    ancestors.pop();
    result
}

/// 字符串 id 构树，节点的 id 会被替换为新的 uuid
pub fn tree_build_string(list: &[TreeNode], id: &str, pid_name: &str) -> Vec<TreeNode> {
    let mut ancestors = Vec::new();
    build_string_children(list, id, pid_name, &mut ancestors)
}

fn build_string_children(
    list: &[TreeNode],
    id: &str,
    pid_name: &str,
    ancestors: &mut Vec<String>,
) -> Vec<TreeNode> {
    let mut result = Vec::new();
    ancestors.push(id.to_string());

    for row in list {
        if value_to_string(row.get(pid_name)).as_deref() != Some(id) {
            continue;
        }
        let row_id = value_to_string(row.get("id")).unwrap_or_default();
        if ancestors.contains(&row_id) {
            continue;
        }

        let mut node = row.clone();
        let children = build_string_children(list, &row_id, pid_name, ancestors);
        node.insert("hasChild".to_string(), Value::Bool(!children.is_empty()));
        if !children.is_empty() {
            node.insert("children".to_string(), into_array(children));
        }
        node.insert("id".to_string(), Value::String(uuid::Uuid::new_v4().to_string()));
        result.push(node);
    }

    ancestors.pop();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Menu {
        id: i64,
        pid: i64,
        name: &'static str,
        #[serde(skip)]
        hide: bool,
        path: String,
    }

    impl TreeRow for Menu {
        fn id(&self) -> i64 {
            self.id
        }
        fn pid(&self) -> i64 {
            self.pid
        }
        fn is_hide(&self) -> bool {
            self.hide
        }
        fn path(&self) -> &str {
            &self.path
        }
    }

    fn menu(id: i64, pid: i64, path: &str, hide: bool) -> Menu {
        Menu {
            id,
            pid,
            name: "m",
            hide,
            path: path.to_string(),
        }
    }

    #[test]
    fn test_tree_counts() {
        let rows = vec![
            menu(1, 0, "1", false),
            menu(2, 1, "1,2", false),
            menu(3, 2, "1,2,3", false),
            menu(4, 1, "1,4", false),
        ];
        let result = tree(&rows, &TreeOption::default()).unwrap();
        assert_eq!(result.len(), 1);
        let root = &result[0];
        assert_eq!(root["hasChild"], json!(true));
        assert_eq!(root["childCount"], json!(2));
        assert_eq!(root["totalCount"], json!(4));
        let leaf = &root["children"][1];
        assert_eq!(leaf["id"], json!(4));
        assert_eq!(leaf["hasChild"], json!(false));
        assert_eq!(leaf["totalCount"], json!(1));
    }

    #[test]
    fn test_hidden_descendants_order_independent() {
        // 下级出现在隐藏的上级之前
        let rows = vec![
            menu(3, 2, "1,2,3", false),
            menu(1, 0, "1", false),
            menu(2, 1, "1,2", true),
            menu(4, 1, "1,4", false),
        ];
        let result = tree(&rows, &TreeOption::default().enable(true)).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["childCount"], json!(1));
        assert_eq!(result[0]["children"][0]["id"], json!(4));
    }

    #[derive(Serialize)]
    struct Category {
        id: i64,
        pid: i64,
        #[serde(skip)]
        hide: bool,
    }

    impl TreeRow for Category {
        fn id(&self) -> i64 {
            self.id
        }
        fn pid(&self) -> i64 {
            self.pid
        }
        fn is_hide(&self) -> bool {
            self.hide
        }
    }

    #[test]
    fn test_hidden_descendants_without_path() {
        let rows = vec![
            Category { id: 4, pid: 3, hide: false },
            Category { id: 1, pid: 0, hide: false },
            Category { id: 2, pid: 1, hide: true },
            Category { id: 3, pid: 2, hide: false },
            Category { id: 5, pid: 1, hide: false },
        ];
        let result = tree(&rows, &TreeOption::default().enable(true)).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["id"], json!(1));
        assert_eq!(result[0]["childCount"], json!(1));
        assert_eq!(result[0]["children"][0]["id"], json!(5));

        let result = tree(&rows, &TreeOption::default()).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["totalCount"], json!(5));
    }

    #[test]
    fn test_hidden_pid_cycle_terminates() {
        let rows = vec![
            Category { id: 1, pid: 2, hide: false },
            Category { id: 2, pid: 1, hide: false },
            Category { id: 3, pid: 0, hide: true },
        ];
        let visible = visible_rows(&rows);
        assert_eq!(visible.len(), 2);
    }

    #[test]
    fn test_orphan_subtree_becomes_root() {
        let rows = vec![menu(5, 9, "9,5", false), menu(6, 5, "9,5,6", false)];
        let result = tree(&rows, &TreeOption::default()).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["id"], json!(5));
        assert_eq!(result[0]["totalCount"], json!(2));
    }

    #[test]
    fn test_item_handler() {
        let rows = vec![menu(1, 0, "1", false)];
        let option = TreeOption::default().item_handler(|mut node| {
            node.insert("label".to_string(), json!("x"));
            node
        });
        let result = tree(&rows, &option).unwrap();
        assert_eq!(result[0]["label"], json!("x"));
    }

    #[test]
    fn test_cycle_terminates() {
        let list: Vec<TreeNode> = vec![
            json!({"id": 1, "pid": 2}).as_object().unwrap().clone(),
            json!({"id": 2, "pid": 1}).as_object().unwrap().clone(),
        ];
        let mut already = Vec::new();
        let result = tree_build(&list, 1, &TreeOption::default(), &mut already);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["id"], json!(2));
        assert_eq!(result[0]["hasChild"], json!(false));
    }

    #[test]
    fn test_tree_build_string() {
        let list: Vec<TreeNode> = vec![
            json!({"id": "a", "parent": ""}).as_object().unwrap().clone(),
            json!({"id": "b", "parent": "a"}).as_object().unwrap().clone(),
        ];
        let result = tree_build_string(&list, "", "parent");
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["hasChild"], json!(true));
        assert_ne!(result[0]["id"], json!("a"));
        assert_eq!(result[0]["children"][0]["hasChild"], json!(false));
    }
}
