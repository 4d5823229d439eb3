//! 层级记录的路径维护
//!
//! 上下级结构的表包含 `path`（逗号分隔的祖先 id，含自身）与 `len`（层级深度）字段，
//! 修改上级后需要同步更新自身及全部下级。

use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt;

use crate::core::error::{CoreError, CoreResult};

/// 含路径字段的记录
pub trait PathNode: Clone + Send + Sync {
    fn id(&self) -> i64;
    fn pid(&self) -> i64;
    fn path(&self) -> &str;
    fn len(&self) -> i32;
    fn set_path(&mut self, path: String);
    fn set_len(&mut self, len: i32);
}

type RootHook<T> = Box<dyn Fn(&mut T) + Send + Sync>;
type ChildHook<T> = Box<dyn Fn(&mut T, &T) + Send + Sync>;

/// 路径设置选项
pub struct PathOption<T> {
    /// 保存时除 path、len 外额外写入的字段
    pub append_fields: Vec<&'static str>,
    pub root_append: Option<RootHook<T>>,
    pub child_append: Option<ChildHook<T>>,
}

impl<T> Default for PathOption<T> {
    fn default() -> Self {
        Self {
            append_fields: Vec::new(),
            root_append: None,
            child_append: None,
        }
    }
}

impl<T> fmt::Debug for PathOption<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathOption")
            .field("append_fields", &self.append_fields)
            .field("root_append", &self.root_append.is_some())
            .field("child_append", &self.child_append.is_some())
            .finish()
    }
}

impl<T> PathOption<T> {
    pub fn append_fields(mut self, fields: Vec<&'static str>) -> Self {
        self.append_fields = fields;
        self
    }

    pub fn root_append<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut T) + Send + Sync + 'static,
    {
        self.root_append = Some(Box::new(hook));
        self
    }

    pub fn child_append<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut T, &T) + Send + Sync + 'static,
    {
        self.child_append = Some(Box::new(hook));
        self
    }
}

/// 计算节点的 path 与 len，不涉及存储
pub fn apply_path<T: PathNode>(node: &mut T, parent: Option<&T>, option: &PathOption<T>) -> CoreResult<()> {
    if node.pid() > 0 {
        let parent = parent.ok_or_else(|| {
            CoreError::NotFound(format!("上级记录不存在: {}", node.pid()))
        })?;
        node.set_path(format!("{},{}", parent.path(), node.id()));
        node.set_len(parent.len() + 1);
        if let Some(hook) = &option.child_append {
            hook(node, parent);
        }
    } else {
        node.set_path(node.id().to_string());
        node.set_len(1);
        if let Some(hook) = &option.root_append {
            hook(node);
        }
    }
    Ok(())
}

/// 路径数据的读取与保存
#[async_trait]
pub trait PathStore<T: PathNode>: Send {
    async fn fetch(&mut self, id: i64) -> CoreResult<Option<T>>;
    async fn children(&mut self, pid: i64) -> CoreResult<Vec<T>>;
    async fn save_path(&mut self, node: &T, append_fields: &[&'static str]) -> CoreResult<()>;
}

/// 设置节点路径并保存，未传入上级时从存储中读取
pub async fn set_path<T, S>(
    store: &mut S,
    node: &mut T,
    parent: Option<&T>,
    option: &PathOption<T>,
) -> CoreResult<()>
where
    T: PathNode,
    S: PathStore<T> + ?Sized,
{
    let fetched;
    let parent = match parent {
        Some(parent) => Some(parent),
        None if node.pid() > 0 => {
            fetched = store.fetch(node.pid()).await?.ok_or_else(|| {
                CoreError::NotFound(format!("上级记录不存在: {}", node.pid()))
            })?;
            Some(&fetched)
        }
        None => None,
    };
    apply_path(node, parent, option)?;
    store.save_path(node, &option.append_fields).await
}

/// 更新所有下级的路径，一般在修改 pid 后调用
pub async fn set_path_child<T, S>(store: &mut S, node: &T, option: &PathOption<T>) -> CoreResult<()>
where
    T: PathNode,
    S: PathStore<T> + ?Sized,
{
    let mut visited = HashSet::from([node.id()]);
    let mut stack = vec![node.clone()];

    while let Some(parent) = stack.pop() {
        for mut child in store.children(parent.id()).await? {
            if !visited.insert(child.id()) {
                return Err(CoreError::business(format!(
                    "记录存在循环引用: {}",
                    child.id()
                )));
            }
            set_path(store, &mut child, Some(&parent), option).await?;
            stack.push(child);
        }
    }
    Ok(())
}

/// 设置自身路径及全部下级路径
pub async fn set_path_and_child_path<T, S>(
    store: &mut S,
    node: &mut T,
    option: &PathOption<T>,
) -> CoreResult<()>
where
    T: PathNode,
    S: PathStore<T> + ?Sized,
{
    set_path(store, node, None, option).await?;
    set_path_child(store, node, option).await
}

#[cfg(feature = "database")]
pub use pg::{save_path_query, PgPathStore};

#[cfg(feature = "database")]
mod pg {
    use super::{PathNode, PathStore};
    use crate::core::error::{CoreError, CoreResult};
    use crate::db::query::{builder::push_value, check_identifier, SqlValue};
    use async_trait::async_trait;
    use sqlx::{postgres::PgRow, FromRow, PgConnection, Postgres, QueryBuilder};

    type AppendValues<T> = Box<dyn Fn(&T, &'static str) -> Option<SqlValue> + Send + Sync>;

    /// 在事务连接上读写路径
    ///
    /// `append_fields` 对应的值由 `append_values` 提供，按字段原类型绑定。
    pub struct PgPathStore<'c, T> {
        conn: &'c mut PgConnection,
        table: &'static str,
        append_values: Option<AppendValues<T>>,
    }

    impl<'c, T> PgPathStore<'c, T> {
        pub fn new(conn: &'c mut PgConnection, table: &'static str) -> Self {
            Self {
                conn,
                table,
                append_values: None,
            }
        }

        pub fn append_values<F>(mut self, f: F) -> Self
        where
            F: Fn(&T, &'static str) -> Option<SqlValue> + Send + Sync + 'static,
        {
            self.append_values = Some(Box::new(f));
            self
        }
    }

    /// 生成 `UPDATE table SET path = $1, len = $2[, field = $n] WHERE id = $m`
    pub fn save_path_query<T: PathNode>(
        table: &'static str,
        node: &T,
        append_fields: &[&'static str],
        append_values: Option<&(dyn Fn(&T, &'static str) -> Option<SqlValue> + Send + Sync)>,
    ) -> CoreResult<QueryBuilder<'static, Postgres>> {
        check_identifier(table)?;
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("UPDATE {} SET path = ", table));
        builder.push_bind(node.path().to_string());
        builder.push(", len = ");
        builder.push_bind(node.len());
        for field in append_fields {
            check_identifier(field)?;
            let value = append_values
                .and_then(|values| values(node, *field))
                .ok_or_else(|| CoreError::internal(format!("未提供字段的值: {}", field)))?;
            builder.push(format!(", {} = ", field));
            push_value(&mut builder, value);
        }
        builder.push(" WHERE id = ");
        builder.push_bind(node.id());
        Ok(builder)
    }

    #[async_trait]
    impl<'c, T> PathStore<T> for PgPathStore<'c, T>
    where
        T: PathNode + for<'r> FromRow<'r, PgRow> + Unpin + 'static,
    {
        async fn fetch(&mut self, id: i64) -> CoreResult<Option<T>> {
            check_identifier(self.table)?;
            let sql = format!("SELECT * FROM {} WHERE id = $1", self.table);
            let row = sqlx::query_as::<_, T>(&sql)
                .bind(id)
                .fetch_optional(&mut *self.conn)
                .await?;
            Ok(row)
        }

        async fn children(&mut self, pid: i64) -> CoreResult<Vec<T>> {
            check_identifier(self.table)?;
            let sql = format!("SELECT * FROM {} WHERE pid = $1 ORDER BY id", self.table);
            let rows = sqlx::query_as::<_, T>(&sql)
                .bind(pid)
                .fetch_all(&mut *self.conn)
                .await?;
            Ok(rows)
        }

        async fn save_path(&mut self, node: &T, append_fields: &[&'static str]) -> CoreResult<()> {
            let mut builder =
                save_path_query(self.table, node, append_fields, self.append_values.as_deref())?;
            builder.build().execute(&mut *self.conn).await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq)]
    struct Dept {
        id: i64,
        pid: i64,
        path: String,
        len: i32,
        org: String,
    }

    impl PathNode for Dept {
        fn id(&self) -> i64 {
            self.id
        }
        fn pid(&self) -> i64 {
            self.pid
        }
        fn path(&self) -> &str {
            &self.path
        }
        fn len(&self) -> i32 {
            self.len
        }
        fn set_path(&mut self, path: String) {
            self.path = path;
        }
        fn set_len(&mut self, len: i32) {
            self.len = len;
        }
    }

    fn dept(id: i64, pid: i64) -> Dept {
        Dept {
            id,
            pid,
            path: String::new(),
            len: 0,
            org: String::new(),
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        rows: BTreeMap<i64, Dept>,
    }

    #[async_trait]
    impl PathStore<Dept> for MemoryStore {
        async fn fetch(&mut self, id: i64) -> CoreResult<Option<Dept>> {
            Ok(self.rows.get(&id).cloned())
        }

        async fn children(&mut self, pid: i64) -> CoreResult<Vec<Dept>> {
            Ok(self.rows.values().filter(|r| r.pid == pid).cloned().collect())
        }

        async fn save_path(&mut self, node: &Dept, _fields: &[&'static str]) -> CoreResult<()> {
            self.rows.insert(node.id, node.clone());
            Ok(())
        }
    }

    #[test]
    fn test_apply_path_root_and_child() {
        let option = PathOption::default()
            .root_append(|d: &mut Dept| d.org = "root".to_string())
            .child_append(|d: &mut Dept, p: &Dept| d.org = format!("{}-child", p.org));

        let mut root = dept(1, 0);
        apply_path(&mut root, None, &option).unwrap();
        assert_eq!(root.path, "1");
        assert_eq!(root.len, 1);
        assert_eq!(root.org, "root");

        let mut child = dept(5, 1);
        apply_path(&mut child, Some(&root), &option).unwrap();
        assert_eq!(child.path, "1,5");
        assert_eq!(child.len, 2);
        assert_eq!(child.org, "root-child");

        let mut orphan = dept(6, 9);
        assert!(matches!(
            apply_path(&mut orphan, None, &option),
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_move_subtree() {
        let mut store = MemoryStore::default();
        let option = PathOption::default();
        for (id, pid) in [(1, 0), (2, 0), (3, 1), (4, 3)] {
            let mut d = dept(id, pid);
            set_path(&mut store, &mut d, None, &option).await.unwrap();
        }
        assert_eq!(store.rows[&4].path, "1,3,4");

        // 把 3 移动到 2 下
        let mut moved = store.rows[&3].clone();
        moved.pid = 2;
        set_path_and_child_path(&mut store, &mut moved, &option)
            .await
            .unwrap();
        assert_eq!(store.rows[&3].path, "2,3");
        assert_eq!(store.rows[&4].path, "2,3,4");
        assert_eq!(store.rows[&4].len, 3);
    }

    #[tokio::test]
    async fn test_missing_parent() {
        let mut store = MemoryStore::default();
        let mut d = dept(7, 99);
        let err = set_path(&mut store, &mut d, None, &PathOption::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[cfg(feature = "database")]
    #[test]
    fn test_save_path_query_binds_typed_values() {
        use crate::db::query::SqlValue;

        let mut node = dept(5, 1);
        node.path = "1,5".to_string();
        node.len = 2;
        node.org = "总部".to_string();

        let values = |d: &Dept, field: &'static str| match field {
            "org_id" => Some(SqlValue::Int(d.pid * 100)),
            "org_name" => Some(SqlValue::Text(d.org.clone())),
            _ => None,
        };
        let builder = save_path_query("dept", &node, &["org_id", "org_name"], Some(&values)).unwrap();
        assert_eq!(
            builder.sql(),
            "UPDATE dept SET path = $1, len = $2, org_id = $3, org_name = $4 WHERE id = $5"
        );

        let builder = save_path_query::<Dept>("dept", &node, &[], None).unwrap();
        assert_eq!(builder.sql(), "UPDATE dept SET path = $1, len = $2 WHERE id = $3");
    }

    #[cfg(feature = "database")]
    #[test]
    fn test_save_path_query_requires_values() {
        use crate::db::query::SqlValue;

        let node = dept(5, 1);
        let err = save_path_query::<Dept>("dept", &node, &["org_id"], None).err().unwrap();
        assert!(matches!(err, CoreError::Internal(_)));

        let values = |_: &Dept, _: &'static str| -> Option<SqlValue> { None };
        assert!(save_path_query("dept", &node, &["org_id"], Some(&values)).is_err());
        assert!(save_path_query::<Dept>("dept", &node, &["org;drop"], None).is_err());
        assert!(save_path_query::<Dept>("dept x", &node, &[], None).is_err());
    }

    #[tokio::test]
    async fn test_cycle_detected() {
        let mut store = MemoryStore::default();
        store.rows.insert(1, dept(1, 2));
        store.rows.insert(2, dept(2, 1));
        let node = store.rows[&1].clone();
        let err = set_path_child(&mut store, &node, &PathOption::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Business(_)));
    }
}
