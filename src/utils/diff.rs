//! 记录变更比对

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::core::error::CoreResult;

/// 比对时忽略的时间戳字段
const IGNORED_COLUMNS: [&str; 6] = [
    "createdAt",
    "updatedAt",
    "deletedAt",
    "created_at",
    "updated_at",
    "deleted_at",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiffItem {
    pub column: String,
    pub old_value: Value,
    pub new_value: Value,
    pub message: String,
}

impl DiffItem {
    fn new(column: &str, old_value: Value, new_value: Value) -> Self {
        let message = format!(
            "将{}的值[{}]变更为[{}]；",
            column,
            display_value(&old_value),
            display_value(&new_value)
        );
        Self {
            column: column.to_string(),
            old_value,
            new_value,
            message,
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// 保存修改前后的记录并给出字段级差异
#[derive(Debug, Clone)]
pub struct DiffBox<T> {
    pub old: T,
    pub new: Option<T>,
    result: Option<BTreeMap<String, DiffItem>>,
}

impl<T: Serialize> DiffBox<T> {
    pub fn new(old: T) -> Self {
        Self {
            old,
            new: None,
            result: None,
        }
    }

    pub fn set_new(&mut self, value: T) {
        self.new = Some(value);
        self.result = None;
    }

    /// 设置新值并立即比对
    pub fn set_new_and_compare(&mut self, value: T) -> CoreResult<&BTreeMap<String, DiffItem>> {
        self.set_new(value);
        self.compare()
    }

    /// 逐字段比对，只有对象类型的记录会产生差异
    pub fn compare(&mut self) -> CoreResult<&BTreeMap<String, DiffItem>> {
        let mut result = BTreeMap::new();
        if let Some(new) = &self.new {
            let old = serde_json::to_value(&self.old)?;
            let new = serde_json::to_value(new)?;
            if let (Value::Object(old), Value::Object(mut new)) = (old, new) {
                for (column, old_value) in old {
                    if IGNORED_COLUMNS.contains(&column.as_str()) {
                        continue;
                    }
                    let new_value = new.remove(&column).unwrap_or(Value::Null);
                    if old_value != new_value {
                        result.insert(column.clone(), DiffItem::new(&column, old_value, new_value));
                    }
                }
            }
        }
        Ok(self.result.insert(result))
    }

    fn ensure_result(&mut self) -> CoreResult<&BTreeMap<String, DiffItem>> {
        if self.result.is_none() {
            self.compare()?;
        }
        Ok(self.result.get_or_insert_with(BTreeMap::new))
    }

    /// 指定字段是否被修改
    pub fn is_change(&mut self, column: &str) -> CoreResult<bool> {
        Ok(self.ensure_result()?.contains_key(column))
    }

    /// 指定字段被修改时执行回调
    pub fn is_modify<F: FnOnce()>(&mut self, column: &str, callback: F) -> CoreResult<()> {
        if self.is_change(column)? {
            callback();
        }
        Ok(())
    }

    /// 任一字段被修改即为真
    pub fn is_change_or(&mut self, columns: &[&str]) -> CoreResult<bool> {
        let result = self.ensure_result()?;
        Ok(columns.iter().any(|c| result.contains_key(*c)))
    }

    /// 所有字段都被修改才为真，字段列表为空时为假
    pub fn is_change_and(&mut self, columns: &[&str]) -> CoreResult<bool> {
        let result = self.ensure_result()?;
        Ok(!columns.is_empty() && columns.iter().all(|c| result.contains_key(*c)))
    }

    pub fn result(&self) -> Option<&BTreeMap<String, DiffItem>> {
        self.result.as_ref()
    }

    /// 拼接所有变更描述，没有变更时返回"无修改"
    pub fn result_content(&self) -> String {
        let text: String = self
            .result
            .iter()
            .flat_map(|r| r.values())
            .map(|item| item.message.as_str())
            .collect();
        if text.is_empty() {
            "无修改".to_string()
        } else {
            text
        }
    }
}

/// 以旧记录为基础生成新记录并比对，比对结果交给 `after`
pub fn diff<T, B, A>(old: T, before: B, after: A) -> CoreResult<()>
where
    T: Serialize + Clone,
    B: FnOnce(T) -> T,
    A: FnOnce(&mut DiffBox<T>),
{
    let mut diff_box = DiffBox::new(old.clone());
    diff_box.set_new_and_compare(before(old))?;
    after(&mut diff_box);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize)]
    #[serde(rename_all = "camelCase")]
    struct Org {
        id: i64,
        name: String,
        status: i32,
        updated_at: String,
    }

    fn org() -> Org {
        Org {
            id: 1,
            name: "总部".to_string(),
            status: 1,
            updated_at: "2024-01-01 00:00:00".to_string(),
        }
    }

    #[test]
    fn test_compare_changed_fields() {
        let mut diff_box = DiffBox::new(org());
        let mut new = org();
        new.name = "分部".to_string();
        new.updated_at = "2024-02-01 00:00:00".to_string();

        let result = diff_box.set_new_and_compare(new).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result["name"].message, "将name的值[总部]变更为[分部]；");
        assert!(diff_box.is_change("name").unwrap());
        assert!(!diff_box.is_change("updatedAt").unwrap());
    }

    #[test]
    fn test_change_or_and() {
        let mut diff_box = DiffBox::new(org());
        let mut new = org();
        new.name = "分部".to_string();
        new.status = 2;
        diff_box.set_new(new);

        assert!(diff_box.is_change_or(&["id", "status"]).unwrap());
        assert!(diff_box.is_change_and(&["name", "status"]).unwrap());
        assert!(!diff_box.is_change_and(&["name", "id"]).unwrap());
        assert!(!diff_box.is_change_and(&[]).unwrap());
        assert!(!diff_box.is_change_or(&[]).unwrap());
    }

    #[test]
    fn test_result_content_without_change() {
        let mut diff_box = DiffBox::new(org());
        diff_box.set_new_and_compare(org()).unwrap();
        assert_eq!(diff_box.result_content(), "无修改");
    }

    #[test]
    fn test_is_modify_runs_callback() {
        let mut diff_box = DiffBox::new(org());
        let mut new = org();
        new.status = 0;
        diff_box.set_new(new);

        let mut called = false;
        diff_box.is_modify("status", || called = true).unwrap();
        assert!(called);
    }

    #[test]
    fn test_diff_fn() {
        let mut content = String::new();
        diff(
            org(),
            |mut o| {
                o.status = 3;
                o
            },
            |b| content = b.result_content(),
        )
        .unwrap();
        assert_eq!(content, "将status的值[1]变更为[3]；");
    }
}
