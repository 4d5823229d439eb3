//! 查询条件构造
//!
//! 所有值都以参数绑定方式传入，列名只接受静态字符串。

use chrono::NaiveDateTime;
use std::fmt;

use crate::core::error::{CoreError, CoreResult};
use crate::utils::time::{DateAt, DateRange};

/// 可绑定的查询参数
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Time(NaiveDateTime),
    IntList(Vec<i64>),
    TextList(Vec<String>),
    BoolList(Vec<bool>),
}

impl SqlValue {
    fn is_empty(&self) -> bool {
        match self {
            SqlValue::Text(v) => v.is_empty(),
            SqlValue::IntList(v) => v.is_empty(),
            SqlValue::TextList(v) => v.is_empty(),
            SqlValue::BoolList(v) => v.is_empty(),
            _ => false,
        }
    }
}

macro_rules! sql_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for SqlValue {
            fn from(value: $ty) -> Self {
                SqlValue::$variant(value.into())
            }
        })*
    };
}

sql_value_from!(
    i64 => Int,
    i32 => Int,
    u32 => Int,
    f64 => Float,
    bool => Bool,
    String => Text,
    &str => Text,
    NaiveDateTime => Time,
    Vec<i64> => IntList,
    Vec<String> => TextList,
    Vec<bool> => BoolList,
);

impl From<u64> for SqlValue {
    fn from(value: u64) -> Self {
        SqlValue::Int(value as i64)
    }
}

impl From<Vec<u64>> for SqlValue {
    fn from(value: Vec<u64>) -> Self {
        SqlValue::IntList(value.into_iter().map(|v| v as i64).collect())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Fragment {
    Sql(String),
    Bind(SqlValue),
}

/// WHERE 条件集合，各条件之间为 AND
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<Vec<Fragment>>,
}

/// 关键词模糊匹配 `%kw%`
pub fn sql_like(keyword: &str) -> String {
    format!("%{}%", keyword.trim())
}

/// 关键词右模糊匹配 `kw%`
pub fn sql_like_right(keyword: &str) -> String {
    format!("{}%", keyword.trim())
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    fn push(mut self, fragments: Vec<Fragment>) -> Self {
        self.conditions.push(fragments);
        self
    }

    fn sql(text: impl Into<String>) -> Fragment {
        Fragment::Sql(text.into())
    }

    /// 追加自定义条件，`?` 按顺序替换为参数，占位数与参数数必须一致
    pub fn raw(self, sql: &'static str, values: Vec<SqlValue>) -> CoreResult<Self> {
        let placeholders = sql.matches('?').count();
        if placeholders != values.len() {
            return Err(CoreError::BadRequest(format!(
                "条件参数数量不匹配: 占位{}个，参数{}个",
                placeholders,
                values.len()
            )));
        }
        let mut fragments = Vec::new();
        let mut values = values.into_iter();
        let mut pieces = sql.split('?').peekable();
        while let Some(piece) = pieces.next() {
            fragments.push(Self::sql(piece));
            if pieces.peek().is_some() {
                if let Some(value) = values.next() {
                    fragments.push(Fragment::Bind(value));
                }
            }
        }
        Ok(self.push(fragments))
    }

    /// 等值条件，`None` 或空字符串不生效
    pub fn eq<V: Into<SqlValue>>(self, column: &'static str, value: Option<V>) -> Self {
        match value.map(Into::into) {
            Some(value) if !value.is_empty() => self.push(vec![
                Self::sql(format!("{} = ", column)),
                Fragment::Bind(value),
            ]),
            _ => self,
        }
    }

    /// 等值条件，值为空也生效
    pub fn equal<V: Into<SqlValue>>(self, column: &'static str, value: V) -> Self {
        self.push(vec![
            Self::sql(format!("{} = ", column)),
            Fragment::Bind(value.into()),
        ])
    }

    fn like_or(self, columns: &[&'static str], pattern: String) -> Self {
        let mut fragments = Vec::new();
        for (i, column) in columns.iter().enumerate() {
            let prefix = if i > 0 { " OR " } else { "" };
            fragments.push(Self::sql(format!("{}{} LIKE ", prefix, column)));
            fragments.push(Fragment::Bind(SqlValue::Text(pattern.clone())));
        }
        self.push(fragments)
    }

    /// 多列 `%kw%` 模糊查询，列之间为 OR
    pub fn like(self, columns: &[&'static str], keyword: &str) -> Self {
        if keyword.trim().is_empty() || columns.is_empty() {
            return self;
        }
        self.like_or(columns, sql_like(keyword))
    }

    /// 多列 `kw%` 右模糊查询
    pub fn like_right(self, columns: &[&'static str], keyword: &str) -> Self {
        if keyword.trim().is_empty() || columns.is_empty() {
            return self;
        }
        self.like_or(columns, sql_like_right(keyword))
    }

    pub fn in_list<V: Into<SqlValue>>(self, column: &'static str, values: V) -> Self {
        let values = values.into();
        if values.is_empty() {
            return self;
        }
        self.push(vec![
            Self::sql(format!("{} = ANY(", column)),
            Fragment::Bind(values),
            Self::sql(")"),
        ])
    }

    pub fn not_in_list<V: Into<SqlValue>>(self, column: &'static str, values: V) -> Self {
        let values = values.into();
        if values.is_empty() {
            return self;
        }
        self.push(vec![
            Self::sql(format!("{} <> ALL(", column)),
            Fragment::Bind(values),
            Self::sql(")"),
        ])
    }

    pub fn between<V: Into<SqlValue>>(self, column: &'static str, range: Option<(V, V)>) -> Self {
        match range {
            Some((start, end)) => self.push(vec![
                Self::sql(format!("{} BETWEEN ", column)),
                Fragment::Bind(start.into()),
                Self::sql(" AND "),
                Fragment::Bind(end.into()),
            ]),
            None => self,
        }
    }

    /// 时间区间，字符串参数在数据库侧转换为 timestamp
    pub fn time_between(self, column: &'static str, date_at: Option<&DateAt>) -> Self {
        match date_at {
            Some(at) => self.push(vec![
                Self::sql(format!("{} BETWEEN ", column)),
                Fragment::Bind(SqlValue::Text(at.start().to_string())),
                Self::sql("::timestamp AND "),
                Fragment::Bind(SqlValue::Text(at.end().to_string())),
                Self::sql("::timestamp"),
            ]),
            None => self,
        }
    }

    /// `开始,结束` 形式的时间区间
    pub fn date_at_string(self, column: &'static str, text: Option<&str>) -> CoreResult<Self> {
        match text {
            Some(text) if !text.trim().is_empty() => {
                let at = DateAt::parse(text)?;
                Ok(self.time_between(column, Some(&at)))
            }
            _ => Ok(self),
        }
    }

    pub fn date_range(self, column: &'static str, range: Option<&DateRange>) -> Self {
        self.between(column, range.map(|r| (r.start, r.end)))
    }

    /// 逗号分隔列包含指定值
    pub fn find_in_set<V: fmt::Display>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.push(vec![
                Fragment::Bind(SqlValue::Text(value.to_string())),
                Self::sql(format!(" = ANY(string_to_array({}, ','))", column)),
            ]),
            None => self,
        }
    }

    /// 逗号分隔列包含任一值
    pub fn find_in_set_any<V: fmt::Display>(self, column: &'static str, values: &[V]) -> Self {
        if values.is_empty() {
            return self;
        }
        let mut fragments = Vec::new();
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                fragments.push(Self::sql(" OR "));
            }
            fragments.push(Fragment::Bind(SqlValue::Text(value.to_string())));
            fragments.push(Self::sql(format!(" = ANY(string_to_array({}, ','))", column)));
        }
        self.push(fragments)
    }

    fn path_fragments(fragments: &mut Vec<Fragment>, column: &'static str, path: &str) {
        fragments.push(Self::sql(format!("({} = ", column)));
        fragments.push(Fragment::Bind(SqlValue::Text(path.to_string())));
        fragments.push(Self::sql(format!(" OR {} LIKE ", column)));
        fragments.push(Fragment::Bind(SqlValue::Text(format!("{},%", path))));
        fragments.push(Self::sql(")"));
    }

    /// 路径自身及其所有下级
    pub fn path(self, column: &'static str, path: &str) -> Self {
        if path.is_empty() {
            return self;
        }
        let mut fragments = Vec::new();
        Self::path_fragments(&mut fragments, column, path);
        self.push(fragments)
    }

    /// 多个路径之间为 OR
    pub fn paths<S: AsRef<str>>(self, column: &'static str, paths: &[S]) -> Self {
        let mut fragments = Vec::new();
        for path in paths.iter().map(AsRef::as_ref).filter(|p| !p.is_empty()) {
            if !fragments.is_empty() {
                fragments.push(Self::sql(" OR "));
            }
            Self::path_fragments(&mut fragments, column, path);
        }
        if fragments.is_empty() {
            return self;
        }
        self.push(fragments)
    }

    /// 未软删除
    pub fn not_deleted(self, column: &'static str) -> Self {
        self.push(vec![Self::sql(format!("{} IS NULL", column))])
    }

    /// 渲染为 `$n` 占位的条件文本和参数列表，`start` 为第一个占位序号
    pub fn to_sql(&self, start: usize) -> (String, Vec<SqlValue>) {
        let mut sql = String::new();
        let mut values = Vec::new();
        for (i, condition) in self.conditions.iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }
            sql.push('(');
            for fragment in condition {
                match fragment {
                    Fragment::Sql(text) => sql.push_str(text),
                    Fragment::Bind(value) => {
                        values.push(value.clone());
                        sql.push_str(&format!("${}", start + values.len() - 1));
                    }
                }
            }
            sql.push(')');
        }
        (sql, values)
    }
}

#[cfg(feature = "database")]
pub(crate) mod builder {
    use super::{Filter, Fragment, SqlValue};
    use sqlx::{Postgres, QueryBuilder};

    pub(crate) fn push_value(builder: &mut QueryBuilder<'_, Postgres>, value: SqlValue) {
        match value {
            SqlValue::Int(v) => builder.push_bind(v),
            SqlValue::Float(v) => builder.push_bind(v),
            SqlValue::Text(v) => builder.push_bind(v),
            SqlValue::Bool(v) => builder.push_bind(v),
            SqlValue::Time(v) => builder.push_bind(v),
            SqlValue::IntList(v) => builder.push_bind(v),
            SqlValue::TextList(v) => builder.push_bind(v),
            SqlValue::BoolList(v) => builder.push_bind(v),
        };
    }

    impl Filter {
        /// 把条件写入查询，存在条件时追加 ` WHERE ...`
        pub fn push_where(&self, builder: &mut QueryBuilder<'_, Postgres>) {
            if self.conditions.is_empty() {
                return;
            }
            builder.push(" WHERE ");
            self.push_conditions(builder);
        }

        /// 查询已有 WHERE 时以 ` AND ...` 追加
        pub fn push_and(&self, builder: &mut QueryBuilder<'_, Postgres>) {
            if self.conditions.is_empty() {
                return;
            }
            builder.push(" AND ");
            self.push_conditions(builder);
        }

        fn push_conditions(&self, builder: &mut QueryBuilder<'_, Postgres>) {
            for (i, condition) in self.conditions.iter().enumerate() {
                if i > 0 {
                    builder.push(" AND ");
                }
                builder.push("(");
                for fragment in condition {
                    match fragment {
                        Fragment::Sql(text) => {
                            builder.push(text);
                        }
                        Fragment::Bind(value) => push_value(builder, value.clone()),
                    }
                }
                builder.push(")");
            }
        }
    }
}

/// 校验列名只包含字母、数字、下划线
pub fn check_identifier(name: &str) -> CoreResult<()> {
    let valid = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(CoreError::business("存在sql注入的风险"))
    }
}
