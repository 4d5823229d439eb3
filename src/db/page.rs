//! 分页查询

use serde::{Deserialize, Serialize};

use crate::core::error::{CoreError, CoreResult};
use crate::db::query::check_identifier;

const DEFAULT_SIZE: i64 = 10;

/// 分页参数
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Limit {
    pub page: i64,
    pub size: i64,
}

impl Limit {
    pub fn new(page: i64, size: i64) -> Self {
        Self { page, size }
    }

    pub fn get_page(&self) -> i64 {
        if self.page > 0 {
            self.page
        } else {
            1
        }
    }

    pub fn get_size(&self) -> i64 {
        if self.size > 0 {
            self.size
        } else {
            DEFAULT_SIZE
        }
    }

    /// 溢出时取最大值，超出总数的页返回空列表
    pub fn offset(&self) -> i64 {
        (self.get_page() - 1).saturating_mul(self.get_size())
    }
}

/// 排序参数
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "sortField")]
    pub column: String,
    #[serde(rename = "sortOrder")]
    pub sort: String,
}

impl Order {
    pub fn new(column: impl Into<String>, sort: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            sort: sort.into(),
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self::new(column, "desc")
    }

    /// 生成排序片段，字段与方向均需通过校验
    pub fn handle_column(&self) -> CoreResult<String> {
        let sort = self.sort.to_lowercase();
        if sort != "asc" && sort != "desc" {
            return Err(CoreError::business("存在sql注入的风险"));
        }
        let columns = self
            .column
            .split('.')
            .map(|item| check_identifier(item).map(|_| format!("\"{}\"", item)))
            .collect::<CoreResult<Vec<_>>>()?;
        Ok(format!("{} {}", columns.join("."), sort))
    }
}

/// 拼接多个排序，为空时按 id 倒序
pub fn build_order_string(orders: &[Order]) -> CoreResult<String> {
    if orders.is_empty() {
        return Ok("\"id\" desc".to_string());
    }
    let items = orders
        .iter()
        .map(Order::handle_column)
        .collect::<CoreResult<Vec<_>>>()?;
    Ok(items.join(","))
}

/// 前端分页查询参数，字段与查询字符串一一对应
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageQuery {
    pub page: i64,
    pub size: i64,
    #[serde(rename = "sortField")]
    pub sort_field: Option<String>,
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<String>,
}

impl PageQuery {
    pub fn limit(&self) -> Limit {
        Limit::new(self.page, self.size)
    }

    /// 未指定排序方向时按倒序
    pub fn order(&self) -> Option<Order> {
        match self.sort_field.as_deref() {
            Some(column) if !column.is_empty() => Some(Order::new(
                column,
                self.sort_order.as_deref().unwrap_or("desc"),
            )),
            _ => None,
        }
    }
}

/// 分页选项
#[derive(Debug, Clone, Default)]
pub struct PageOption {
    pub query: PageQuery,
    /// 前端未指定排序时使用
    pub default_order: Option<Order>,
    /// 服务端指定的多个排序，优先级低于前端排序
    pub orders: Vec<Order>,
}

impl PageOption {
    pub fn new(query: PageQuery) -> Self {
        Self {
            query,
            ..Default::default()
        }
    }

    pub fn default_order(mut self, order: Order) -> Self {
        self.default_order = Some(order);
        self
    }

    pub fn orders(mut self, orders: Vec<Order>) -> Self {
        self.orders = orders;
        self
    }

    /// 前端排序 > 服务端排序 > 默认排序 > id 倒序
    pub fn build_order_string(&self) -> CoreResult<String> {
        if let Some(order) = self.query.order() {
            return build_order_string(&[order]);
        }
        if !self.orders.is_empty() {
            return build_order_string(&self.orders);
        }
        match &self.default_order {
            Some(order) => build_order_string(std::slice::from_ref(order)),
            None => build_order_string(&[]),
        }
    }
}

/// 分页结果
#[derive(Debug, Clone, Serialize)]
pub struct PageResult<T> {
    pub page: i64,
    pub size: i64,
    pub total: i64,
    pub items: Vec<T>,
}

impl<T> PageResult<T> {
    pub fn empty(limit: &Limit) -> Self {
        Self {
            page: limit.get_page(),
            size: limit.get_size(),
            total: 0,
            items: Vec::new(),
        }
    }

    /// 转换每一条记录
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> PageResult<U> {
        PageResult {
            page: self.page,
            size: self.size,
            total: self.total,
            items: self.items.into_iter().map(f).collect(),
        }
    }
}

/// 统计总数：`SELECT COUNT(*) FROM (<select_sql> WHERE ...) AS t`
#[cfg(feature = "database")]
pub fn count_query(
    select_sql: &str,
    filter: &crate::db::query::Filter,
) -> sqlx::QueryBuilder<'static, sqlx::Postgres> {
    let mut count = sqlx::QueryBuilder::new(format!("SELECT COUNT(*) FROM ({}", select_sql));
    filter.push_where(&mut count);
    count.push(") AS t");
    count
}

/// 当前页：`<select_sql> WHERE ... ORDER BY ... LIMIT $n OFFSET $m`
#[cfg(feature = "database")]
pub fn page_query(
    select_sql: &str,
    filter: &crate::db::query::Filter,
    option: &PageOption,
) -> CoreResult<sqlx::QueryBuilder<'static, sqlx::Postgres>> {
    let limit = option.query.limit();
    let order = option.build_order_string()?;
    let mut query = sqlx::QueryBuilder::new(select_sql);
    filter.push_where(&mut query);
    query.push(format!(" ORDER BY {}", order));
    query.push(" LIMIT ");
    query.push_bind(limit.get_size());
    query.push(" OFFSET ");
    query.push_bind(limit.offset());
    Ok(query)
}

/// 执行分页查询
///
/// `select_sql` 为不带 WHERE 的查询，例如 `SELECT * FROM org`。
/// 先统计总数，总数大于 0 时再按排序取当前页。
#[cfg(feature = "database")]
pub async fn paginate<T>(
    pool: &sqlx::PgPool,
    select_sql: &str,
    filter: &crate::db::query::Filter,
    option: &PageOption,
) -> CoreResult<PageResult<T>>
where
    T: for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> + Send + Unpin,
{
    let limit = option.query.limit();
    let mut result = PageResult::empty(&limit);

    let mut count = count_query(select_sql, filter);
    let total: i64 = count.build_query_scalar().fetch_one(pool).await?;
    result.total = total;

    if total > 0 {
        let mut query = page_query(select_sql, filter, option)?;
        result.items = query.build_query_as::<T>().fetch_all(pool).await?;
    }

    Ok(result)
}
