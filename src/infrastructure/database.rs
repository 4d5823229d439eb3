//! 数据库基础设施

use futures::future::BoxFuture;
use serde::Serialize;
use sqlx::{
    postgres::{PgPool, PgPoolOptions, PgRow},
    FromRow, PgConnection, Postgres, QueryBuilder,
};
use std::time::Duration;
use tracing::{info, warn};

use crate::core::error::{CoreError, CoreResult};
use crate::db::query::{check_identifier, Filter, SqlValue};
use crate::infrastructure::config::DatabaseConfig;
use crate::utils::diff::DiffBox;

pub struct DatabaseManager {
    pool: PgPool,
}

impl DatabaseManager {
    pub async fn new(config: &DatabaseConfig) -> CoreResult<Self> {
        let mut config = config.clone();
        config.apply_defaults();

        let pool = PgPoolOptions::new()
            .max_connections(config.max_open_conns)
            .min_connections(config.max_idle_conns.min(config.max_open_conns))
            .acquire_timeout(Duration::from_secs(8))
            .max_lifetime(Duration::from_secs(60 * 60))
            .connect(&config.url())
            .await?;

        info!("数据库连接成功: {}", config.display_addr());
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn api(&self) -> DbApi {
        DbApi::new(self.pool.clone())
    }
}

/// 表字段信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableColumn {
    pub column: String,
    #[serde(rename = "type")]
    pub column_type: String,
    pub comment: String,
}

/// 把 postgres 的字段类型归并为 number、string、datetime
pub fn normalize_column_type(data_type: &str) -> String {
    let lower = data_type.to_lowercase();
    match lower.as_str() {
        "smallint" | "integer" | "bigint" | "int" | "int2" | "int4" | "int8" | "numeric"
        | "decimal" | "real" | "double precision" | "float4" | "float8" => "number".to_string(),
        "character varying" | "varchar" | "character" | "char" | "text" => "string".to_string(),
        t if t.starts_with("timestamp") || t == "date" => "datetime".to_string(),
        _ => data_type.to_string(),
    }
}

/// 常用数据库操作
#[derive(Clone)]
pub struct DbApi {
    pool: PgPool,
}

impl DbApi {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 是否存在 `column = value` 的记录
    pub async fn exists(
        &self,
        table: &'static str,
        column: &'static str,
        value: impl Into<SqlValue>,
    ) -> CoreResult<bool> {
        check_identifier(table)?;
        check_identifier(column)?;
        let filter = Filter::new().equal(column, value);
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT EXISTS(SELECT 1 FROM {}", table));
        filter.push_where(&mut builder);
        builder.push(")");
        let exists: bool = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(exists)
    }

    /// 按主键读取，不存在时返回业务错误
    pub async fn fetch_by_id<T>(&self, table: &'static str, id: i64) -> CoreResult<T>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        check_identifier(table)?;
        let sql = format!("SELECT * FROM {} WHERE id = $1", table);
        sqlx::query_as::<_, T>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| CoreError::business("记录不存在"))
    }

    /// 读取记录并以其初始化变更比对
    pub async fn fetch_by_id_with_diff<T>(
        &self,
        table: &'static str,
        id: i64,
    ) -> CoreResult<(T, DiffBox<T>)>
    where
        T: for<'r> FromRow<'r, PgRow> + Serialize + Clone + Send + Unpin,
    {
        let row: T = self.fetch_by_id(table, id).await?;
        let diff = DiffBox::new(row.clone());
        Ok((row, diff))
    }

    /// 存在下级记录时不允许删除
    pub async fn check_has_child(&self, table: &'static str, id: i64) -> CoreResult<()> {
        if self.exists(table, "pid", id).await? {
            return Err(CoreError::business("记录有子项，删除失败"));
        }
        Ok(())
    }

    /// 在事务中执行，闭包返回 Ok 时提交，返回 Err 时回滚
    ///
    /// ```ignore
    /// db.commit(|tx| Box::pin(async move {
    ///     sqlx::query("DELETE FROM org WHERE id = $1").bind(id).execute(&mut *tx).await?;
    ///     Ok(())
    /// })).await?;
    /// ```
    pub async fn commit<F, R>(&self, handler: F) -> CoreResult<R>
    where
        F: for<'t> FnOnce(&'t mut PgConnection) -> BoxFuture<'t, CoreResult<R>>,
        R: Send,
    {
        let mut tx = self.pool.begin().await?;
        match handler(&mut *tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("事务回滚失败: {}", rollback_err);
                }
                Err(err)
            }
        }
    }

    /// 获取表字段
    pub async fn table_columns(&self, table: &str) -> CoreResult<Vec<TableColumn>> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT c.column_name::text,
                   c.data_type::text,
                   COALESCE(pg_catalog.col_description(
                       format('%I.%I', c.table_schema, c.table_name)::regclass::oid,
                       c.ordinal_position::int), '')
            FROM information_schema.columns c
            WHERE c.table_schema = 'public' AND c.table_name = $1
            ORDER BY c.ordinal_position ASC
            "#,
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(column, data_type, comment)| TableColumn {
                column,
                column_type: normalize_column_type(&data_type),
                comment,
            })
            .collect())
    }
}
