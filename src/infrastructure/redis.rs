//! Redis 基础设施
//!
//! 所有 key 自动追加配置中的前缀，值统一以 JSON 文本存储。

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use std::time::Duration;
use tracing::info;

use crate::auth::jwt::TicketStore;
use crate::core::error::CoreResult;
use crate::infrastructure::config::RedisConfig;

#[derive(Clone)]
pub struct RedisApi {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisApi {
    /// 建立连接并检测可用性
    pub async fn connect(config: &RedisConfig) -> CoreResult<Self> {
        let mut config = config.clone();
        config.apply_defaults();

        let client = Client::open(config.url())?;
        let conn = ConnectionManager::new(client).await?;
        let api = Self {
            conn,
            prefix: config.prefix.clone(),
        };
        api.ping().await?;
        info!("Redis连接成功: {}", config.display_addr());
        Ok(api)
    }

    pub fn from_manager(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    pub fn build_key(&self, key: &str) -> String {
        build_key(&self.prefix, key)
    }

    /// 读取并反序列化，key 不存在时返回 None
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> CoreResult<Option<T>> {
        let mut conn = self.conn.clone();
        let text: Option<String> = conn.get(self.build_key(key)).await?;
        decode(text)
    }

    /// 写入 JSON 值，`ttl` 为零时不过期
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        let text = serde_json::to_string(value)?;
        let key = self.build_key(key);
        if ttl.is_zero() {
            conn.set::<_, _, ()>(key, text).await?;
        } else {
            conn.set_ex::<_, _, ()>(key, text, ttl.as_secs().max(1) as usize).await?;
        }
        Ok(())
    }

    /// 写入哈希字段，返回是否为新字段
    pub async fn hset<T: Serialize + ?Sized>(&self, key: &str, field: &str, value: &T) -> CoreResult<bool> {
        let mut conn = self.conn.clone();
        let text = serde_json::to_string(value)?;
        let added: i64 = conn.hset(self.build_key(key), field, text).await?;
        Ok(added > 0)
    }

    pub async fn hget<T: DeserializeOwned>(&self, key: &str, field: &str) -> CoreResult<Option<T>> {
        let mut conn = self.conn.clone();
        let text: Option<String> = conn.hget(self.build_key(key), field).await?;
        decode(text)
    }

    /// 删除多个 key，返回实际删除数量
    pub async fn del(&self, keys: &[&str]) -> CoreResult<i64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let keys: Vec<String> = keys.iter().map(|k| self.build_key(k)).collect();
        let removed: i64 = conn.del(keys).await?;
        Ok(removed)
    }

    pub async fn ping(&self) -> CoreResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    /// 供队列等模块直接使用底层连接
    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

pub fn build_key(prefix: &str, key: &str) -> String {
    format!("{}{}", prefix, key)
}

fn decode<T: DeserializeOwned>(text: Option<String>) -> CoreResult<Option<T>> {
    match text {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

#[async_trait]
impl TicketStore for RedisApi {
    async fn save_ticket(&self, key: &str, tk: &str, ttl: Duration) -> CoreResult<()> {
        self.set(key, tk, ttl).await
    }

    async fn load_ticket(&self, key: &str) -> CoreResult<Option<String>> {
        self.get(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_key() {
        assert_eq!(build_key("app:", "user:1"), "app:user:1");
        assert_eq!(build_key("", "user:1"), "user:1");
    }

    #[test]
    fn test_decode() {
        let value: Option<Vec<i32>> = decode(Some("[1,2]".to_string())).unwrap();
        assert_eq!(value, Some(vec![1, 2]));
        let missing: Option<String> = decode(None).unwrap();
        assert!(missing.is_none());
        assert!(decode::<i32>(Some("x".to_string())).is_err());
    }
}
