//! 基础设施层：配置、日志、数据库、缓存、队列、HTTP 客户端

pub mod config;
#[cfg(feature = "database")]
pub mod database;
pub mod http_client;
pub mod logger;
pub mod queue;
pub mod redis;
