//! # backend-kit
//!
//! 业务后端通用工具包：
//! - 核心层：统一错误、响应信封、请求上下文、中间件与路由装配
//! - 基础设施：配置、日志、PostgreSQL、Redis、消息队列、HTTP 客户端
//! - 数据访问：查询条件、分页、层级路径、逗号分隔 id
//! - JWT 签发校验、协程池、对象存储与常用工具函数

pub mod auth;
pub mod core;
pub mod db;
pub mod infrastructure;
pub mod pool;
pub mod storage;
pub mod utils;

pub use crate::core::error::{CoreError, CoreResult};
pub use crate::core::response::ApiResponse;
