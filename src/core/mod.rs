//! 核心层：错误、响应、请求上下文、中间件与路由装配

pub mod context;
pub mod error;
pub mod middleware;
pub mod response;
pub mod router;
