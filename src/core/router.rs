//! 路由装配与服务启动

use axum::{middleware, routing::get, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use crate::core::error::CoreError;
use crate::core::middleware::{
    allow_cross_domain, handle_panic, request_id_middleware, request_logging_middleware,
};
use crate::utils::time::{format_now, DATETIME_FORMAT_CHINESE};

/// 服务启动参数
#[derive(Debug, Clone)]
pub struct RouterHook {
    pub name: String,
    pub port: u16,
    pub copyright: String,
    pub debug: bool,
    /// 请求超时（秒），0 表示不设置
    pub timeout_seconds: u64,
    /// 启动信息中展示的数据库地址
    pub database: Option<String>,
    /// 启动信息中展示的 Redis 地址
    pub redis: Option<String>,
}

impl Default for RouterHook {
    fn default() -> Self {
        Self {
            name: "backend-kit".to_string(),
            port: 8080,
            copyright: String::new(),
            debug: false,
            timeout_seconds: 30,
            database: None,
            redis: None,
        }
    }
}

const ROBOTS_TXT: &str = "User-agent: *\nDisallow: /";

async fn robots() -> &'static str {
    ROBOTS_TXT
}

/// 未匹配的路由以 HTTP 200 + error=1 返回
async fn not_found() -> CoreError {
    CoreError::NotFound("404:Not Found".to_string())
}

/// 在业务路由外层装配通用能力：robots、404、panic 恢复、请求 ID、请求日志、跨域、超时
pub fn build_router(hook: &RouterHook, routes: Router) -> Router {
    let mut router = routes
        .route("/robots.txt", get(robots))
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(allow_cross_domain());

    if hook.timeout_seconds > 0 {
        router = router.layer(TimeoutLayer::new(Duration::from_secs(hook.timeout_seconds)));
    }
    if hook.debug {
        router = router.layer(TraceLayer::new_for_http());
    }
    router
}

/// 输出启动信息
pub fn print_banner(hook: &RouterHook) {
    info!("+------------------------------------------------------------+");
    info!("+ 项目名称：{}", hook.name);
    info!("+ 服务端口：{}", hook.port);
    info!("+ 调试模式：{}", hook.debug);
    if let Some(database) = &hook.database {
        info!("+ Database：{}", database);
    }
    if let Some(redis) = &hook.redis {
        info!("+ Redis：{}", redis);
    }
    info!("+ 接口地址：http://0.0.0.0:{}", hook.port);
    info!("+ 启动时间：{}", format_now(DATETIME_FORMAT_CHINESE));
    if !hook.copyright.is_empty() {
        info!("+ 技术支持：{}", hook.copyright);
    }
    info!("+------------------------------------------------------------+");
}

/// 绑定端口并启动服务
pub async fn serve(hook: &RouterHook, router: Router) -> anyhow::Result<()> {
    let router = build_router(hook, router);
    let listener = TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], hook.port))).await?;
    print_banner(hook);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
