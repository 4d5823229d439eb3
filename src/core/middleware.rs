//! 核心中间件模块

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tracing::{error, info, warn};

use crate::auth::jwt::JwtApi;
use crate::core::context::{client_ip, with_request_id, AuthUser, RequestId};
use crate::core::error::CoreError;
use crate::core::response::{NoLog, ResponseMeta};

/// 超过该耗时的接口在日志中标记为慢接口
const SLOW_REQUEST_MS: f64 = 300.0;

/// 请求体超过该大小时不记录日志
const LOG_BODY_LIMIT: usize = 64 * 1024;

/// 为每个请求分配 uuid，写入扩展与响应头，响应信封使用同一个 uuid
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let id = uuid::Uuid::new_v4().to_string();
    req.extensions_mut().insert(RequestId(id.clone()));

    let mut response = with_request_id(id.clone(), next.run(req)).await;
    if let Ok(value) = id.parse() {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}

/// 需要记录的 JSON 请求体长度，非 JSON 或过大时返回 None
fn loggable_body_len(req: &Request) -> Option<usize> {
    let headers = req.headers();
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|h| h.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false);
    let len = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())?;
    (is_json && len <= LOG_BODY_LIMIT).then_some(len)
}

/// 请求日志中间件
///
/// GET 请求记录地址，其它请求额外记录 JSON 请求体；登录用户与错误类型在响应后读取。
pub async fn request_logging_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string());
    let remote = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let ip = client_ip(req.headers(), remote);
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();

    let (req, body) = if method != Method::GET && loggable_body_len(&req).is_some() {
        let (parts, body) = req.into_parts();
        let bytes = match axum::body::to_bytes(body, LOG_BODY_LIMIT).await {
            Ok(bytes) => bytes,
            Err(err) => {
                return CoreError::BadRequest(format!("读取请求体失败: {}", err)).into_response()
            }
        };
        let text = String::from_utf8_lossy(&bytes).into_owned();
        (Request::from_parts(parts, Body::from(bytes)), text)
    } else {
        (req, String::new())
    };

    let response = next.run(req).await;
    if response.extensions().get::<NoLog>().is_some() {
        return response;
    }

    let user = response
        .extensions()
        .get::<AuthUser>()
        .map(|u| u.real_name.clone())
        .unwrap_or_default();
    let meta = response
        .extensions()
        .get::<ResponseMeta>()
        .cloned()
        .unwrap_or_default();

    let status = response.status();
    let millis = start.elapsed().as_secs_f64() * 1000.0;
    let mut duration = format!("{:.3}ms", millis);
    let slow = millis > SLOW_REQUEST_MS;
    if slow {
        duration.push_str(":慢接口");
    }
    let line = format!(
        "{} {} - {} - {} - Body: {} - Err: {} - ErrType: {} - User-Agent: {:?} - IP: {} - User: {}",
        method, uri, status, duration, body, meta.err, meta.error_type, user_agent, ip, user
    );
    if slow {
        warn!(uuid = %request_id, "{}", line);
    } else {
        info!(uuid = %request_id, "{}", line);
    }

    response
}

/// 处理器 panic 时转换为异常错误响应
///
/// 使用方式：`tower_http::catch_panic::CatchPanicLayer::custom(handle_panic)`
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "未知异常".to_string()
    };
    error!("请求处理异常: {}", message);
    CoreError::Internal(message).into_response()
}

/// 允许跨域访问
pub fn allow_cross_domain() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([
            Method::POST,
            Method::GET,
            Method::OPTIONS,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::CONTENT_LENGTH,
            header::ACCEPT_ENCODING,
            header::HeaderName::from_static("x-csrf-token"),
            header::AUTHORIZATION,
        ])
}

/// 读取 `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// JWT 鉴权中间件，校验通过后把 `AuthUser` 写入请求扩展，同时写入响应扩展供请求日志读取
///
/// 使用方式：`axum::middleware::from_fn_with_state(jwt, jwt_auth)`
pub async fn jwt_auth(
    State(jwt): State<Arc<JwtApi<AuthUser>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, CoreError> {
    let token = bearer_token(req.headers())
        .map(str::to_string)
        .ok_or_else(|| CoreError::Auth("缺少认证信息".to_string()))?;

    let user = jwt.check(&token).await?.business;
    req.extensions_mut().insert(user.clone());

    let mut response = next.run(req).await;
    response.extensions_mut().insert(user);
    Ok(response)
}
