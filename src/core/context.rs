//! 请求上下文辅助：客户端 IP、请求 ID、带校验的参数提取、登录用户信息

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::{request::Parts, HeaderMap},
    Json,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use validator::Validate;

use crate::core::error::CoreError;
use crate::db::ids::UintIds;

/// 获取客户端真实 IP
///
/// 优先 `X-Forwarded-For`（取最后一段），其次 `X-Real-IP`，最后是连接对端地址。
pub fn client_ip(headers: &HeaderMap, remote: Option<SocketAddr>) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    if let Some(forwarded) = header("x-forwarded-for") {
        if let Some(last) = forwarded.split(',').map(str::trim).last() {
            return last.to_string();
        }
    }
    if let Some(real_ip) = header("x-real-ip") {
        return real_ip.to_string();
    }
    remote.map(|addr| addr.ip().to_string()).unwrap_or_default()
}

tokio::task_local! {
    static REQUEST_UUID: String;
}

/// 在请求 uuid 作用域内执行，作用域内生成的响应信封都使用该 uuid
pub async fn with_request_id<F: std::future::Future>(id: String, fut: F) -> F::Output {
    REQUEST_UUID.scope(id, fut).await
}

/// 当前请求的 uuid，不在请求作用域内时生成新的
pub fn current_request_id() -> String {
    REQUEST_UUID
        .try_with(|id| id.clone())
        .unwrap_or_else(|_| uuid::Uuid::new_v4().to_string())
}

/// 每个请求的唯一标识，由 `request_id_middleware` 写入扩展
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for RequestId
where
    S: Send + Sync,
{
    type Rejection = CoreError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestId>()
            .cloned()
            .unwrap_or_else(|| RequestId(current_request_id())))
    }
}

/// 解析 JSON 请求体并执行 validator 校验
#[derive(Debug, Clone)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = CoreError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| CoreError::BadRequest(e.body_text()))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

/// 解析查询参数并执行 validator 校验
#[derive(Debug, Clone)]
pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = CoreError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| CoreError::BadRequest(e.body_text()))?;
        value.validate()?;
        Ok(ValidatedQuery(value))
    }
}

/// 登录用户信息，由鉴权中间件写入扩展
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub user_id: u64,
    pub acc_id: u64,
    pub org_id: u64,
    pub role_ids: UintIds,
    pub real_name: String,
    pub org_name: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = CoreError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| CoreError::Auth("未登录".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_forwarded_last_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("10.0.0.1, 172.16.0.9"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.1"));
        assert_eq!(client_ip(&headers, None), "172.16.0.9");
    }

    #[tokio::test]
    async fn test_current_request_id_scope() {
        let id = with_request_id("req-1".to_string(), async { current_request_id() }).await;
        assert_eq!(id, "req-1");
        assert_ne!(current_request_id(), "req-1");
        assert_eq!(current_request_id().len(), 36);
    }

    #[test]
    fn test_client_ip_fallbacks() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("192.168.1.1"));
        assert_eq!(client_ip(&headers, None), "192.168.1.1");

        let remote: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), Some(remote)), "127.0.0.1");
        assert_eq!(client_ip(&HeaderMap::new(), None), "");
    }
}
