//! 核心错误处理模块

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::core::context::current_request_id;
use crate::core::response::ResponseMeta;

/// 核心错误类型
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// 业务错误，HTTP 200 + error=1
    #[error("{0}")]
    Business(String),
    /// 需要用户确认的业务提示，HTTP 200 + error=2
    #[error("{0}")]
    Confirm(String),
    #[error("{0}")]
    Database(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

impl CoreError {
    pub fn business(msg: impl Into<String>) -> Self {
        CoreError::Business(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        CoreError::Internal(msg.into())
    }

    /// 响应体中的 error 标记
    pub fn error_flag(&self) -> u8 {
        match self {
            CoreError::Confirm(_) => 2,
            _ => 1,
        }
    }

    /// 响应体中的错误类型描述
    pub fn error_type(&self) -> &'static str {
        match self {
            CoreError::Business(_) | CoreError::Confirm(_) => "业务错误",
            CoreError::Database(_) => "数据库错误",
            CoreError::Auth(_) => "认证错误",
            CoreError::NotFound(_) => "资源不存在",
            CoreError::BadRequest(_) => "参数错误",
            CoreError::Internal(_) => "异常错误",
        }
    }

    /// 除认证失败与参数错误外，均以 HTTP 200 返回，由 error 字段区分
    pub fn status_code(&self) -> StatusCode {
        match self {
            CoreError::Auth(_) => StatusCode::UNAUTHORIZED,
            CoreError::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::OK,
        }
    }
}

/// 错误响应结构
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub uuid: String,
    pub error: u8,
    #[serde(rename = "errorType")]
    pub error_type: String,
    pub message: String,
    pub data: Option<()>,
    pub timestamp: i64,
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if let CoreError::Internal(_) = self {
            error!("内部错误: {}", self);
        }

        let body = ErrorResponse {
            uuid: current_request_id(),
            error: self.error_flag(),
            error_type: self.error_type().to_string(),
            message: self.to_string(),
            data: None,
            timestamp: chrono::Utc::now().timestamp(),
        };
        let meta = ResponseMeta::new(body.error, body.error_type.clone(), &body.message);

        let mut response = (status, axum::Json(body)).into_response();
        response.extensions_mut().insert(meta);
        response
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => CoreError::Business("记录不存在".to_string()),
            other => CoreError::Database(other.to_string()),
        }
    }
}

impl From<redis::RedisError> for CoreError {
    fn from(err: redis::RedisError) -> Self {
        CoreError::Internal(format!("Redis错误: {}", err))
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Internal(format!("JSON处理失败: {}", err))
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Internal(format!("IO错误: {}", err))
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        CoreError::Internal(format!("HTTP请求失败: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for CoreError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        CoreError::Auth(err.to_string())
    }
}

impl From<zip::result::ZipError> for CoreError {
    fn from(err: zip::result::ZipError) -> Self {
        CoreError::Internal(format!("压缩失败: {}", err))
    }
}

impl From<calamine::Error> for CoreError {
    fn from(err: calamine::Error) -> Self {
        CoreError::BadRequest(format!("Excel解析失败: {}", err))
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(err: validator::ValidationErrors) -> Self {
        let messages: Vec<String> = err
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    error
                        .message
                        .as_ref()
                        .map(|msg| msg.to_string())
                        .unwrap_or_else(|| format!("{} 校验失败", field))
                })
            })
            .collect();

        CoreError::BadRequest(messages.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_flags_and_status() {
        assert_eq!(CoreError::business("x").error_flag(), 1);
        assert_eq!(CoreError::Confirm("x".into()).error_flag(), 2);
        assert_eq!(CoreError::business("x").status_code(), StatusCode::OK);
        assert_eq!(
            CoreError::Auth("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            CoreError::Database("x".into()).error_type(),
            "数据库错误"
        );
        assert_eq!(CoreError::internal("x").status_code(), StatusCode::OK);
        assert_eq!(
            CoreError::NotFound("x".into()).status_code(),
            StatusCode::OK
        );
        assert_eq!(
            CoreError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_into_response_meta() {
        let response = CoreError::internal("连接断开").into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let meta = response.extensions().get::<ResponseMeta>().unwrap();
        assert_eq!(meta.error_type, "异常错误");
        assert_eq!(meta.err, "连接断开");
    }

    #[test]
    fn test_display_is_message() {
        let err = CoreError::business("记录有子项，删除失败");
        assert_eq!(err.to_string(), "记录有子项，删除失败");
    }
}
