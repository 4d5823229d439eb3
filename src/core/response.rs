//! 核心响应处理模块

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::core::context::current_request_id;

/// API 响应结构
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub uuid: String,
    /// 0-无错误|1-有错误|2-需确认
    pub error: u8,
    pub message: String,
    pub data: T,
    pub timestamp: i64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            uuid: current_request_id(),
            error: 0,
            message: "Success".to_string(),
            data,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// 使用请求中间件生成的 uuid，便于日志关联
    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = uuid.into();
        self
    }
}

impl ApiResponse<Option<()>> {
    pub fn empty() -> Self {
        Self::success(None)
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, axum::Json(self)).into_response()
    }
}

/// 自定义响应参数
#[derive(Debug, Default)]
pub struct ResponseData<T> {
    pub status: Option<StatusCode>,
    pub error: u8,
    pub error_type: String,
    pub message: String,
    pub data: T,
    /// true 时不记录请求日志
    pub no_log: bool,
}

impl<T: Serialize> IntoResponse for ResponseData<T> {
    fn into_response(self) -> Response {
        let status = self.status.unwrap_or(StatusCode::OK);
        let message = if self.message.is_empty() {
            "Success".to_string()
        } else {
            self.message
        };
        let meta = ResponseMeta::new(self.error, self.error_type, &message);
        let body = ApiResponse {
            uuid: current_request_id(),
            error: self.error,
            message,
            data: self.data,
            timestamp: chrono::Utc::now().timestamp(),
        };
        let mut response = (status, axum::Json(body)).into_response();
        response.extensions_mut().insert(meta);
        if self.no_log {
            response.extensions_mut().insert(NoLog);
        }
        response
    }
}

/// 标记该响应不记录请求日志
#[derive(Debug, Clone, Copy)]
pub struct NoLog;

/// 写入响应扩展的错误信息，供请求日志使用
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseMeta {
    pub error_type: String,
    /// error=1 时的错误信息
    pub err: String,
}

impl ResponseMeta {
    pub fn new(error: u8, error_type: impl Into<String>, message: &str) -> Self {
        Self {
            error_type: error_type.into(),
            err: if error == 1 {
                message.to_string()
            } else {
                String::new()
            },
        }
    }
}
