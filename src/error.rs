//! 统一错误模型
//! 定义所有错误类型和错误响应格式

use crate::auth::jwt::TokenError;
use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// 登录失败时对外统一的提示，不区分用户不存在与密码错误
pub const AUTHENTICATION_FAILED_MESSAGE: &str = "Invalid username or password";

pub const INVALID_REQUEST_BODY_MESSAGE: &str = "Invalid request body";

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    #[error("Invalid refresh token: {0}")]
    InvalidRefreshToken(TokenError),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Token(_)
            | AppError::InvalidRefreshToken(_)
            | AppError::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 机器可读的错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Token(kind) => kind.code(),
            AppError::InvalidRefreshToken(_) => "INVALID_REFRESH_TOKEN",
            AppError::AuthenticationFailed => "AUTHENTICATION_FAILED",
            AppError::RateLimited { .. } => "RATE_LIMITED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Timeout(_) => "SERVICE_UNAVAILABLE",
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                "INTERNAL_ERROR"
            }
        }
    }

    /// 获取用户友好的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> String {
        match self {
            AppError::Token(kind) => kind.to_string(),
            AppError::InvalidRefreshToken(_) => "Invalid refresh token".to_string(),
            AppError::AuthenticationFailed => AUTHENTICATION_FAILED_MESSAGE.to_string(),
            AppError::RateLimited { retry_after_secs } => format!(
                "Too many failed login attempts. Please try again after {} seconds.",
                retry_after_secs
            ),
            AppError::NotFound(_) => "Resource not found".to_string(),
            AppError::Validation(msg) => msg.clone(),
            AppError::Timeout(_) => "Service temporarily unavailable".to_string(),
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
        }
    }

    /// 获取错误码
    pub fn code(&self) -> u16 {
        self.status_code().as_u16()
    }

    /// 刷新流程中的令牌错误统一包装为 InvalidRefreshToken，保留原始类型
    pub fn into_refresh_failure(self) -> Self {
        match self {
            AppError::Token(kind) => AppError::InvalidRefreshToken(kind),
            other => other,
        }
    }

    // 便捷方法
    pub fn not_found(msg: &str) -> Self {
        AppError::NotFound(msg.to_string())
    }

    pub fn timeout(msg: &str) -> Self {
        AppError::Timeout(msg.to_string())
    }
}

/// 请求体无法解析时不回显 serde 细节
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        AppError::Validation(INVALID_REQUEST_BODY_MESSAGE.to_string())
    }
}

/// 错误响应信封
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    pub status: u16,
    pub error: String,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            date: Some(Utc::now()),
            status: status.as_u16(),
            error: status.canonical_reason().unwrap_or("Unknown").to_string(),
            code: code.to_string(),
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// 转换为 HTTP 响应，状态码取自信封本身
    pub fn into_http_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            AppError::Database(_)
            | AppError::Config(_)
            | AppError::Internal(_)
            | AppError::Timeout(_) => {
                tracing::error!(code = self.code(), error = %self, "Application error");
            }
            _ => {
                tracing::debug!(code = self.code(), error = %self, "Request rejected");
            }
        }

        let body = ErrorResponse::new(status, self.error_code(), self.user_message());
        let mut response = (status, Json(body)).into_response();

        if let AppError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }

        response
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}
