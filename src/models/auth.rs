//! Authentication-related models

use super::user::{UserRole, UserSummary};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 64, message = "username must be 1-64 characters"))]
    pub username: String,
    #[validate(length(min = 1, max = 128, message = "password must be 1-128 characters"))]
    pub password: String,
}

/// Login / refresh response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// 访问令牌有效期（毫秒）
    pub expires_in_ms: u64,
    pub user: UserSummary,
}

/// Token refresh request
#[derive(Debug, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Token introspection request
#[derive(Debug, Deserialize)]
pub struct TokenValidationRequest {
    pub token: String,
}

/// Token introspection result
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TokenValidationResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
    pub message: String,
}

impl TokenValidationResponse {
    pub fn valid(username: String, role: UserRole) -> Self {
        Self {
            valid: true,
            username: Some(username),
            role: Some(role),
            message: "Token is valid".to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            username: None,
            role: None,
            message: message.into(),
        }
    }
}
