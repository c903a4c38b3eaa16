//! 请求认证网关
//!
//! 白名单路径与 OPTIONS 请求直接放行；其余请求必须携带有效的访问令牌。
//! 访问令牌过期且附带有效刷新令牌时，网关签发新的访问令牌并写入响应体，
//! 本次请求不会继续执行，客户端需用新令牌重新发起。

use crate::{
    auth::jwt::TokenError,
    error::{AppError, ErrorResponse},
    middleware::AppState,
    models::user::UserRole,
    services::auth_service::TOKEN_TYPE_BEARER,
};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;

pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";

pub const TOKEN_MISSING_CODE: &str = "TOKEN_MISSING";
pub const TOKEN_INVALID_CODE: &str = "TOKEN_INVALID";
pub const TOKEN_REFRESHED_CODE: &str = "TOKEN_REFRESHED";

const TOKEN_MISSING_MESSAGE: &str = "Token not present";
const TOKEN_INVALID_MESSAGE: &str = "Invalid token, please log in again";
const TOKEN_REFRESHED_MESSAGE: &str = "Access token expired and was reissued, retry with the new token";

/// 认证上下文（附加到请求扩展）
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub username: String,
    pub role: UserRole,
}

// 实现 FromRequestParts 以便在 handler 中直接提取 AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::Token(TokenError::Invalid))
    }
}

/// 免认证路径：精确匹配或 `prefix/**` 前缀匹配
#[derive(Debug, Clone, Default)]
pub struct PathAllowList {
    exact: Vec<String>,
    prefixes: Vec<String>,
}

impl PathAllowList {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            match pattern.strip_suffix("/**") {
                Some(prefix) => list.prefixes.push(prefix.to_string()),
                None => list.exact.push(pattern.to_string()),
            }
        }
        list
    }

    pub fn matches(&self, path: &str) -> bool {
        if self.exact.iter().any(|p| p == path) {
            return true;
        }

        // 前缀按路径段匹配，/api/v1/auth/** 不匹配 /api/v1/authz
        self.prefixes.iter().any(|prefix| {
            path == prefix
                || path
                    .strip_prefix(prefix.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        })
    }
}

/// 从 Authorization 头提取 Bearer 令牌
pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
}

/// 从 x-refresh-token 头提取刷新令牌，兼容 Bearer 前缀
pub fn extract_refresh_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REFRESH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.strip_prefix("Bearer ").unwrap_or(s).trim())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
}

/// 认证网关中间件，所有失败都在此处写出响应并终止
pub async fn auth_gate_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    if req.method() == Method::OPTIONS || state.public_paths.matches(req.uri().path()) {
        return next.run(req).await;
    }

    let access_token = extract_bearer(req.headers());
    let refresh_token = extract_refresh_token(req.headers());

    if access_token.is_none() && refresh_token.is_none() {
        tracing::debug!(path = %req.uri().path(), "No token presented");
        return token_missing();
    }

    let Some(access_token) = access_token else {
        return token_invalid();
    };

    match state.jwt_service.validate_access_token(&access_token) {
        Ok(claims) => {
            req.extensions_mut().insert(AuthContext {
                username: claims.sub,
                role: claims.role,
            });
            next.run(req).await
        }
        Err(TokenError::Expired) => match refresh_token {
            Some(refresh_token) => soft_refresh(&state, &refresh_token).await,
            None => token_invalid(),
        },
        Err(_) => token_invalid(),
    }
}

/// 访问令牌过期时用刷新令牌换发新令牌，结果写入响应体
async fn soft_refresh(state: &AppState, refresh_token: &str) -> Response {
    match state.auth_service.reissue_access_token(refresh_token).await {
        Ok(access_token) => {
            tracing::info!("Access token reissued from refresh token");
            ErrorResponse::new(
                StatusCode::UNAUTHORIZED,
                TOKEN_REFRESHED_CODE,
                TOKEN_REFRESHED_MESSAGE,
            )
            .with_data(json!({
                "access_token": access_token,
                "token_type": TOKEN_TYPE_BEARER,
            }))
            .into_http_response()
        }
        Err(AppError::Token(_)) | Err(AppError::InvalidRefreshToken(_)) => token_invalid(),
        Err(e) => e.into_response(),
    }
}

fn token_missing() -> Response {
    ErrorResponse::new(StatusCode::UNAUTHORIZED, TOKEN_MISSING_CODE, TOKEN_MISSING_MESSAGE)
        .into_http_response()
}

fn token_invalid() -> Response {
    ErrorResponse::new(StatusCode::UNAUTHORIZED, TOKEN_INVALID_CODE, TOKEN_INVALID_MESSAGE)
        .into_http_response()
}
