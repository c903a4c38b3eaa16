//! 认证相关的 HTTP 处理器

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::{get_user_agent, AppState, ClientIp},
    models::{auth::*, response::ApiResponse, user::UserSummary},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use std::sync::Arc;
use validator::Validate;

/// 登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LoginResponse>>, AppError> {
    let Json(req) = payload?;
    req.validate()?;

    let user_agent = get_user_agent(&headers);

    let response = state
        .auth_service
        .login(&req.username, &req.password, &client_ip, user_agent.as_deref())
        .await?;

    Ok(Json(ApiResponse::success(response)))
}

/// 刷新令牌
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<LoginResponse>>, AppError> {
    let Json(req) = payload?;
    let response = state
        .auth_service
        .refresh(&req.refresh_token)
        .await
        .map_err(AppError::into_refresh_failure)?;

    Ok(Json(ApiResponse::success(response)))
}

/// 校验令牌（供其他服务调用）
pub async fn validate_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TokenValidationRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<TokenValidationResponse>>, AppError> {
    let Json(req) = payload?;
    Ok(Json(ApiResponse::success(
        state.auth_service.validate(&req.token),
    )))
}

/// 获取当前用户信息
pub async fn get_current_user(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<Json<ApiResponse<UserSummary>>, AppError> {
    let user = state
        .auth_service
        .current_user(&auth_context.username)
        .await?;

    Ok(Json(ApiResponse::success(user)))
}
