//! 路由注册
//! 创建所有 API 路由并应用中间件

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::{
    auth::middleware::auth_gate_middleware,
    handlers,
    middleware::{request_tracking_middleware, AppState},
};

/// 创建应用路由
///
/// 认证网关包裹所有路由，是否放行由白名单决定
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // 健康检查
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        // 认证
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .route("/api/v1/auth/refresh", post(handlers::auth::refresh_token))
        .route("/api/v1/auth/validate", post(handlers::auth::validate_token))
        .route("/api/v1/auth/me", get(handlers::auth::get_current_user))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_gate_middleware,
        ))
        .layer(middleware::from_fn(request_tracking_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
