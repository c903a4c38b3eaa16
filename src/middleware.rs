//! HTTP 中间件
//! 应用状态、请求追踪、客户端 IP 提取

use crate::{
    auth::{clock::Clock, jwt::JwtService, password::PasswordHasher, PathAllowList},
    config::AppConfig,
    error::AppError,
    repository::{LoginAttemptStore, PgLoginAttemptRepository, PgUserDirectory, UserDirectory},
    services::{AuthService, BlockCache, LoginAttemptService},
};
use axum::{
    extract::{ConnectInfo, FromRequestParts, Request},
    http::{request::Parts, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Instant,
};
use tracing::Instrument;
use uuid::Uuid;

/// 应用状态
///
/// 服务以 Arc 共享，封禁缓存由 LoginAttemptService 独占持有
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    /// 无数据库运行（内存存储）时为 None
    pub db: Option<sqlx::PgPool>,
    pub jwt_service: Arc<JwtService>,
    pub auth_service: Arc<AuthService>,
    pub login_attempts: Arc<LoginAttemptService>,
    pub public_paths: Arc<PathAllowList>,
}

impl AppState {
    /// 由协作方组装应用状态
    pub fn new(
        config: AppConfig,
        db: Option<sqlx::PgPool>,
        users: Arc<dyn UserDirectory>,
        attempt_store: Arc<dyn LoginAttemptStore>,
        clock: Arc<dyn Clock>,
        hasher: PasswordHasher,
    ) -> Result<Self, AppError> {
        let jwt_service = Arc::new(JwtService::with_clock(&config.security, clock.clone())?);

        let login_attempts = Arc::new(LoginAttemptService::new(
            attempt_store,
            Arc::new(BlockCache::new()),
            config.login_attempt.clone(),
            clock.clone(),
        ));

        let auth_service = Arc::new(AuthService::new(
            users,
            login_attempts.clone(),
            jwt_service.clone(),
            hasher,
            clock,
            config.login_attempt.io_timeout(),
        ));

        let public_paths = Arc::new(PathAllowList::new(&config.security.public_paths));

        Ok(Self {
            config,
            db,
            jwt_service,
            auth_service,
            login_attempts,
            public_paths,
        })
    }

    /// PostgreSQL 存储 + 系统时钟
    pub fn with_postgres(config: AppConfig, db: sqlx::PgPool) -> Result<Self, AppError> {
        Self::new(
            config,
            Some(db.clone()),
            Arc::new(PgUserDirectory::new(db.clone())),
            Arc::new(PgLoginAttemptRepository::new(db)),
            Arc::new(crate::auth::clock::SystemClock),
            PasswordHasher::new(),
        )
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    async move {
        let start = Instant::now();

        let mut response = next.run(req).await;

        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        // 指标标签使用有限取值
        let method_name = match method.as_str() {
            "GET" => "GET",
            "POST" => "POST",
            "PUT" => "PUT",
            "DELETE" => "DELETE",
            "PATCH" => "PATCH",
            "OPTIONS" => "OPTIONS",
            _ => "UNKNOWN",
        };
        let status_code = match status {
            200 => "200",
            400 => "400",
            401 => "401",
            404 => "404",
            429 => "429",
            500 => "500",
            503 => "503",
            _ => "other",
        };

        metrics::counter!("http_requests_total", "method" => method_name, "status" => status_code)
            .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            status = status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request completed"
        );

        // 在响应头中回显 trace_id / request_id
        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// 客户端 IP（用于登录记录）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl FromRequestParts<Arc<AppState>> for ClientIp {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());

        Ok(ClientIp(get_client_ip(
            &parts.headers,
            peer,
            state.config.security.trust_proxy,
        )))
    }
}

/// 获取客户端 IP 地址
///
/// 代理头中的值必须能解析为 IP，否则忽略
pub fn get_client_ip(headers: &HeaderMap, peer: Option<String>, trust_proxy: bool) -> String {
    if trust_proxy {
        let proxied =
            header_ip(headers, "x-forwarded-for").or_else(|| header_ip(headers, "x-real-ip"));
        if let Some(ip) = proxied {
            return ip.to_string();
        }
    }

    peer.unwrap_or_else(|| "unknown".to_string())
}

/// 取头部的第一个值（X-Forwarded-For 可能包含多个 IP）
fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    let value = headers.get(name)?.to_str().ok()?;
    value.split(',').next()?.trim().parse().ok()
}

/// 获取 User-Agent
pub fn get_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_or_generate_trace_id() {
        let mut headers = HeaderMap::new();
        headers.insert("x-trace-id", "test-trace-123".parse().unwrap());

        let trace_id = extract_or_generate_trace_id(&headers);
        assert_eq!(trace_id, "test-trace-123");

        let headers = HeaderMap::new();
        let trace_id = extract_or_generate_trace_id(&headers);
        assert!(!trace_id.is_empty());
        assert_ne!(trace_id, "test-trace-123");
    }

    #[test]
    fn test_client_ip_from_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "198.51.100.1".parse().unwrap());

        assert_eq!(get_client_ip(&headers, None, true), "203.0.113.7");
    }

    #[test]
    fn test_client_ip_from_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "198.51.100.1".parse().unwrap());

        assert_eq!(get_client_ip(&headers, None, true), "198.51.100.1");
    }

    #[test]
    fn test_client_ip_rejects_non_ip_values() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "x".repeat(100).parse().unwrap());

        assert_eq!(
            get_client_ip(&headers, Some("127.0.0.1".to_string()), true),
            "127.0.0.1"
        );
        assert_eq!(get_client_ip(&headers, None, true), "unknown");

        headers.insert("x-real-ip", "2001:db8::1".parse().unwrap());
        assert_eq!(get_client_ip(&headers, None, true), "2001:db8::1");
    }

    #[test]
    fn test_client_ip_ignores_headers_without_trust() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7".parse().unwrap());

        assert_eq!(
            get_client_ip(&headers, Some("127.0.0.1".to_string()), false),
            "127.0.0.1"
        );
        assert_eq!(get_client_ip(&headers, None, false), "unknown");
    }

    #[test]
    fn test_user_agent() {
        let mut headers = HeaderMap::new();
        assert!(get_user_agent(&headers).is_none());

        headers.insert("user-agent", "curl/8.0".parse().unwrap());
        assert_eq!(get_user_agent(&headers).as_deref(), Some("curl/8.0"));
    }
}
