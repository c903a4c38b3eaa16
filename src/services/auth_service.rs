//! 认证服务：登录、令牌刷新、令牌校验、当前用户

use super::{with_io_timeout, LoginAttemptService};
use crate::{
    auth::{
        clock::Clock,
        jwt::{JwtService, TokenError, TokenKind},
        password::PasswordHasher,
    },
    error::AppError,
    models::{
        auth::{LoginResponse, TokenValidationResponse},
        user::{UserRecord, UserSummary},
    },
    repository::UserDirectory,
};
use std::{sync::Arc, time::Duration};

pub const TOKEN_TYPE_BEARER: &str = "Bearer";

pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    login_attempts: Arc<LoginAttemptService>,
    jwt_service: Arc<JwtService>,
    hasher: PasswordHasher,
    clock: Arc<dyn Clock>,
    io_timeout: Duration,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        login_attempts: Arc<LoginAttemptService>,
        jwt_service: Arc<JwtService>,
        hasher: PasswordHasher,
        clock: Arc<dyn Clock>,
        io_timeout: Duration,
    ) -> Self {
        Self {
            users,
            login_attempts,
            jwt_service,
            hasher,
            clock,
            io_timeout,
        }
    }

    /// 用户登录
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        client_ip: &str,
        user_agent: Option<&str>,
    ) -> Result<LoginResponse, AppError> {
        // 检查是否被限流
        if let Err(e) = self.login_attempts.admit(username).await {
            if matches!(e, AppError::RateLimited { .. }) {
                metrics::counter!("auth_login_total", "result" => "rate_limited").increment(1);
            }
            return Err(e);
        }

        // 获取用户
        let Some(user) = self.find_user(username).await? else {
            return Err(self.reject(username, client_ip, user_agent, "unknown_user").await);
        };

        // 检查账户状态
        if !user.is_usable_at(self.clock.now()) {
            return Err(self.reject(username, client_ip, user_agent, "account_unusable").await);
        }

        // 验证密码
        match self.verify_password(password, &user.password_hash).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(self.reject(username, client_ip, user_agent, "bad_password").await);
            }
            Err(e) => {
                self.note_failure(username, client_ip, user_agent, "corrupt_hash")
                    .await;
                return Err(e);
            }
        }

        // 记录成功并解除封禁
        self.login_attempts
            .record(username, true, client_ip, user_agent)
            .await;
        self.login_attempts.clear(username);

        let token_pair = self.jwt_service.generate_token_pair(&user.username, user.role)?;

        metrics::counter!("auth_login_total", "result" => "success").increment(1);
        tracing::info!(
            username = %user.username,
            role = %user.role,
            client_ip = %client_ip,
            "User logged in"
        );

        Ok(LoginResponse {
            access_token: token_pair.access_token,
            refresh_token: token_pair.refresh_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in_ms: token_pair.expires_in_ms,
            user: UserSummary::from(&user),
        })
    }

    /// 刷新令牌，令牌错误原样返回，由调用方包装为 InvalidRefreshToken
    pub async fn refresh(&self, refresh_token: &str) -> Result<LoginResponse, AppError> {
        let claims = self.jwt_service.validate_refresh_token(refresh_token)?;

        // 角色以用户目录为准
        let user = self.require_usable_user(&claims.sub).await?;
        let token_pair = self.jwt_service.generate_token_pair(&user.username, user.role)?;

        tracing::debug!(username = %user.username, "Token pair refreshed");

        Ok(LoginResponse {
            access_token: token_pair.access_token,
            refresh_token: token_pair.refresh_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in_ms: token_pair.expires_in_ms,
            user: UserSummary::from(&user),
        })
    }

    /// 用刷新令牌签发新的访问令牌（请求网关使用）
    pub async fn reissue_access_token(&self, refresh_token: &str) -> Result<String, AppError> {
        let claims = self.jwt_service.validate_refresh_token(refresh_token)?;
        let user = self.require_usable_user(&claims.sub).await?;

        self.jwt_service
            .issue(&user.username, user.role, TokenKind::Access)
    }

    /// 校验访问令牌，从不返回错误
    pub fn validate(&self, token: &str) -> TokenValidationResponse {
        match self.jwt_service.validate_access_token(token) {
            Ok(claims) => TokenValidationResponse::valid(claims.sub, claims.role),
            Err(e) => TokenValidationResponse::invalid(e.to_string()),
        }
    }

    /// 获取当前用户信息
    pub async fn current_user(&self, username: &str) -> Result<UserSummary, AppError> {
        let user = self
            .find_user(username)
            .await?
            .filter(|user| user.is_usable_at(self.clock.now()))
            .ok_or_else(|| AppError::not_found("user"))?;

        Ok(UserSummary::from(&user))
    }

    async fn find_user(&self, username: &str) -> Result<Option<UserRecord>, AppError> {
        with_io_timeout(
            self.io_timeout,
            "find user",
            self.users.find_by_identifier(username),
        )
        .await
    }

    async fn require_usable_user(&self, username: &str) -> Result<UserRecord, AppError> {
        match self.find_user(username).await? {
            Some(user) if user.is_usable_at(self.clock.now()) => Ok(user),
            _ => {
                tracing::debug!(username = %username, "Refresh for missing or unusable user");
                Err(AppError::InvalidRefreshToken(TokenError::Invalid))
            }
        }
    }

    async fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AppError> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        let hash = hash.to_string();

        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))?
    }

    /// 记录失败并返回统一的认证失败错误
    async fn reject(
        &self,
        username: &str,
        client_ip: &str,
        user_agent: Option<&str>,
        reason: &'static str,
    ) -> AppError {
        self.note_failure(username, client_ip, user_agent, reason)
            .await;
        AppError::AuthenticationFailed
    }

    /// 记录失败尝试、计数并告警
    async fn note_failure(
        &self,
        username: &str,
        client_ip: &str,
        user_agent: Option<&str>,
        reason: &'static str,
    ) {
        self.login_attempts
            .record(username, false, client_ip, user_agent)
            .await;

        metrics::counter!("auth_login_total", "result" => "failure").increment(1);
        tracing::warn!(
            username = %username,
            client_ip = %client_ip,
            reason,
            "Login failed"
        );
    }
}
