//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:3000"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库连接 URL（使用 Secret 包装，防止日志泄露）
    pub url: Secret<String>,
    /// 最大连接数
    pub max_connections: u32,
    /// 最小连接数
    pub min_connections: u32,
    /// 获取连接超时时间（秒）
    pub acquire_timeout_secs: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout_secs: u64,
    /// 连接最大生命周期（秒）
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// JWT 签名密钥（使用 Secret 包装，防止日志泄露），进程启动后不再轮换
    pub jwt_secret: Secret<String>,
    /// 访问令牌过期时间（秒）
    pub access_token_exp_secs: u64,
    /// 刷新令牌过期时间（秒）
    pub refresh_token_exp_secs: u64,
    /// 是否信任 X-Forwarded-For 头
    pub trust_proxy: bool,
    /// 无需令牌的路径：精确路径或 `prefix/**`
    pub public_paths: Vec<String>,
}

/// 登录失败限制配置
#[derive(Debug, Clone, Deserialize)]
pub struct LoginAttemptConfig {
    /// 回溯窗口内允许的最大失败次数
    pub max_failures: u32,
    /// 统计失败次数的回溯窗口（秒）
    pub lookback_secs: u64,
    /// 封禁持续时间（秒）
    pub block_duration_secs: u64,
    /// 登录记录保留时长（秒），更早的记录由清理任务删除
    pub retention_secs: u64,
    /// 清理任务执行间隔（秒）
    pub prune_interval_secs: u64,
    /// 用户查询与登录记录读写的超时时间（秒）
    pub io_timeout_secs: u64,
}

impl LoginAttemptConfig {
    pub fn lookback(&self) -> Duration {
        Duration::from_secs(self.lookback_secs)
    }

    pub fn block_duration(&self) -> Duration {
        Duration::from_secs(self.block_duration_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}

impl Default for LoginAttemptConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            lookback_secs: 300,
            block_duration_secs: 300,
            retention_secs: 86400,
            prune_interval_secs: 3600,
            io_timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub login_attempt: LoginAttemptConfig,
}

/// 默认公开路径
pub const DEFAULT_PUBLIC_PATHS: &[&str] = &[
    "/health",
    "/ready",
    "/api/v1/auth/login",
    "/api/v1/auth/refresh",
    "/api/v1/auth/validate",
];

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        let public_paths: Vec<String> =
            DEFAULT_PUBLIC_PATHS.iter().map(|p| p.to_string()).collect();

        // 添加默认配置
        settings = settings
            .set_default("server.addr", "0.0.0.0:3000")?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("database.url", "postgresql://localhost/admin_auth")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.max_lifetime_secs", 1800)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("security.jwt_secret", "change-this-secret-in-production-min-32-chars!")?
            .set_default("security.access_token_exp_secs", 1800)?
            .set_default("security.refresh_token_exp_secs", 604800)?
            .set_default("security.trust_proxy", true)?
            .set_default("security.public_paths", public_paths)?
            .set_default("login_attempt.max_failures", 5)?
            .set_default("login_attempt.lookback_secs", 300)?
            .set_default("login_attempt.block_duration_secs", 300)?
            .set_default("login_attempt.retention_secs", 86400)?
            .set_default("login_attempt.prune_interval_secs", 3600)?
            .set_default("login_attempt.io_timeout_secs", 5)?;

        // 从环境变量加载配置（前缀为 AUTH_）
        settings = settings.add_source(
            Environment::with_prefix("AUTH")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("security.public_paths")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 验证端口范围
        if let Some(port_str) = self.server.addr.split(':').next_back() {
            if let Ok(port) = port_str.parse::<u16>() {
                if port != 0 && port < 1024 {
                    return Err(ConfigError::Message("Server port should be >= 1024".to_string()));
                }
            }
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        if self.database.max_connections < self.database.min_connections {
            return Err(ConfigError::Message(
                "max_connections must be >= min_connections".to_string(),
            ));
        }

        // HS256 密钥至少 256 位
        if self.security.jwt_secret.expose_secret().len() < 32 {
            return Err(ConfigError::Message(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }

        if self.security.access_token_exp_secs < 60 || self.security.access_token_exp_secs > 86400 {
            return Err(ConfigError::Message(
                "access_token_exp_secs must be between 60 and 86400 (1 minute to 24 hours)"
                    .to_string(),
            ));
        }

        if self.security.refresh_token_exp_secs < 3600
            || self.security.refresh_token_exp_secs > 2592000
        {
            return Err(ConfigError::Message(
                "refresh_token_exp_secs must be between 3600 and 2592000 (1 hour to 30 days)"
                    .to_string(),
            ));
        }

        if self.security.refresh_token_exp_secs <= self.security.access_token_exp_secs {
            return Err(ConfigError::Message(
                "refresh_token_exp_secs must be greater than access_token_exp_secs".to_string(),
            ));
        }

        for path in &self.security.public_paths {
            if !path.starts_with('/') {
                return Err(ConfigError::Message(format!(
                    "Invalid public path: {}. Must start with '/'",
                    path
                )));
            }
        }

        let attempts = &self.login_attempt;
        if attempts.max_failures < 1 || attempts.max_failures > 100 {
            return Err(ConfigError::Message(
                "login_attempt.max_failures must be between 1 and 100".to_string(),
            ));
        }

        if attempts.lookback_secs == 0 || attempts.block_duration_secs == 0 {
            return Err(ConfigError::Message(
                "login_attempt.lookback_secs and block_duration_secs must be positive".to_string(),
            ));
        }

        if attempts.retention_secs < attempts.lookback_secs {
            return Err(ConfigError::Message(
                "login_attempt.retention_secs must cover the lookback window".to_string(),
            ));
        }

        if attempts.prune_interval_secs == 0 || attempts.io_timeout_secs == 0 {
            return Err(ConfigError::Message(
                "login_attempt.prune_interval_secs and io_timeout_secs must be positive"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "AUTH_SERVER__ADDR",
        "AUTH_LOGGING__LEVEL",
        "AUTH_SECURITY__JWT_SECRET",
        "AUTH_SECURITY__PUBLIC_PATHS",
        "AUTH_LOGIN_ATTEMPT__MAX_FAILURES",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_env();

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.server.addr, "0.0.0.0:3000");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.security.access_token_exp_secs, 1800);
        assert_eq!(config.login_attempt.max_failures, 5);
        assert_eq!(config.login_attempt.lookback(), Duration::from_secs(300));
        assert_eq!(config.login_attempt.block_duration(), Duration::from_secs(300));
        assert!(config.security.public_paths.contains(&"/api/v1/auth/login".to_string()));
    }

    #[test]
    #[serial]
    fn test_public_paths_from_env() {
        clear_env();
        std::env::set_var("AUTH_SECURITY__PUBLIC_PATHS", "/health,/docs/**");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(
            config.security.public_paths,
            vec!["/health".to_string(), "/docs/**".to_string()]
        );

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_validation_short_secret() {
        clear_env();
        std::env::set_var("AUTH_SECURITY__JWT_SECRET", "short");

        assert!(AppConfig::from_env().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_validation_invalid_log_level() {
        clear_env();
        std::env::set_var("AUTH_LOGGING__LEVEL", "invalid");

        assert!(AppConfig::from_env().is_err());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_config_validation_zero_threshold() {
        clear_env();
        std::env::set_var("AUTH_LOGIN_ATTEMPT__MAX_FAILURES", "0");

        assert!(AppConfig::from_env().is_err());

        clear_env();
    }
}
