//! Business logic services layer

pub mod auth_service;
pub mod login_attempt_service;

pub use auth_service::AuthService;
pub use login_attempt_service::{BlockCache, LoginAttemptPruner, LoginAttemptService};

use crate::error::AppError;
use std::{future::Future, time::Duration};

/// 外部存储调用的超时保护，超时视为可恢复错误
pub(crate) async fn with_io_timeout<T, F>(
    timeout: Duration,
    operation: &'static str,
    fut: F,
) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(
                operation,
                timeout_ms = timeout.as_millis() as u64,
                "Storage call timed out"
            );
            Err(AppError::timeout(operation))
        }
    }
}
