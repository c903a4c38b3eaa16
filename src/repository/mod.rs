//! Database repository layer
//!
//! The authentication core depends on two narrow collaborator contracts:
//! a user directory for credential lookup and an append-only login attempt
//! log. PostgreSQL implementations back the running service; in-memory
//! implementations serve tests and database-less runs.

pub mod login_attempt_repo;
pub mod memory;
pub mod user_repo;

pub use login_attempt_repo::PgLoginAttemptRepository;
pub use memory::{InMemoryLoginAttemptStore, InMemoryUserDirectory};
pub use user_repo::PgUserDirectory;

use crate::{
    error::AppError,
    models::{login_attempt::LoginAttempt, user::UserRecord},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Read-only access to credential records
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up a credential record by its unique identifier (username)
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<UserRecord>, AppError>;
}

/// Persisted login attempt history
#[async_trait]
pub trait LoginAttemptStore: Send + Sync {
    /// Append one attempt
    async fn insert(&self, attempt: &LoginAttempt) -> Result<(), AppError>;

    /// Count failed attempts for `identifier` at or after `since`
    async fn count_failures_since(
        &self,
        identifier: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, AppError>;

    /// Delete attempts older than `cutoff`, returning the number removed
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;
}
