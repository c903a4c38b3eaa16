//! User repository (数据库访问层)

use super::UserDirectory;
use crate::{
    error::AppError,
    models::user::{UserRecord, UserRole},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// 数据库行，角色以文本存储
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    password_hash: String,
    email: Option<String>,
    role: String,
    enabled: bool,
    locked: bool,
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
    password_expires_at: Option<DateTime<Utc>>,
    lock_count: i32,
    created_at: DateTime<Utc>,
    last_login_at: Option<DateTime<Utc>>,
}

impl TryFrom<UserRow> for UserRecord {
    type Error = AppError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row.role.parse::<UserRole>().map_err(|e| {
            tracing::error!(username = %row.username, "Stored role is invalid: {}", e);
            AppError::Internal(e)
        })?;

        Ok(UserRecord {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            email: row.email,
            role,
            enabled: row.enabled,
            locked: row.locked,
            valid_from: row.valid_from,
            valid_until: row.valid_until,
            password_expires_at: row.password_expires_at,
            lock_count: row.lock_count,
            created_at: row.created_at,
            last_login_at: row.last_login_at,
        })
    }
}

pub struct PgUserDirectory {
    db: PgPool,
}

impl PgUserDirectory {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    /// 根据用户名查找用户
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<UserRecord>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password_hash, email, role, enabled, locked,
                   valid_from, valid_until, password_expires_at, lock_count,
                   created_at, last_login_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(identifier)
        .fetch_optional(&self.db)
        .await?;

        row.map(UserRecord::try_from).transpose()
    }
}
