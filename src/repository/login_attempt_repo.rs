//! Login attempt repository (登录记录数据访问)

use super::LoginAttemptStore;
use crate::{error::AppError, models::login_attempt::LoginAttempt};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

pub struct PgLoginAttemptRepository {
    db: PgPool,
}

impl PgLoginAttemptRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LoginAttemptStore for PgLoginAttemptRepository {
    /// 记录登录尝试
    async fn insert(&self, attempt: &LoginAttempt) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO login_attempts (username, attempt_time, success, ip_address, user_agent)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&attempt.username)
        .bind(attempt.attempt_time)
        .bind(attempt.success)
        .bind(&attempt.ip_address)
        .bind(&attempt.user_agent)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// 统计指定时间之后的失败次数
    async fn count_failures_since(
        &self,
        identifier: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let count: i64 = sqlx::query(
            r#"
            SELECT COUNT(*)
            FROM login_attempts
            WHERE username = $1
                AND success = FALSE
                AND attempt_time >= $2
            "#,
        )
        .bind(identifier)
        .bind(since)
        .fetch_one(&self.db)
        .await?
        .get(0);

        Ok(count)
    }

    /// 删除早于截止时间的记录
    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM login_attempts WHERE attempt_time < $1")
            .bind(cutoff)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }
}
