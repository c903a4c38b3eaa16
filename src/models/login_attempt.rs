//! Login attempt audit record

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One login outcome, appended for both success and failure
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LoginAttempt {
    pub username: String,
    pub attempt_time: DateTime<Utc>,
    pub success: bool,
    pub ip_address: String,
    pub user_agent: Option<String>,
}

impl LoginAttempt {
    pub fn new(
        username: &str,
        success: bool,
        ip_address: &str,
        user_agent: Option<&str>,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            username: username.to_string(),
            attempt_time: at,
            success,
            ip_address: ip_address.to_string(),
            user_agent: user_agent.map(|s| s.to_string()),
        }
    }
}
