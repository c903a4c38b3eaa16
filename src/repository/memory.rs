//! In-memory collaborators

use super::{LoginAttemptStore, UserDirectory};
use crate::{
    error::AppError,
    models::{login_attempt::LoginAttempt, user::UserRecord},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::{Mutex, MutexGuard};

/// User directory keyed by username
#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: DashMap<String, UserRecord>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: UserRecord) {
        self.users.insert(user.username.clone(), user);
    }

    pub fn remove(&self, username: &str) -> Option<UserRecord> {
        self.users.remove(username).map(|(_, user)| user)
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self.users.get(identifier).map(|entry| entry.value().clone()))
    }
}

/// Attempt log held in a vector
#[derive(Default)]
pub struct InMemoryLoginAttemptStore {
    attempts: Mutex<Vec<LoginAttempt>>,
}

impl InMemoryLoginAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LoginAttempt>> {
        self.attempts.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of all recorded attempts, oldest first
    pub fn attempts(&self) -> Vec<LoginAttempt> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[async_trait]
impl LoginAttemptStore for InMemoryLoginAttemptStore {
    async fn insert(&self, attempt: &LoginAttempt) -> Result<(), AppError> {
        self.lock().push(attempt.clone());
        Ok(())
    }

    async fn count_failures_since(
        &self,
        identifier: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, AppError> {
        let count = self
            .lock()
            .iter()
            .filter(|a| a.username == identifier && !a.success && a.attempt_time >= since)
            .count();
        Ok(count as i64)
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let mut attempts = self.lock();
        let before = attempts.len();
        attempts.retain(|a| a.attempt_time >= cutoff);
        Ok((before - attempts.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_count_only_failures_in_window() {
        let store = InMemoryLoginAttemptStore::new();
        let now = Utc::now();

        store
            .insert(&LoginAttempt::new("alice", false, "10.0.0.1", None, now - Duration::minutes(10)))
            .await
            .unwrap();
        store
            .insert(&LoginAttempt::new("alice", false, "10.0.0.1", None, now))
            .await
            .unwrap();
        store
            .insert(&LoginAttempt::new("alice", true, "10.0.0.1", None, now))
            .await
            .unwrap();
        store
            .insert(&LoginAttempt::new("bob", false, "10.0.0.2", None, now))
            .await
            .unwrap();

        let since = now - Duration::minutes(5);
        assert_eq!(store.count_failures_since("alice", since).await.unwrap(), 1);
        assert_eq!(store.count_failures_since("bob", since).await.unwrap(), 1);
        assert_eq!(store.count_failures_since("carol", since).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_older_than() {
        let store = InMemoryLoginAttemptStore::new();
        let now = Utc::now();

        store
            .insert(&LoginAttempt::new("alice", false, "ip", None, now - Duration::days(2)))
            .await
            .unwrap();
        store
            .insert(&LoginAttempt::new("alice", true, "ip", None, now))
            .await
            .unwrap();

        let cutoff = now - Duration::days(1);
        assert_eq!(store.delete_older_than(cutoff).await.unwrap(), 1);
        assert_eq!(store.delete_older_than(cutoff).await.unwrap(), 0);
        assert_eq!(store.len(), 1);
    }
}
