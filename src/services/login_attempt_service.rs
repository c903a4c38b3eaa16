//! 登录限流服务：内存封禁缓存 + 持久化登录记录
//!
//! 封禁判断两级进行：先查内存中的封禁表，未命中再统计回溯窗口内的失败次数。
//! 进程重启后内存表为空，持久化记录仍然是最终依据。

use super::with_io_timeout;
use crate::{
    auth::clock::Clock,
    config::LoginAttemptConfig,
    error::AppError,
    models::login_attempt::LoginAttempt,
    repository::LoginAttemptStore,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};

/// 用户名 -> 封禁到期时间
pub type BlockCache = DashMap<String, DateTime<Utc>>;

pub struct LoginAttemptService {
    store: Arc<dyn LoginAttemptStore>,
    blocks: Arc<BlockCache>,
    config: LoginAttemptConfig,
    clock: Arc<dyn Clock>,
}

impl LoginAttemptService {
    pub fn new(
        store: Arc<dyn LoginAttemptStore>,
        blocks: Arc<BlockCache>,
        config: LoginAttemptConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            blocks,
            config,
            clock,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// 检查是否允许登录，被封禁时返回剩余秒数
    pub async fn admit(&self, username: &str) -> Result<(), AppError> {
        let now = self.clock.now();

        // blocked_until 读出到期时间后即释放分片锁，之后才会访问存储
        if let Some(until) = self.blocked_until(username) {
            let retry_after_secs = seconds_until(until, now);
            tracing::warn!(username = %username, retry_after_secs, "Login blocked");
            return Err(AppError::RateLimited { retry_after_secs });
        }
        self.blocks.remove_if(username, |_, until| *until <= now);

        let since = now - chrono_duration(self.config.lookback())?;
        let failures = with_io_timeout(
            self.config.io_timeout(),
            "count login failures",
            self.store.count_failures_since(username, since),
        )
        .await?;

        if failures >= i64::from(self.config.max_failures) {
            let block = chrono_duration(self.config.block_duration())?;
            self.blocks.insert(username.to_string(), now + block);

            let retry_after_secs = self.config.block_duration_secs.max(1);
            tracing::warn!(
                username = %username,
                failures,
                retry_after_secs,
                "Too many failed login attempts, blocking"
            );
            return Err(AppError::RateLimited { retry_after_secs });
        }

        Ok(())
    }

    /// 记录一次登录结果，存储失败只记日志
    pub async fn record(
        &self,
        username: &str,
        success: bool,
        client_ip: &str,
        user_agent: Option<&str>,
    ) {
        let attempt = LoginAttempt::new(username, success, client_ip, user_agent, self.clock.now());

        let result = with_io_timeout(
            self.config.io_timeout(),
            "record login attempt",
            self.store.insert(&attempt),
        )
        .await;

        if let Err(e) = result {
            tracing::error!(
                username = %username,
                success,
                client_ip = %client_ip,
                error = %e,
                "Failed to record login attempt"
            );
        }
    }

    /// 清除内存中的封禁，不影响历史记录
    pub fn clear(&self, username: &str) {
        if self.blocks.remove(username).is_some() {
            tracing::debug!(username = %username, "Login block cleared");
        }
    }

    /// 当前封禁到期时间（已过期的不返回）
    pub fn blocked_until(&self, username: &str) -> Option<DateTime<Utc>> {
        let now = self.clock.now();
        self.blocks
            .get(username)
            .map(|entry| *entry.value())
            .filter(|until| *until > now)
    }

    /// 删除早于截止时间的登录记录
    pub async fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let deleted = with_io_timeout(
            self.config.io_timeout(),
            "prune login attempts",
            self.store.delete_older_than(cutoff),
        )
        .await?;

        tracing::info!(deleted, cutoff = %cutoff, "Pruned login attempts");
        Ok(deleted)
    }
}

fn seconds_until(until: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let remaining = (until - now).num_seconds().max(1);
    remaining as u64
}

fn chrono_duration(d: Duration) -> Result<chrono::Duration, AppError> {
    chrono::Duration::from_std(d)
        .map_err(|e| AppError::Config(format!("Duration out of range: {}", e)))
}

/// 登录记录定期清理任务
pub struct LoginAttemptPruner {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl LoginAttemptPruner {
    /// 启动清理任务，首次清理在一个周期之后
    pub fn start(
        service: Arc<LoginAttemptService>,
        retention: Duration,
        period: Duration,
    ) -> Result<Self, AppError> {
        let retention = chrono_duration(retention)?;
        if period.is_zero() {
            return Err(AppError::Config("Prune interval must be positive".to_string()));
        }

        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let cutoff = service.now() - retention;
                        if let Err(e) = service.prune_older_than(cutoff).await {
                            tracing::error!(error = %e, "Login attempt prune failed");
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            tracing::info!("Login attempt pruner shutting down");
                            break;
                        }
                    }
                }
            }
        });

        tracing::info!(
            retention_secs = retention.num_seconds(),
            period_secs = period.as_secs(),
            "Login attempt pruner started"
        );

        Ok(Self { shutdown, handle })
    }

    /// 停止任务并等待退出
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            tracing::error!(error = %e, "Login attempt pruner task failed");
        }
    }
}
