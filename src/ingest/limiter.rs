//! Cooldown guard for manually triggered fleet runs
//!
//! The last accepted trigger is stored as an RFC 3339 timestamp under one
//! key in a shared [`KeyValueStore`], so several processes share the same
//! window. The read-then-write race is tolerated. When the store cannot be
//! reached the limiter fails open.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::cache::KeyValueStore;
use crate::config::TriggerConfig;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("Manual run requested too soon, retry in {}s", .remaining.as_secs())]
    TooSoon { remaining: Duration },
}

impl RateLimitError {
    pub fn remaining(&self) -> Duration {
        match self {
            Self::TooSoon { remaining } => *remaining,
        }
    }
}

pub struct CooldownLimiter {
    store: Arc<dyn KeyValueStore>,
    key: String,
    cooldown: Duration,
    enabled: bool,
}

impl CooldownLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>, cooldown: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            cooldown,
            enabled: true,
        }
    }

    pub fn from_config(store: Arc<dyn KeyValueStore>, config: &TriggerConfig) -> Self {
        Self {
            enabled: config.enforce_cooldown,
            ..Self::new(store, config.key.clone(), Duration::from_secs(config.cooldown_secs))
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub async fn check(&self) -> Result<(), RateLimitError> {
        self.check_at(Utc::now()).await
    }

    /// Accept or reject a trigger arriving at `now`
    ///
    /// Accepting records `now` as the new last-run time.
    pub async fn check_at(&self, now: DateTime<Utc>) -> Result<(), RateLimitError> {
        if !self.enabled {
            return Ok(());
        }

        let last = match self.store.get(&self.key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Cooldown store unavailable, allowing manual run");
                return Ok(());
            }
        };

        if let Some(last) = last.as_deref().and_then(parse_timestamp) {
            let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
            if elapsed < self.cooldown {
                let remaining = self.cooldown - elapsed;
                tracing::info!(
                    remaining_secs = remaining.as_secs(),
                    "Manual run rejected by cooldown"
                );
                return Err(RateLimitError::TooSoon { remaining });
            }
        }

        if let Err(e) = self
            .store
            .set(&self.key, &now.to_rfc3339(), Some(self.cooldown))
            .await
        {
            tracing::warn!(error = %e, "Failed to record manual run time");
        }

        Ok(())
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(_) => {
            tracing::warn!(value = raw, "Unparseable last-run timestamp, treating as expired");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryKeyValueStore;
    use chrono::TimeZone;

    const FIFTEEN_MINUTES: Duration = Duration::from_secs(15 * 60);

    fn limiter(store: Arc<MemoryKeyValueStore>) -> CooldownLimiter {
        CooldownLimiter::new(store, "scrape_last_run", FIFTEEN_MINUTES)
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 20, 14, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
    }

    #[tokio::test]
    async fn test_cooldown_window() {
        let limiter = limiter(Arc::new(MemoryKeyValueStore::new()));

        assert!(limiter.check_at(at(0)).await.is_ok());

        let err = limiter.check_at(at(10)).await.unwrap_err();
        assert_eq!(err.remaining(), Duration::from_secs(5 * 60));

        assert!(limiter.check_at(at(16)).await.is_ok());
        // rejected triggers do not move the window
        assert!(limiter.check_at(at(30)).await.is_err());
    }

    #[tokio::test]
    async fn test_fails_open_when_store_offline() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let limiter = limiter(store.clone());
        assert!(limiter.check_at(at(0)).await.is_ok());

        store.set_offline(true);
        assert!(limiter.check_at(at(1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_garbage_timestamp_is_expired() {
        let store = Arc::new(MemoryKeyValueStore::new());
        store.set("scrape_last_run", "yesterday", None).await.unwrap();
        assert!(limiter(store).check_at(at(0)).await.is_ok());
    }

    #[tokio::test]
    async fn test_disabled_limiter() {
        let config = TriggerConfig {
            enforce_cooldown: false,
            ..TriggerConfig::default()
        };
        let limiter = CooldownLimiter::from_config(Arc::new(MemoryKeyValueStore::new()), &config);
        assert!(limiter.check_at(at(0)).await.is_ok());
        assert!(limiter.check_at(at(1)).await.is_ok());
    }
}
