//! Shared key-value store backing the manual-trigger cooldown
//!
//! Production uses Redis through a deadpool pool; tests and single-process
//! deployments without Redis use [`MemoryKeyValueStore`].
//!
//! # Example
//!
//! ```rust,ignore
//! use ercrowd::cache::{KeyValueStore, RedisStore};
//!
//! let store = RedisStore::try_new(&config.redis).await;
//! ```

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Pool, Runtime};
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use crate::config::RedisConfig;

/// Minimal get/set contract
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value`, expiring after `ttl` when given
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;
}

// ============================================================================
// Redis
// ============================================================================

/// Redis-backed store
pub struct RedisStore {
    pool: Pool,
    key_prefix: String,
}

impl RedisStore {
    /// Connect and ping
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        let pool = PoolConfig::from_url(&config.url)
            .builder()
            .map_err(|e| anyhow!("Failed to create pool builder: {e}"))?
            .max_size(config.pool_size)
            .runtime(Runtime::Tokio1)
            .build()
            .context("Failed to create Redis connection pool")?;

        let mut conn = pool.get().await.context("Failed to get Redis connection")?;
        let _: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .context("Failed to ping Redis")?;

        tracing::info!(url = %config.url, "Connected to Redis");

        Ok(Self {
            pool,
            key_prefix: config.key_prefix.clone(),
        })
    }

    /// Connect, returning None if Redis is unavailable
    pub async fn try_new(config: &RedisConfig) -> Option<Self> {
        match Self::new(config).await {
            Ok(store) => Some(store),
            Err(e) => {
                tracing::warn!(error = %e, "Redis unavailable, falling back to in-process store");
                None
            }
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.pool.get().await.context("Failed to get connection")?;
        let value: Option<String> = conn
            .get(self.key(key))
            .await
            .context("Failed to read key")?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.pool.get().await.context("Failed to get connection")?;
        let key = self.key(key);

        match ttl {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
                .await
                .context("Failed to write key")?,
            None => conn
                .set::<_, _, ()>(key, value)
                .await
                .context("Failed to write key")?,
        }

        Ok(())
    }
}

// ============================================================================
// In-process
// ============================================================================

/// In-process store
///
/// Expiry is not enforced; the cooldown limiter compares timestamps itself.
/// Can be switched offline to exercise fail-open paths.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    values: RwLock<HashMap<String, String>>,
    offline: AtomicBool,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail until switched back
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            anyhow::bail!("key-value store offline");
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_online()?;
        let values = self
            .values
            .read()
            .map_err(|_| anyhow!("key-value store lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str, _ttl: Option<Duration>) -> Result<()> {
        self.check_online()?;
        self.values
            .write()
            .map_err(|_| anyhow!("key-value store lock poisoned"))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
