//! Configuration management for the ingestion pipeline
//!
//! Configuration is loaded from a TOML file or from `ERCROWD_*` environment
//! variables, then validated before any component is built.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Periodic fleet run settings
    pub scraper: ScraperConfig,

    /// Outbound HTTP settings
    pub http: HttpConfig,

    /// Manual trigger cooldown
    pub trigger: TriggerConfig,

    /// Persistence backend
    pub database: DatabaseConfig,

    /// Redis store for the trigger cooldown
    pub redis: RedisConfig,

    /// Per-family endpoint overrides
    pub sources: SourcesConfig,

    /// Prometheus endpoint served by `serve`
    pub metrics: MetricsConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Fleet scheduling and per-job limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Seconds between scheduled fleet runs
    pub interval_secs: u64,

    /// Upper bound for one hospital's validate + scrape
    pub job_timeout_secs: u64,

    /// Maximum number of hospitals scraped at once
    pub max_concurrent_jobs: usize,

    /// Run the periodic scheduler at all
    pub enabled: bool,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            job_timeout_secs: 60,
            max_concurrent_jobs: 5,
            enabled: true,
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Retries after the first attempt for transient failures
    pub max_retries: u32,

    /// First backoff delay in milliseconds
    pub base_delay_ms: u64,

    /// Backoff ceiling in milliseconds
    pub max_delay_ms: u64,

    /// User agent string
    pub user_agent: String,

    /// Outbound request budget shared by every source
    pub requests_per_second: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
            user_agent: default_user_agent(),
            requests_per_second: 10,
        }
    }
}

/// Manual trigger cooldown
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Minimum seconds between manual fleet runs
    pub cooldown_secs: u64,

    /// Disable to allow back-to-back manual runs
    pub enforce_cooldown: bool,

    /// Key holding the last manual run timestamp
    pub key: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 900,
            enforce_cooldown: true,
            key: String::from("scrape_last_run"),
        }
    }
}

/// Which store backs hospital and status persistence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Sqlite,
    Postgres,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Selected backend
    pub backend: DatabaseBackend,

    /// SQLite database path
    pub sqlite_path: PathBuf,

    /// PostgreSQL connection string
    pub postgres_url: String,

    /// Maximum pool size
    pub pool_size: usize,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: DatabaseBackend::Sqlite,
            sqlite_path: PathBuf::from("data/ercrowd.db"),
            postgres_url: String::from("postgresql://localhost/ercrowd"),
            pool_size: 10,
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Maximum pool size
    pub pool_size: usize,

    /// Prefix applied to every key
    pub key_prefix: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::from("redis://127.0.0.1:6379"),
            pool_size: 4,
            key_prefix: String::from("ercrowd:"),
        }
    }
}

/// Base URL overrides, keyed by source family (`asp_palermo`, `ao_papardo`, ...)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub endpoints: HashMap<String, String>,
}

/// Metrics endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve `GET /metrics` alongside the scheduler
    pub enabled: bool,

    /// Listen address, `host:port`
    pub bind_address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: String::from("127.0.0.1:9464"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn default_user_agent() -> String {
    format!("ercrowd/{}", env!("CARGO_PKG_VERSION"))
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse::<T>().ok())
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables fall back to defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let scraper = ScraperConfig {
            interval_secs: env_parse("ERCROWD_INTERVAL_SECS")
                .unwrap_or(defaults.scraper.interval_secs),
            job_timeout_secs: env_parse("ERCROWD_JOB_TIMEOUT_SECS")
                .unwrap_or(defaults.scraper.job_timeout_secs),
            max_concurrent_jobs: env_parse("ERCROWD_MAX_CONCURRENT_JOBS")
                .unwrap_or(defaults.scraper.max_concurrent_jobs),
            enabled: env_parse("ERCROWD_SCHEDULER_ENABLED").unwrap_or(defaults.scraper.enabled),
        };

        let http = HttpConfig {
            timeout_secs: env_parse("ERCROWD_HTTP_TIMEOUT_SECS")
                .unwrap_or(defaults.http.timeout_secs),
            max_retries: env_parse("ERCROWD_HTTP_MAX_RETRIES").unwrap_or(defaults.http.max_retries),
            base_delay_ms: env_parse("ERCROWD_HTTP_BASE_DELAY_MS")
                .unwrap_or(defaults.http.base_delay_ms),
            max_delay_ms: env_parse("ERCROWD_HTTP_MAX_DELAY_MS")
                .unwrap_or(defaults.http.max_delay_ms),
            user_agent: std::env::var("ERCROWD_USER_AGENT").unwrap_or(defaults.http.user_agent),
            requests_per_second: env_parse("ERCROWD_REQUESTS_PER_SECOND")
                .unwrap_or(defaults.http.requests_per_second),
        };

        let trigger = TriggerConfig {
            cooldown_secs: env_parse("ERCROWD_COOLDOWN_SECS")
                .unwrap_or(defaults.trigger.cooldown_secs),
            enforce_cooldown: env_parse("ERCROWD_ENFORCE_COOLDOWN")
                .unwrap_or(defaults.trigger.enforce_cooldown),
            key: std::env::var("ERCROWD_TRIGGER_KEY").unwrap_or(defaults.trigger.key),
        };

        let backend = match std::env::var("ERCROWD_DB_BACKEND").ok().as_deref() {
            Some("postgres") | Some("postgresql") => DatabaseBackend::Postgres,
            _ => DatabaseBackend::Sqlite,
        };

        let database = DatabaseConfig {
            backend,
            sqlite_path: std::env::var("ERCROWD_SQLITE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database.sqlite_path),
            postgres_url: std::env::var("ERCROWD_POSTGRES_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .unwrap_or(defaults.database.postgres_url),
            pool_size: env_parse("ERCROWD_DB_POOL_SIZE").unwrap_or(defaults.database.pool_size),
        };

        let redis = RedisConfig {
            url: std::env::var("ERCROWD_REDIS_URL")
                .or_else(|_| std::env::var("REDIS_URL"))
                .unwrap_or(defaults.redis.url),
            pool_size: env_parse("ERCROWD_REDIS_POOL_SIZE").unwrap_or(defaults.redis.pool_size),
            key_prefix: std::env::var("ERCROWD_REDIS_KEY_PREFIX")
                .unwrap_or(defaults.redis.key_prefix),
        };

        let metrics = MetricsConfig {
            enabled: env_parse("ERCROWD_METRICS_ENABLED").unwrap_or(defaults.metrics.enabled),
            bind_address: std::env::var("ERCROWD_METRICS_ADDR")
                .unwrap_or(defaults.metrics.bind_address),
        };

        let logging = LoggingConfig {
            level: std::env::var("ERCROWD_LOG_LEVEL").unwrap_or(defaults.logging.level),
            format: std::env::var("ERCROWD_LOG_FORMAT").unwrap_or(defaults.logging.format),
        };

        Ok(Self {
            scraper,
            http,
            trigger,
            database,
            redis,
            sources: SourcesConfig::default(),
            metrics,
            logging,
        })
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.scraper.max_concurrent_jobs == 0 {
            anyhow::bail!("max_concurrent_jobs must be greater than 0");
        }

        if self.scraper.interval_secs == 0 {
            anyhow::bail!("interval_secs must be greater than 0");
        }

        if self.scraper.job_timeout_secs == 0 {
            anyhow::bail!("job_timeout_secs must be greater than 0");
        }

        if self.http.timeout_secs == 0 {
            anyhow::bail!("http.timeout_secs must be greater than 0");
        }

        if self.http.requests_per_second == 0 {
            anyhow::bail!("requests_per_second must be greater than 0");
        }

        if self.http.base_delay_ms > self.http.max_delay_ms {
            anyhow::bail!(
                "base_delay_ms ({}) must not exceed max_delay_ms ({})",
                self.http.base_delay_ms,
                self.http.max_delay_ms
            );
        }

        if self.database.pool_size == 0 || self.redis.pool_size == 0 {
            anyhow::bail!("pool_size must be greater than 0");
        }

        if self.trigger.key.is_empty() {
            anyhow::bail!("trigger.key must not be empty");
        }

        for (family, url) in &self.sources.endpoints {
            url::Url::parse(url)
                .with_context(|| format!("Invalid endpoint override for {family}: {url}"))?;
        }

        if self.metrics.enabled {
            self.metrics
                .bind_address
                .parse::<std::net::SocketAddr>()
                .with_context(|| {
                    format!("Invalid metrics bind_address: {}", self.metrics.bind_address)
                })?;
        }

        Ok(())
    }

    /// Interval between scheduled fleet runs
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.scraper.interval_secs)
    }

    /// Per-job timeout covering validation and scrape
    #[must_use]
    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.scraper.job_timeout_secs)
    }

    /// Manual trigger cooldown
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.trigger.cooldown_secs)
    }
}
