//! Shared GET transport used by every source
//!
//! [`Transport`] is the seam sources depend on; [`HttpTransport`] is the
//! production implementation with retry, rate limiting and charset handling.

pub mod fetcher;

use async_trait::async_trait;
use std::time::Duration;

use crate::utils::error::FetchError;

pub use fetcher::HttpTransport;

/// Per-call request options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Query string parameters
    pub params: Vec<(String, String)>,

    /// Extra headers, added on top of the client defaults
    pub headers: Vec<(String, String)>,

    /// Overrides the client-level timeout for this call
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// GET-only transport
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url` and return the decoded body
    async fn get(&self, url: &str, options: &RequestOptions) -> Result<String, FetchError>;
}
