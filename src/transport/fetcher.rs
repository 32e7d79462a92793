//! HTTP transport with retry, rate limiting and charset detection
//!
//! This module provides the production [`Transport`] with features including:
//! - Client-level timeout with per-call override
//! - Default User-Agent and Italian `Accept-Language` headers
//! - Rate limiting with governor across all sources
//! - Exponential backoff retry for transient network failures only
//! - Charset detection with Windows-1252 fallback for legacy portals

use async_trait::async_trait;
use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use regex::Regex;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE},
    Client,
};
use std::num::NonZeroU32;
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

use super::{RequestOptions, Transport};
use crate::config::HttpConfig;
use crate::utils::error::FetchError;
use crate::utils::retry::{with_retry_if, RetryConfig, RetryFailure};

/// Reqwest-backed transport shared by all strategies
pub struct HttpTransport {
    /// HTTP client with configured timeout, compression and default headers
    client: Client,

    /// Rate limiter to control request frequency
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    /// Backoff policy for transient failures
    retry: RetryConfig,
}

impl HttpTransport {
    /// Create a transport from the `[http]` configuration section
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if the HTTP client cannot be created
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        Self::with_config(
            config.requests_per_second,
            RetryConfig {
                max_retries: config.max_retries,
                base_delay_ms: config.base_delay_ms,
                max_delay_ms: config.max_delay_ms,
                backoff_multiplier: 2.0,
            },
            Duration::from_secs(config.timeout_secs),
            &config.user_agent,
        )
    }

    /// Create a transport with explicit settings
    ///
    /// # Arguments
    ///
    /// * `requests_per_second` - Maximum number of outbound requests per second
    /// * `retry` - Backoff policy for transient failures
    /// * `timeout` - Default per-request timeout
    /// * `user_agent` - User-Agent sent with every request
    pub fn with_config(
        requests_per_second: u32,
        retry: RetryConfig,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .cookie_store(true)
            .user_agent(user_agent)
            .default_headers(Self::build_headers())
            .build()?;

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            retry,
        })
    }

    /// Retry policy in effect
    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Single attempt: wait for the rate limiter, send, check status, decode
    async fn send_once(&self, url: &Url, options: &RequestOptions) -> Result<String, FetchError> {
        self.rate_limiter.until_ready().await;

        let mut request = self.client.get(url.clone());
        if !options.params.is_empty() {
            request = request.query(&options.params);
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }
        for (name, value) in &options.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => request = request.header(name, value),
                _ => tracing::warn!(header = %name, "Skipping invalid request header"),
            }
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_default();

        let bytes = response.bytes().await?;
        Ok(Self::decode_bytes(&bytes, &content_type))
    }

    /// Decode a body to UTF-8
    ///
    /// Order of preference:
    /// 1. charset declared in the Content-Type header
    /// 2. charset declared in an HTML meta tag
    /// 3. strict UTF-8
    /// 4. Windows-1252, which accepts any byte sequence
    pub fn decode_bytes(bytes: &[u8], content_type: &str) -> String {
        let declared = charset_label(content_type).or_else(|| sniff_meta_charset(bytes));

        if let Some(encoding) = declared.and_then(|l| Encoding::for_label(l.as_bytes())) {
            let (cow, _, had_errors) = encoding.decode(bytes);
            if !had_errors {
                return cow.into_owned();
            }
            tracing::debug!(charset = encoding.name(), "Declared charset did not decode cleanly");
        }

        let (cow, had_errors) = UTF_8.decode_without_bom_handling(bytes);
        if !had_errors {
            return cow.into_owned();
        }

        let (cow, _, _) = WINDOWS_1252.decode(bytes);
        cow.into_owned()
    }

    /// Default headers for every request
    fn build_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("it-IT,it;q=0.9,en;q=0.7"),
        );

        headers
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, options: &RequestOptions) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;

        let result = with_retry_if(
            &self.retry,
            || self.send_once(&parsed, options),
            FetchError::is_transient,
        )
        .await;

        match result {
            Ok(body) => Ok(body),
            Err(RetryFailure::Fatal(e)) => Err(e),
            Err(RetryFailure::Exhausted { attempts, last }) => {
                Err(FetchError::MaxRetriesExceeded {
                    attempts,
                    last: last.to_string(),
                })
            }
        }
    }
}

fn charset_label(content_type: &str) -> Option<String> {
    let lower = content_type.to_ascii_lowercase();
    let start = lower.find("charset=")? + "charset=".len();
    let value = lower[start..]
        .split(';')
        .next()?
        .trim()
        .trim_matches(|c| c == '"' || c == '\'');
    (!value.is_empty()).then(|| value.to_string())
}

fn sniff_meta_charset(bytes: &[u8]) -> Option<String> {
    static META_RE: OnceLock<Regex> = OnceLock::new();

    let re = META_RE.get_or_init(|| {
        Regex::new(r#"(?i)charset\s*=\s*["']?([A-Za-z0-9_\-]+)"#).expect("Invalid regex pattern")
    });

    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(1024)]);
    re.captures(&head).map(|c| c[1].to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8() {
        let text = "Pronto Soccorso Canicattì";
        let decoded = HttpTransport::decode_bytes(text.as_bytes(), "text/html; charset=utf-8");
        assert_eq!(decoded, text);
    }

    #[test]
    fn test_decode_declared_latin1() {
        // "Canicattì" in ISO-8859-1
        let bytes: &[u8] = b"Canicatt\xEC";
        let decoded = HttpTransport::decode_bytes(bytes, "text/html; charset=ISO-8859-1");
        assert_eq!(decoded, "Canicattì");
    }

    #[test]
    fn test_decode_latin1_fallback_without_charset() {
        let bytes: &[u8] = b"PS CANICATT\xCC";
        let decoded = HttpTransport::decode_bytes(bytes, "text/html");
        assert_eq!(decoded, "PS CANICATTÌ");
    }

    #[test]
    fn test_decode_meta_charset() {
        let mut body = b"<html><head><meta charset=\"windows-1252\"></head><body>Sciacca \xE8</body>".to_vec();
        body.extend_from_slice(b"</html>");
        let decoded = HttpTransport::decode_bytes(&body, "text/html");
        assert!(decoded.contains("Sciacca è"));
    }

    #[test]
    fn test_charset_label() {
        assert_eq!(
            charset_label("text/html; charset=\"UTF-8\""),
            Some("utf-8".to_string())
        );
        assert_eq!(charset_label("application/json"), None);
    }

    #[test]
    fn test_default_headers() {
        let headers = HttpTransport::build_headers();
        assert!(headers.contains_key(ACCEPT));
        assert_eq!(
            headers.get(ACCEPT_LANGUAGE).unwrap().to_str().unwrap(),
            "it-IT,it;q=0.9,en;q=0.7"
        );
    }

    #[test]
    fn test_transport_creation() {
        let transport = HttpTransport::new(&HttpConfig::default());
        assert!(transport.is_ok());

        let transport = HttpTransport::with_config(
            0,
            RetryConfig::new(1),
            Duration::from_secs(5),
            "ercrowd-test",
        );
        assert!(transport.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let transport = HttpTransport::new(&HttpConfig::default()).unwrap();
        let result = transport.get("not a url", &RequestOptions::new()).await;
        assert!(matches!(result, Err(FetchError::InvalidUrl(_))));
    }
}
