//! Error types for fetching and extracting source data
//!
//! Transport failures, structural parse failures and the terminal scrape
//! error that wraps both.

use thiserror::Error;

/// Errors that can occur during HTTP fetching operations
#[derive(Error, Debug)]
pub enum FetchError {
    /// Request did not complete within the configured timeout
    #[error("Request timeout")]
    Timeout,

    /// Could not connect to the remote host
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Transport-level failure (reset, broken body stream, protocol error)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-2xx response; never retried
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Transient failures persisted past the retry budget
    #[error("Giving up after {attempts} attempts: {last}")]
    MaxRetriesExceeded { attempts: u32, last: String },

    /// Content decoding error
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Whether the transport should retry this failure
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Connect(_) | Self::Transport(_))
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else if err.is_builder() {
            Self::InvalidUrl(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Errors raised when a page or payload lacks the structure a source relies on
#[derive(Error, Debug)]
pub enum ParseError {
    /// A required element (container, table, row) is absent
    #[error("Required element not found: {0}")]
    MissingElement(String),

    /// A required field is absent from a JSON payload
    #[error("Required field missing: {0}")]
    MissingField(String),

    /// A CSS selector failed to compile
    #[error("Invalid selector '{0}'")]
    InvalidSelector(String),

    /// The payload is not valid JSON
    #[error("Invalid JSON payload: {0}")]
    InvalidJson(String),
}

/// Terminal failure of a single scrape
#[derive(Error, Debug)]
pub enum ScrapeError {
    /// Fetch error
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}
