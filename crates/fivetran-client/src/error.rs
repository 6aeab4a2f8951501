//! Error types for the Fivetran client
//!
//! Every failure carries the relative endpoint path it happened on, and
//! pagination failures additionally carry the page index.

use crate::retry::{RetryDecision, RetryableError};
use std::time::Duration;
use thiserror::Error;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when talking to the Fivetran API
#[derive(Error, Debug)]
pub enum Error {
    /// Non-success HTTP status
    #[error("HTTP {status} from '{path}': {body}")]
    Http {
        path: String,
        status: u16,
        body: String,
    },

    /// HTTP 429 from the server
    #[error("Rate limited on '{path}', retry after {retry_after} seconds")]
    RateLimited { path: String, retry_after: u64 },

    /// Connection, timeout or body transfer failure
    #[error("Network error on '{path}': {source}")]
    Network {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    /// Response body did not match the expected envelope
    #[error("Failed to decode response from '{path}': {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Failure while fetching one page of a paginated endpoint
    #[error("Failed to fetch page {page} of '{path}': {source}")]
    Page {
        path: String,
        page: usize,
        #[source]
        source: Box<Error>,
    },

    /// The cancellation token fired before or during the request
    #[error("Request to '{path}' was cancelled")]
    Cancelled { path: String },

    /// The transport was used after it was closed
    #[error("Transport has been closed")]
    Closed,

    /// Base URL or path could not be turned into a request URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Client construction failed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Endpoint path the error relates to, if any
    pub fn path(&self) -> Option<&str> {
        match self {
            Error::Http { path, .. }
            | Error::RateLimited { path, .. }
            | Error::Network { path, .. }
            | Error::Decode { path, .. }
            | Error::Page { path, .. }
            | Error::Cancelled { path } => Some(path),
            Error::Closed | Error::InvalidUrl(_) | Error::Config(_) => None,
        }
    }

    /// Whether this error (or the page failure it wraps) is a cancellation
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled { .. } => true,
            Error::Page { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

impl RetryableError for Error {
    fn retry_decision(&self) -> RetryDecision {
        match self {
            Error::RateLimited { retry_after, .. } => {
                RetryDecision::RetryAfter(Duration::from_secs(*retry_after))
            }
            Error::Http { status, .. } if (500..=599).contains(status) => RetryDecision::Retry,
            Error::Network { source, .. } => {
                if source.is_connect() || source.is_timeout() {
                    RetryDecision::Retry
                } else {
                    RetryDecision::NoRetry
                }
            }
            Error::Page { source, .. } => source.retry_decision(),
            Error::Http { .. }
            | Error::Decode { .. }
            | Error::Cancelled { .. }
            | Error::Closed
            | Error::InvalidUrl(_)
            | Error::Config(_) => RetryDecision::NoRetry,
        }
    }
}
