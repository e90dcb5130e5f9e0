// src/error.rs

//! Unified error handling for the sentinel pipeline.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for sentinel operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Outcome of a single outbound request, as classified by the HTTP client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Timeout, connection reset or 5xx. Retryable.
    #[error("transient network error for {url}: {message}")]
    Transient { url: String, message: String },

    /// 4xx other than 429. Never retried.
    #[error("request to {url} failed with status {status}")]
    Permanent { url: String, status: u16 },

    /// 429. Retryable after backoff.
    #[error("rate limited by {url}")]
    RateLimited {
        url: String,
        retry_after: Option<Duration>,
    },

    /// Body could not be decoded into the expected shape.
    #[error("malformed response from {url}: {message}")]
    Malformed { url: String, message: String },
}

impl FetchError {
    /// Whether the retry policy should try again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::RateLimited { .. })
    }

    /// Whether the upstream answered "this identifier does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Permanent { status: 404, .. })
    }

    pub fn transient(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Transient {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn malformed(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Malformed {
            url: url.into(),
            message: message.to_string(),
        }
    }
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Outbound fetch failed after retries
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// The seen-postings store cannot be used; fatal for a run
    #[error("Dedup store unavailable: {0}")]
    StoreUnavailable(String),

    /// SQLite operation failed
    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client construction or transport failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Notification delivery failed
    #[error("Notify error for {context}: {message}")]
    Notify { context: String, message: String },
}

impl AppError {
    /// Create a store-unavailable error.
    pub fn store_unavailable(message: impl fmt::Display) -> Self {
        Self::StoreUnavailable(message.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a notification error with context.
    pub fn notify(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Notify {
            context: context.into(),
            message: message.to_string(),
        }
    }
}
