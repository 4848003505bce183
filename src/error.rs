// src/error.rs

//! Unified error handling for the watcher.
//!
//! Two layers of errors live here:
//!
//! - [`AppError`]: process-level failures. `Repository` and `Orchestration`
//!   are fatal to the watch loop; `Notify` is best effort.
//! - [`ProbeFailure`]: the per-subscription outcome of a failed fetch or
//!   extraction. These are always recovered inside the cycle.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Subscription repository could not load or persist
    #[error("Repository error during {operation}: {message}")]
    Repository {
        operation: &'static str,
        message: String,
    },

    /// Unexpected failure inside the watch cycle itself
    #[error("Orchestration error: {0}")]
    Orchestration(String),

    /// Alert delivery failed
    #[error("Notify error: {0}")]
    Notify(String),
}

impl AppError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a repository error for the given operation.
    pub fn repository(operation: &'static str, message: impl fmt::Display) -> Self {
        Self::Repository {
            operation,
            message: message.to_string(),
        }
    }

    /// Create an orchestration error.
    pub fn orchestration(message: impl fmt::Display) -> Self {
        Self::Orchestration(message.to_string())
    }

    /// Create a notification error.
    pub fn notify(message: impl fmt::Display) -> Self {
        Self::Notify(message.to_string())
    }
}

/// Transport-level failure while fetching a URL.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
}

impl FetchError {
    /// Create a transport error.
    pub fn transport(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.to_string(),
        }
    }
}

/// Failure to turn a fetched body into comparable text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("Invalid selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    #[error("selector '{selector}' matched nothing")]
    NoMatch { selector: String },
}

impl ExtractError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }
}

/// Why a subscription produced no comparable text this cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    /// Non-200 response. Retried next cycle without penalty.
    #[error("unexpected status {status}")]
    Soft { status: u16 },

    /// Counts toward eviction.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Counts toward eviction.
    #[error(transparent)]
    Extract(#[from] ExtractError),
}

impl ProbeFailure {
    /// Whether this failure increments the consecutive-error counter.
    pub fn is_hard(&self) -> bool {
        !matches!(self, Self::Soft { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_failure_severity() {
        assert!(!ProbeFailure::Soft { status: 503 }.is_hard());
        assert!(ProbeFailure::from(FetchError::transport("http://x", "refused")).is_hard());
        assert!(
            ProbeFailure::from(ExtractError::NoMatch {
                selector: "#price".into()
            })
            .is_hard()
        );
    }

    #[test]
    fn test_repository_error_message() {
        let err = AppError::repository("save", "disk full");
        assert_eq!(err.to_string(), "Repository error during save: disk full");
    }
}
