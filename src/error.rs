// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Error types for xfetch
//!
//! Only three kinds of failure are part of the interception contract:
//! bad configuration (`InvalidArgument`), a failing response transformer
//! (`Transform`, propagated to the caller) and a failing listener
//! (`Listener`, reported through `tracing` and never returned).
//! The remaining variants come from the transport and body decoding.

use thiserror::Error;

/// Result type alias for xfetch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xfetch
#[derive(Error, Debug)]
pub enum Error {
    /// Bad configuration or argument, raised synchronously
    #[error("[xfetch] invalid argument: {0}")]
    InvalidArgument(String),

    /// A response transformer failed; aborts delivery of the response
    #[error("response transformer failed: {0}")]
    Transform(anyhow::Error),

    /// A listener failed; only ever logged
    #[error("response listener #{index} failed: {reason}")]
    Listener { index: usize, reason: String },

    /// A middleware failed; aborts the intercepted call
    #[error("middleware failed: {0}")]
    Middleware(String),

    /// The read handle was already consumed
    #[error("body has already been consumed")]
    BodyConsumed,

    /// Operation not valid in the current request state
    #[error("invalid state: {operation} while {state}")]
    InvalidState { operation: String, state: String },

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Body decoding or encoding failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Network failure reported by a primitive
    #[error("Network error: {0}")]
    Network(String),

    /// Timeout error
    #[error("Operation timed out after {duration_ms}ms: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
        url: Option<String>,
    },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an invalid argument error
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Create a middleware error
    pub fn middleware<S: Into<String>>(msg: S) -> Self {
        Error::Middleware(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(operation: impl Into<String>, state: impl std::fmt::Debug) -> Self {
        Error::InvalidState {
            operation: operation.into(),
            state: format!("{:?}", state),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Error::Network(msg.into())
    }

    /// Create a timeout error with URL
    pub fn timeout_with_url(
        operation: impl Into<String>,
        duration_ms: u64,
        url: impl Into<String>,
    ) -> Self {
        Error::Timeout {
            operation: operation.into(),
            duration_ms,
            url: Some(url.into()),
        }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Timeout { .. } => true,
            Error::Http(e) => e.is_timeout(),
            _ => false,
        }
    }

    /// Check if this is a network error
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Http(_))
    }

    /// Check if this came out of a user-supplied transformer
    pub fn is_transform(&self) -> bool {
        matches!(self, Error::Transform(_))
    }

    /// Check if this is recoverable (can retry)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Timeout { .. } | Error::Network(_) | Error::Http(_)
        )
    }

    /// Get URL if available
    pub fn url(&self) -> Option<&str> {
        match self {
            Error::Timeout { url: Some(u), .. } => Some(u),
            _ => None,
        }
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_message() {
        let err = Error::invalid_argument("`fetch` should be a function");
        assert_eq!(
            err.to_string(),
            "[xfetch] invalid argument: `fetch` should be a function"
        );
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_timeout_error() {
        let err = Error::timeout_with_url("fetch", 5000, "https://example.com");

        assert!(err.is_timeout());
        assert!(err.is_recoverable());
        assert_eq!(err.url(), Some("https://example.com"));
    }

    #[test]
    fn test_transform_error_keeps_cause() {
        let err = Error::Transform(anyhow::anyhow!("field `n` missing"));
        assert!(err.is_transform());
        assert!(err.to_string().contains("field `n` missing"));
    }

    #[test]
    fn test_invalid_state_formats_phase() {
        #[derive(Debug)]
        enum Phase {
            Unopened,
        }
        let err = Error::invalid_state("send", Phase::Unopened);
        assert_eq!(err.to_string(), "invalid state: send while Unopened");
    }
}
