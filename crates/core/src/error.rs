//! Error types for folio operations.
//!
//! This module defines the main error type [`FolioError`] and the
//! [`FailureKind`] classification shared with [`crate::fetch::FetchResult`].
//!
//! Every variant renders as a short, human-readable message. Raw transport
//! details are condensed before they reach this type so callers can show
//! the `Display` output directly.
//!
//! # Example
//!
//! ```rust
//! use folio_core::{FolioError, Result};
//!
//! fn pick_source(name: &str) -> Result<()> {
//!     if name.is_empty() {
//!         return Err(FolioError::UnknownSource(name.to_string()));
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;

use thiserror::Error;

/// Classification of a failed HTTP fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The attempt exceeded the per-request timeout.
    Timeout,
    /// Connection refused, reset, DNS failure, or a broken body stream.
    Network,
    /// The server answered with a non-success status code.
    HttpStatus(u16),
    /// Certificate or handshake failure.
    Tls,
    /// The URL could not be parsed; nothing was sent.
    InvalidUrl,
}

impl FailureKind {
    /// Whether another attempt may succeed.
    ///
    /// Only transport-level failures are retried. Status failures are
    /// answers from the server and retrying them would just repeat the answer.
    pub fn is_retryable(self) -> bool {
        matches!(self, FailureKind::Timeout | FailureKind::Network)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "timed out"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::HttpStatus(status) => write!(f, "HTTP {}", status),
            FailureKind::Tls => write!(f, "TLS error"),
            FailureKind::InvalidUrl => write!(f, "invalid URL"),
        }
    }
}

/// Main error type for retrieval operations.
///
/// Parse failures (no selector matched) are deliberately absent: they are
/// represented as empty results or placeholder text, never as errors.
#[derive(Error, Debug)]
pub enum FolioError {
    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// A fetch failed after exhausting its attempts.
    #[error("{kind}: {detail}")]
    Fetch { kind: FailureKind, detail: String },

    /// Invalid URL provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A CSS selector in a source profile does not parse.
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// No source profile is registered under this name.
    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// Source table or engine configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Reading a source table from disk failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A source table file is not valid JSON for the expected shape.
    #[error("Invalid source table: {0}")]
    Json(#[from] serde_json::Error),
}

impl FolioError {
    /// The fetch failure kind, if this error came from a fetch.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            FolioError::Fetch { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result type alias for FolioError.
pub type Result<T> = std::result::Result<T, FolioError>;
