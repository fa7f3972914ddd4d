//! Error types for barrage-core
//!
//! Two separate taxonomies live here:
//!
//! - [`BenchError`]: failures of the engine itself (bad configuration, a run
//!   started twice, a worker task that died). These are surfaced to the caller.
//! - [`ErrorKind`]: the classification of a failed HTTP exchange. These never
//!   escape a worker; they are recorded on the outcome and counted.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of an engine error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchErrorKind {
    /// Invalid or missing configuration
    Config,
    /// A run could not be orchestrated
    Orchestration,
    /// The transport could not be constructed
    Transport,
}

impl std::fmt::Display for BenchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BenchErrorKind::Config => write!(f, "configuration error"),
            BenchErrorKind::Orchestration => write!(f, "orchestration error"),
            BenchErrorKind::Transport => write!(f, "transport error"),
        }
    }
}

/// Engine error
#[derive(Error, Debug, Clone)]
#[error("{kind}: {message}")]
pub struct BenchError {
    /// Error category
    pub kind: BenchErrorKind,
    /// Human-readable detail
    pub message: String,
}

impl BenchError {
    /// Create an error of the given kind
    pub fn new(kind: BenchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Invalid configuration
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(BenchErrorKind::Config, message)
    }

    /// A required builder field was never set
    pub fn missing_config(field: &str) -> Self {
        Self::config(format!("missing required field: {}", field))
    }

    /// Run-level failure (e.g. every worker task died)
    pub fn orchestration(message: impl Into<String>) -> Self {
        Self::new(BenchErrorKind::Orchestration, message)
    }

    /// `run()` was called on an orchestrator that has already run
    pub fn already_started() -> Self {
        Self::orchestration("run already started; an orchestrator runs at most once")
    }

    /// Transport construction failed
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(BenchErrorKind::Transport, message)
    }

    /// Check whether this is a configuration error
    pub fn is_config(&self) -> bool {
        self.kind == BenchErrorKind::Config
    }
}

impl From<crate::config::ConfigError> for BenchError {
    fn from(err: crate::config::ConfigError) -> Self {
        BenchError::config(err.to_string())
    }
}

/// Result type alias
pub type BenchResult<T> = std::result::Result<T, BenchError>;

/// Classification of a failed HTTP exchange
///
/// Ordered so that error histograms render deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Per-request timeout elapsed
    Timeout,
    /// Connection could not be established (refused, DNS, TLS handshake)
    Connect,
    /// Redirect policy violated (loop or too many hops)
    Redirect,
    /// Request could not be built or written
    Request,
    /// Response body could not be read (including early close)
    Body,
    /// Response could not be decoded (e.g. bad gzip stream)
    Decode,
    /// Anything else
    Unknown,
}

impl ErrorKind {
    /// Stable identifier used in raw records and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Connect => "connect",
            ErrorKind::Redirect => "redirect",
            ErrorKind::Request => "request",
            ErrorKind::Body => "body",
            ErrorKind::Decode => "decode",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
