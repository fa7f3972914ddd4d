//! Core traits for HTTP transports
//!
//! The engine never talks to the network itself. It drives any type
//! implementing [`Transport`]; the reqwest-backed implementation lives in the
//! `barrage-transport` crate and tests plug in synthetic responders.

use crate::error::ErrorKind;
use crate::request::RequestTemplate;
use crate::response::ExchangeResponse;
use async_trait::async_trait;

// ============================================================================
// Transport Trait
// ============================================================================

/// One HTTP exchange, performed on behalf of a worker
///
/// Implementations are shared across all workers through an `Arc` and must be
/// safe for concurrent use (connection pool, TLS and HTTP/2 session state).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transport identifier (for logs and `Debug` output)
    fn name(&self) -> &str;

    /// Perform one exchange and read the full response body
    ///
    /// Any failure is returned as a [`TransportError`]; the worker turns it
    /// into a failed outcome and keeps going.
    async fn execute(&self, request: &RequestTemplate) -> Result<ExchangeResponse, TransportError>;
}

/// A failed exchange
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    /// Failure classification
    pub kind: ErrorKind,
    /// Transport-specific detail
    pub message: String,
}

impl TransportError {
    /// Create a new transport error
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Per-request timeout
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// Connection could not be established
    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connect, message)
    }

    /// Convert to ErrorKind for outcome classification
    pub fn to_error_kind(&self) -> ErrorKind {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_display() {
        let err = TransportError::connect("connection refused");
        assert_eq!(err.to_string(), "connect: connection refused");
        assert_eq!(err.to_error_kind(), ErrorKind::Connect);
    }

    #[test]
    fn test_transport_error_timeout() {
        let err = TransportError::timeout("after 20s");
        assert_eq!(err.kind, ErrorKind::Timeout);
    }
}
