//! Mapping of reqwest failures onto outcome error kinds

use barrage_core::{ErrorKind, TransportError};

/// Classify a reqwest error
///
/// Timeouts win over everything else: reqwest flags a timed-out connect as
/// both a timeout and a connect error, and the per-request timeout is what
/// the user configured.
pub fn classify(err: reqwest::Error) -> TransportError {
    let kind = if err.is_timeout() {
        ErrorKind::Timeout
    } else if err.is_connect() {
        ErrorKind::Connect
    } else if err.is_redirect() {
        ErrorKind::Redirect
    } else if err.is_body() {
        ErrorKind::Body
    } else if err.is_decode() {
        ErrorKind::Decode
    } else if err.is_request() || err.is_builder() {
        ErrorKind::Request
    } else {
        ErrorKind::Unknown
    };

    TransportError::new(kind, error_chain(&err))
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
