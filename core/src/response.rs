//! Exchange results and per-request outcomes

pub use crate::error::ErrorKind;

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sub-phase timings of one exchange
///
/// Each phase is optional: transports report only what they can observe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTimings {
    /// DNS lookup plus connection (and TLS) establishment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect: Option<Duration>,

    /// Writing the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write: Option<Duration>,

    /// Waiting for the first response byte
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_byte: Option<Duration>,

    /// Reading the response body
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<Duration>,
}

impl PhaseTimings {
    /// True if the transport reported no phase at all
    pub fn is_empty(&self) -> bool {
        self.connect.is_none()
            && self.write.is_none()
            && self.first_byte.is_none()
            && self.read.is_none()
    }
}

/// What a transport returns for a completed exchange
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeResponse {
    /// HTTP status code
    pub status: u16,

    /// Response body size in bytes
    pub size: u64,

    /// Observed sub-phase timings
    pub phases: PhaseTimings,
}

impl ExchangeResponse {
    /// Create a response with no phase timings
    pub fn new(status: u16, size: u64) -> Self {
        Self {
            status,
            size,
            phases: PhaseTimings::default(),
        }
    }

    /// Attach phase timings
    pub fn with_phases(mut self, phases: PhaseTimings) -> Self {
        self.phases = phases;
        self
    }
}

/// Recorded result of one request attempt
///
/// Created by a worker, then moved into the collector; never shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOutcome {
    /// Time between run start and the moment the request was issued
    pub offset: Duration,

    /// Total wall time of the exchange
    pub duration: Duration,

    /// Sub-phase timings reported by the transport
    #[serde(default)]
    pub phases: PhaseTimings,

    /// HTTP status code, 0 when the exchange failed
    pub status: u16,

    /// Response body size in bytes
    pub size: u64,

    /// Failure classification, `None` on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,

    /// Issuing worker (diagnostics only)
    pub worker_id: usize,
}

impl RequestOutcome {
    /// Outcome of an exchange that produced a response
    pub fn success(
        worker_id: usize,
        offset: Duration,
        duration: Duration,
        response: ExchangeResponse,
    ) -> Self {
        Self {
            offset,
            duration,
            phases: response.phases,
            status: response.status,
            size: response.size,
            error: None,
            worker_id,
        }
    }

    /// Outcome of an exchange that failed before a response was read
    pub fn failure(worker_id: usize, offset: Duration, duration: Duration, kind: ErrorKind) -> Self {
        Self {
            offset,
            duration,
            phases: PhaseTimings::default(),
            status: 0,
            size: 0,
            error: Some(kind),
            worker_id,
        }
    }

    /// True if the exchange produced a response (any status code)
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_outcome_carries_response() {
        let phases = PhaseTimings {
            first_byte: Some(Duration::from_millis(3)),
            read: Some(Duration::from_millis(1)),
            ..Default::default()
        };
        let response = ExchangeResponse::new(503, 42).with_phases(phases);
        let outcome = RequestOutcome::success(
            7,
            Duration::from_millis(10),
            Duration::from_millis(4),
            response,
        );

        // A 5xx is still a completed exchange.
        assert!(outcome.is_success());
        assert_eq!(outcome.status, 503);
        assert_eq!(outcome.size, 42);
        assert_eq!(outcome.phases, phases);
        assert_eq!(outcome.worker_id, 7);
    }

    #[test]
    fn test_failure_outcome_has_no_status() {
        let outcome = RequestOutcome::failure(
            0,
            Duration::ZERO,
            Duration::from_secs(20),
            ErrorKind::Timeout,
        );
        assert!(!outcome.is_success());
        assert_eq!(outcome.status, 0);
        assert_eq!(outcome.size, 0);
        assert!(outcome.phases.is_empty());
    }

    #[test]
    fn test_outcome_json_skips_absent_fields() {
        let outcome = RequestOutcome::success(
            1,
            Duration::ZERO,
            Duration::from_millis(1),
            ExchangeResponse::new(200, 0),
        );
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(!json.contains("error"));
        assert!(!json.contains("first_byte"));
        assert!(json.contains("\"status\":200"));
    }
}
