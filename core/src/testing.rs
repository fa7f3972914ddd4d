//! Synthetic transport shared by the unit tests

use crate::error::ErrorKind;
use crate::request::RequestTemplate;
use crate::response::{ExchangeResponse, PhaseTimings};
use crate::traits::{Transport, TransportError};

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) struct MockTransport {
    delay: Option<Duration>,
    fail_every: Option<usize>,
    status: u16,
    size: u64,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self {
            delay: None,
            fail_every: None,
            status: 200,
            size: 64,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every n-th call (1-based)
    pub(crate) fn with_fail_every(mut self, n: usize) -> Self {
        self.fail_every = Some(n);
        self
    }

    pub(crate) fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, _request: &RequestTemplate) -> Result<ExchangeResponse, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(n) = self.fail_every {
            if call % n == 0 {
                return Err(TransportError::new(ErrorKind::Connect, "simulated failure"));
            }
        }

        let phases = PhaseTimings {
            first_byte: self.delay,
            read: Some(Duration::ZERO),
            ..Default::default()
        };
        Ok(ExchangeResponse::new(self.status, self.size).with_phases(phases))
    }
}

pub(crate) fn template() -> RequestTemplate {
    RequestTemplate::get("http://127.0.0.1:1/".parse().expect("valid url"))
}
