//! Run-scoped cancellation switch
//!
//! A [`StopController`] is the single cancellation primitive of a run. It is
//! cheap to clone; every clone observes the same state. Workers poll it between
//! requests and race it against the rate limiter while waiting for a token, so
//! a stop never interrupts an exchange that is already in flight.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Lifecycle of a run's stop signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopState {
    /// Workers may admit new requests
    Running,
    /// Stop requested; no new requests are admitted
    Stopping,
    /// Every worker has exited
    Stopped,
}

/// Shared stop signal
#[derive(Debug, Clone)]
pub struct StopController {
    state: Arc<watch::Sender<StopState>>,
}

impl StopController {
    /// Create a controller in the `Running` state
    pub fn new() -> Self {
        let (state, _) = watch::channel(StopState::Running);
        Self {
            state: Arc::new(state),
        }
    }

    /// Request a stop
    ///
    /// Only the first call while running has an effect. Returns `true` for
    /// that call and `false` for every later one.
    pub fn trigger(&self) -> bool {
        let fired = self.state.send_if_modified(|state| {
            if *state == StopState::Running {
                *state = StopState::Stopping;
                true
            } else {
                false
            }
        });
        if fired {
            tracing::debug!("Stop triggered");
        }
        fired
    }

    /// Non-blocking poll: true once a stop was requested (or the run ended)
    pub fn is_stopping(&self) -> bool {
        *self.state.borrow() != StopState::Running
    }

    /// Current state
    pub fn state(&self) -> StopState {
        *self.state.borrow()
    }

    /// Mark the run as fully stopped; called once all workers have exited
    pub(crate) fn mark_stopped(&self) {
        self.state.send_if_modified(|state| {
            if *state == StopState::Stopped {
                false
            } else {
                *state = StopState::Stopped;
                true
            }
        });
    }

    /// Resolve once a stop has been requested
    ///
    /// Cancellation safe: dropping the future loses nothing, so it can sit in
    /// a `tokio::select!` next to the rate limiter.
    pub async fn stopping(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|state| *state != StopState::Running).await;
    }

    /// Wait until every worker has exited, up to `timeout`
    ///
    /// Returns `true` if the run reached `Stopped` in time.
    pub async fn wait_until_stopped(&self, timeout: Duration) -> bool {
        let mut rx = self.state.subscribe();
        tokio::time::timeout(timeout, rx.wait_for(|state| *state == StopState::Stopped))
            .await
            .map(|res| res.is_ok())
            .unwrap_or(false)
    }
}

impl Default for StopController {
    fn default() -> Self {
        Self::new()
    }
}
