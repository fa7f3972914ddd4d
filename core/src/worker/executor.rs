//! Worker execution loop

use crate::request::RequestTemplate;
use crate::response::RequestOutcome;
use crate::stop::StopController;
use crate::traits::Transport;

use super::budget::RequestBudget;
use super::rate_limiter::{Acquire, RequestRateLimiter};
use super::stats::WorkerStats;

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Worker issues requests in a loop: admit -> send -> report -> repeat
///
/// Workers are tokio tasks managed by the worker pool. They share the
/// transport, request template, rate limiter and budget via `Arc`, and hand
/// every outcome to the collector through a bounded mpsc channel.
pub struct Worker {
    /// Unique worker identifier
    id: usize,

    /// Transport (shared across workers via Arc)
    transport: Arc<dyn Transport>,

    /// Request template (shared, read-only)
    template: Arc<RequestTemplate>,

    /// Channel sender for outcomes
    outcome_tx: mpsc::Sender<RequestOutcome>,

    /// Rate limiter shared by the whole pool
    rate_limiter: Arc<RequestRateLimiter>,

    /// Run-scoped stop signal
    stop: StopController,

    /// Remaining-request counter, `None` for duration-bounded runs
    budget: Option<Arc<RequestBudget>>,

    /// Run start, the origin for outcome offsets
    run_start: Instant,
}

impl Worker {
    /// Create a new worker
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        transport: Arc<dyn Transport>,
        template: Arc<RequestTemplate>,
        outcome_tx: mpsc::Sender<RequestOutcome>,
        rate_limiter: Arc<RequestRateLimiter>,
        stop: StopController,
        budget: Option<Arc<RequestBudget>>,
        run_start: Instant,
    ) -> Self {
        Self {
            id,
            transport,
            template,
            outcome_tx,
            rate_limiter,
            stop,
            budget,
            run_start,
        }
    }

    /// Run the worker loop
    ///
    /// Returns when the budget is exhausted, the stop signal fires, or the
    /// collector goes away. An exchange already in flight is always finished
    /// and reported before the worker exits.
    pub async fn run(self) -> WorkerStats {
        let mut stats = WorkerStats::new(self.id);
        stats.begin();

        tracing::debug!(worker_id = self.id, "Worker started");

        loop {
            if self.stop.is_stopping() {
                tracing::debug!(worker_id = self.id, "Worker observed stop");
                break;
            }

            if !self.try_claim_request() {
                tracing::debug!(
                    worker_id = self.id,
                    "No more requests to claim, worker stopping"
                );
                break;
            }

            if self.rate_limiter.acquire(&self.stop).await == Acquire::Cancelled {
                // The slot was never used; give it back so counts stay exact.
                self.release_request();
                tracing::debug!(worker_id = self.id, "Stopped while waiting for a token");
                break;
            }

            let outcome = self.execute_one().await;
            stats.record(&outcome);

            if self.outcome_tx.send(outcome).await.is_err() {
                tracing::debug!(
                    worker_id = self.id,
                    "Outcome channel closed, worker stopping"
                );
                break;
            }
        }

        stats.finish();
        tracing::debug!(
            worker_id = self.id,
            completed = stats.completed,
            failed = stats.failed,
            elapsed_ms = ?stats.active_for().map(|d| d.as_millis()),
            "Worker finished"
        );

        stats
    }

    /// Perform one exchange and turn it into an outcome
    async fn execute_one(&self) -> RequestOutcome {
        let offset = self.run_start.elapsed();
        let start = Instant::now();
        let result = self.transport.execute(&self.template).await;
        let duration = start.elapsed();

        match result {
            Ok(response) => RequestOutcome::success(self.id, offset, duration, response),
            Err(e) => {
                tracing::debug!(worker_id = self.id, error = %e, "Request failed");
                RequestOutcome::failure(self.id, offset, duration, e.to_error_kind())
            }
        }
    }

    /// Claim a request slot from the shared budget
    ///
    /// Always succeeds for duration-bounded runs.
    fn try_claim_request(&self) -> bool {
        self.budget
            .as_ref()
            .map(|budget| budget.try_claim())
            .unwrap_or(true)
    }

    fn release_request(&self) {
        if let Some(budget) = &self.budget {
            budget.release();
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("transport", &self.transport.name())
            .field("url", &self.template.url.as_str())
            .field("rate_limiter", &self.rate_limiter)
            .field("budget", &self.budget.as_ref().map(|b| b.target()))
            .finish()
    }
}
