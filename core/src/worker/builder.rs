//! Builder pattern for Worker construction

use crate::error::{BenchError, BenchResult};
use crate::request::RequestTemplate;
use crate::response::RequestOutcome;
use crate::stop::StopController;
use crate::traits::Transport;

use super::budget::RequestBudget;
use super::executor::Worker;
use super::rate_limiter::RequestRateLimiter;

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

/// Builder for creating Worker instances
///
/// # Example
/// ```ignore
/// let worker = WorkerBuilder::new(0)
///     .transport(transport)
///     .template(template)
///     .outcome_tx(tx)
///     .stop(stop.clone())
///     .budget(budget)
///     .build()?;
/// ```
pub struct WorkerBuilder {
    id: usize,
    transport: Option<Arc<dyn Transport>>,
    template: Option<Arc<RequestTemplate>>,
    outcome_tx: Option<mpsc::Sender<RequestOutcome>>,
    rate_limiter: Option<Arc<RequestRateLimiter>>,
    stop: Option<StopController>,
    budget: Option<Arc<RequestBudget>>,
    run_start: Option<Instant>,
}

impl WorkerBuilder {
    /// Create a new builder with the given worker ID
    pub fn new(id: usize) -> Self {
        Self {
            id,
            transport: None,
            template: None,
            outcome_tx: None,
            rate_limiter: None,
            stop: None,
            budget: None,
            run_start: None,
        }
    }

    /// Set the transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the request template
    pub fn template(mut self, template: Arc<RequestTemplate>) -> Self {
        self.template = Some(template);
        self
    }

    /// Set the outcome channel sender
    pub fn outcome_tx(mut self, tx: mpsc::Sender<RequestOutcome>) -> Self {
        self.outcome_tx = Some(tx);
        self
    }

    /// Set the shared rate limiter (defaults to unlimited)
    pub fn rate_limiter(mut self, limiter: Arc<RequestRateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Set the stop signal
    pub fn stop(mut self, stop: StopController) -> Self {
        self.stop = Some(stop);
        self
    }

    /// Set a shared request budget for count-bounded runs
    pub fn budget(mut self, budget: Arc<RequestBudget>) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Set the run start instant (defaults to build time)
    pub fn run_start(mut self, start: Instant) -> Self {
        self.run_start = Some(start);
        self
    }

    /// Build the Worker
    ///
    /// # Errors
    /// Returns an error if any required field is missing.
    pub fn build(self) -> BenchResult<Worker> {
        let transport = self
            .transport
            .ok_or(BenchError::missing_config("transport"))?;
        let template = self
            .template
            .ok_or(BenchError::missing_config("template"))?;
        let outcome_tx = self
            .outcome_tx
            .ok_or(BenchError::missing_config("outcome_tx"))?;
        let stop = self.stop.ok_or(BenchError::missing_config("stop"))?;

        let rate_limiter = self
            .rate_limiter
            .unwrap_or_else(|| Arc::new(RequestRateLimiter::unlimited()));

        Ok(Worker::new(
            self.id,
            transport,
            template,
            outcome_tx,
            rate_limiter,
            stop,
            self.budget,
            self.run_start.unwrap_or_else(Instant::now),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_missing_transport() {
        let (tx, _rx) = mpsc::channel(1);
        let result = WorkerBuilder::new(0)
            .outcome_tx(tx)
            .stop(StopController::new())
            .build();

        let err = result.unwrap_err();
        assert!(err.message.contains("transport"));
        assert!(err.is_config());
    }

    #[test]
    fn test_builder_missing_stop() {
        let result = WorkerBuilder::new(0).build();
        assert!(result.is_err());
    }
}
