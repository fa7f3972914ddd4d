//! Worker pool: spawns the workers of a run and joins them

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::WorkloadConfig;
use crate::error::{BenchError, BenchResult};
use crate::request::RequestTemplate;
use crate::response::RequestOutcome;
use crate::stop::StopController;
use crate::traits::Transport;
use crate::worker::{RequestBudget, RequestRateLimiter, WorkerBuilder, WorkerStats};

/// The `C` workers of one run
pub struct WorkerPool {
    handles: Vec<JoinHandle<WorkerStats>>,
    budget: Option<Arc<RequestBudget>>,
}

impl WorkerPool {
    /// Spawn one worker per unit of concurrency and return immediately
    ///
    /// Count-bounded runs share a single [`RequestBudget`] so the pool issues
    /// exactly the target number of requests. The pool takes `outcome_tx` by
    /// value: once every worker has exited the collector's channel closes.
    ///
    /// Must be called from within a tokio runtime.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        config: &WorkloadConfig,
        transport: Arc<dyn Transport>,
        template: Arc<RequestTemplate>,
        outcome_tx: mpsc::Sender<RequestOutcome>,
        rate_limiter: Arc<RequestRateLimiter>,
        stop: &StopController,
        run_start: Instant,
    ) -> BenchResult<Self> {
        let budget = config
            .run_mode
            .request_target()
            .map(|target| Arc::new(RequestBudget::new(target)));

        let mut handles = Vec::with_capacity(config.concurrency);
        for worker_id in 0..config.concurrency {
            let mut builder = WorkerBuilder::new(worker_id)
                .transport(Arc::clone(&transport))
                .template(Arc::clone(&template))
                .outcome_tx(outcome_tx.clone())
                .rate_limiter(Arc::clone(&rate_limiter))
                .stop(stop.clone())
                .run_start(run_start);

            if let Some(budget) = &budget {
                builder = builder.budget(Arc::clone(budget));
            }

            let worker = builder.build()?;
            handles.push(tokio::spawn(worker.run()));
        }

        tracing::debug!(workers = handles.len(), "Worker pool started");

        Ok(Self { handles, budget })
    }

    /// Requests the pool will issue, `None` when duration-bounded
    pub fn request_target(&self) -> Option<usize> {
        self.budget.as_ref().map(|b| b.target())
    }

    /// Requests claimed so far, `None` when duration-bounded
    pub fn issued(&self) -> Option<usize> {
        self.budget.as_ref().map(|b| b.claimed())
    }

    /// Number of workers
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// True if the pool has no workers
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit
    ///
    /// A worker task that panicked is logged and skipped. Fails only when
    /// every worker died.
    pub async fn wait(self) -> BenchResult<Vec<WorkerStats>> {
        let mut results = Vec::with_capacity(self.handles.len());
        let mut worker_failures = 0;

        for (idx, handle) in self.handles.into_iter().enumerate() {
            match handle.await {
                Ok(stats) => {
                    tracing::debug!(
                        worker_id = idx,
                        completed = stats.completed,
                        failed = stats.failed,
                        bytes = stats.bytes,
                        "Worker completed"
                    );
                    results.push(stats);
                }
                Err(e) => {
                    worker_failures += 1;
                    tracing::warn!(worker_id = idx, error = %e, "Worker task died");
                }
            }
        }

        if results.is_empty() && worker_failures > 0 {
            return Err(BenchError::orchestration(format!(
                "All {} workers failed to complete",
                worker_failures
            )));
        }

        Ok(results)
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.handles.len())
            .field("request_target", &self.request_target())
            .field("issued", &self.issued())
            .finish()
    }
}
