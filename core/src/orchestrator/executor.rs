//! Orchestrator execution logic

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::channel::ChannelConfig;
use crate::config::{OutputMode, WorkloadConfig};
use crate::error::{BenchError, BenchResult};
use crate::report::{RawRecord, Report, ReportGenerator};
use crate::request::RequestTemplate;
use crate::stop::{StopController, StopState};
use crate::traits::Transport;
use crate::worker::{RequestRateLimiter, WorkerStats};

use super::collector::ResultCollector;
use super::pool::WorkerPool;

/// Orchestrator manages the lifecycle of one run
///
/// Responsible for spawning workers, arming the deadline, coordinating stop
/// and producing the final report. An orchestrator runs at most once.
pub struct Orchestrator {
    /// Workload configuration (validated)
    pub(crate) config: WorkloadConfig,

    /// Transport (shared across workers)
    pub(crate) transport: Arc<dyn Transport>,

    /// Request template (shared across workers)
    pub(crate) template: Arc<RequestTemplate>,

    /// Queue sizing
    pub(crate) channel_config: ChannelConfig,

    /// Sender half of the raw record stream, once subscribed
    record_sink: Mutex<Option<mpsc::Sender<RawRecord>>>,

    /// Run-scoped stop signal
    pub(crate) stop: StopController,

    /// Set by the first call to `run`
    started: AtomicBool,
}

impl Orchestrator {
    /// Create a new orchestrator
    ///
    /// Use `OrchestratorBuilder` for a more ergonomic construction.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the workload is invalid. Nothing is
    /// spawned in that case.
    pub fn new(
        config: WorkloadConfig,
        transport: Arc<dyn Transport>,
        template: RequestTemplate,
        channel_config: ChannelConfig,
    ) -> BenchResult<Self> {
        config.validate()?;
        if !channel_config.is_usable() {
            return Err(BenchError::config("channel buffers must be at least 1"));
        }

        Ok(Self {
            config,
            transport,
            template: Arc::new(template),
            channel_config,
            record_sink: Mutex::new(None),
            stop: StopController::new(),
            started: AtomicBool::new(false),
        })
    }

    /// Get the workload configuration
    pub fn config(&self) -> &WorkloadConfig {
        &self.config
    }

    /// Request a graceful stop
    ///
    /// Idempotent and callable from any task. Workers finish the exchange they
    /// have in flight and exit; `run` then returns a report over everything
    /// recorded so far. Returns `true` only for the call that had an effect.
    pub fn stop(&self) -> bool {
        self.stop.trigger()
    }

    /// A handle that can stop this run from elsewhere (signal handlers, timers)
    pub fn stop_handle(&self) -> StopController {
        self.stop.clone()
    }

    /// Current stop state
    pub fn state(&self) -> StopState {
        self.stop.state()
    }

    /// Receive a [`RawRecord`] for every outcome as the run produces them
    ///
    /// Records arrive in the order the collector sees outcomes, and the stream
    /// ends when `run` returns. The receiver must be drained concurrently
    /// with `run`: a full queue holds up the collector, and with it the
    /// workers.
    ///
    /// # Errors
    ///
    /// Fails once the run has started or if the stream was already taken.
    pub fn subscribe_records(&self) -> BenchResult<mpsc::Receiver<RawRecord>> {
        // Checked under the lock so `run` either sees the sender or rejects us.
        let mut sink = self.record_sink.lock().unwrap_or_else(PoisonError::into_inner);
        if self.started.load(Ordering::Acquire) {
            return Err(BenchError::already_started());
        }
        if sink.is_some() {
            return Err(BenchError::orchestration("record stream already taken"));
        }

        let (tx, rx) = mpsc::channel(self.channel_config.record_buffer);
        *sink = Some(tx);
        Ok(rx)
    }

    /// Run the workload to completion
    ///
    /// Blocks until the request budget is spent, the duration elapses or
    /// `stop` is called, then returns the report.
    ///
    /// # Errors
    ///
    /// Fails if called a second time, or if every worker task died.
    pub async fn run(&self) -> BenchResult<Report> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(BenchError::already_started());
        }

        let started_at = chrono::Utc::now();
        let run_start = Instant::now();

        tracing::info!(
            url = %self.template.url,
            method = %self.template.method,
            concurrency = self.config.concurrency,
            run_mode = ?self.config.run_mode,
            rate_limit = ?self.config.rate_limit,
            transport = self.transport.name(),
            "Starting run"
        );

        let mut collector = ResultCollector::new(&self.config);
        let record_sink = self
            .record_sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match record_sink {
            Some(sink) => collector = collector.with_record_sink(sink),
            None if self.config.output == OutputMode::Raw => {
                tracing::warn!("Raw output without a record subscriber, records are discarded");
            }
            None => {}
        }

        let (outcome_tx, outcome_rx) = mpsc::channel(self.channel_config.outcome_buffer);
        let collector = collector.spawn(outcome_rx);
        let rate_limiter = Arc::new(RequestRateLimiter::new(self.config.rate_limit));
        let deadline = self.config.run_mode.deadline().map(|d| self.arm_deadline(d));

        let pool = WorkerPool::start(
            &self.config,
            Arc::clone(&self.transport),
            Arc::clone(&self.template),
            outcome_tx,
            rate_limiter,
            &self.stop,
            run_start,
        );
        let worker_stats = match pool {
            Ok(pool) => pool.wait().await,
            Err(e) => Err(e),
        };
        let elapsed = run_start.elapsed();

        if let Some(deadline) = deadline {
            deadline.abort();
        }
        self.stop.mark_stopped();

        // Every sender is gone once the workers have exited, so this ends.
        let collector = collector
            .await
            .map_err(|e| BenchError::orchestration(format!("collector task failed: {}", e)))?;
        let worker_stats = worker_stats?;

        let totals: WorkerStats = worker_stats.iter().sum();
        tracing::info!(
            elapsed_secs = elapsed.as_secs_f64(),
            completed = totals.completed,
            failed = totals.failed,
            workers = worker_stats.len(),
            records = collector.emitted(),
            "Run completed"
        );

        let snapshot = collector.into_snapshot(started_at, elapsed);
        Ok(ReportGenerator::new(self.config.output).finalize(snapshot))
    }

    /// Run with Ctrl+C signal handling
    ///
    /// The first Ctrl+C triggers a graceful stop.
    pub async fn run_with_signal_handling(&self) -> BenchResult<Report> {
        let stop = self.stop.clone();

        let signal_handle = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Received Ctrl+C, stopping...");
                    stop.trigger();
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                }
            }
        });

        let result = self.run().await;

        signal_handle.abort();

        result
    }

    /// Trigger a stop once `duration` has elapsed
    fn arm_deadline(&self, duration: Duration) -> JoinHandle<()> {
        let stop = self.stop.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(duration) => {
                    if stop.trigger() {
                        tracing::info!(duration = ?duration, "Run duration elapsed, stopping");
                    }
                }
                _ = stop.stopping() => {}
            }
        })
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("transport", &self.transport.name())
            .field("url", &self.template.url.as_str())
            .field("state", &self.stop.state())
            .finish()
    }
}
