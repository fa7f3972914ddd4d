//! Outcome collection
//!
//! Workers never touch shared statistics. They push each [`RequestOutcome`]
//! into a bounded channel and a single consumer task folds them into
//! [`AggregateStats`], so every outcome is applied exactly once and in
//! arrival order.
//!
//! With a record sink attached, each outcome is also converted to a
//! [`RawRecord`] and passed on as it arrives. The collector itself never
//! retains outcomes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::{OutputMode, RunMode, WorkloadConfig};
use crate::metrics::{AggregateStats, LatencySamples};
use crate::report::RawRecord;
use crate::response::RequestOutcome;

/// Single-consumer aggregator of request outcomes
#[derive(Debug)]
pub struct ResultCollector {
    stats: AggregateStats,
    sink: Option<mpsc::Sender<RawRecord>>,
    emitted: u64,
}

impl ResultCollector {
    /// Create a collector suited to the workload
    ///
    /// Count-bounded runs keep exact samples up to the configured limit;
    /// duration-bounded runs stream latencies into a histogram from the start.
    /// Raw output keeps no samples at all.
    pub fn new(config: &WorkloadConfig) -> Self {
        let samples = match (config.output, config.run_mode) {
            (OutputMode::Raw, _) => LatencySamples::discard(),
            (OutputMode::Summary, RunMode::Count(_)) => LatencySamples::exact(),
            (OutputMode::Summary, RunMode::Duration(_)) => LatencySamples::streaming(),
        };

        Self {
            stats: AggregateStats::new(samples, config.exact_sample_limit),
            sink: None,
            emitted: 0,
        }
    }

    /// Forward a [`RawRecord`] per outcome to `sink`
    pub fn with_record_sink(mut self, sink: mpsc::Sender<RawRecord>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Apply one outcome to the statistics
    pub fn add(&mut self, outcome: &RequestOutcome) {
        self.stats.record(outcome);
    }

    /// Statistics so far
    pub fn stats(&self) -> &AggregateStats {
        &self.stats
    }

    /// Records handed to the sink
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    async fn forward(&mut self, outcome: &RequestOutcome) {
        let Some(sink) = &self.sink else {
            return;
        };
        if sink.send(RawRecord::from(outcome)).await.is_ok() {
            self.emitted += 1;
        } else {
            tracing::warn!(
                emitted = self.emitted,
                "Record sink closed, further records are dropped"
            );
            self.sink = None;
        }
    }

    /// Drain `rx` on a dedicated task until every sender is dropped
    ///
    /// The task hands the collector back once the channel closes, which
    /// happens only after all workers have exited. The record sink is
    /// dropped at that point, closing the record stream.
    pub fn spawn(mut self, mut rx: mpsc::Receiver<RequestOutcome>) -> JoinHandle<Self> {
        tokio::spawn(async move {
            while let Some(outcome) = rx.recv().await {
                self.add(&outcome);
                self.forward(&outcome).await;
            }
            self.sink = None;
            tracing::debug!(
                completed = self.stats.completed,
                failed = self.stats.failed,
                emitted = self.emitted,
                "Collector drained"
            );
            self
        })
    }

    /// Freeze the collected state
    pub fn into_snapshot(self, started_at: DateTime<Utc>, elapsed: Duration) -> RunSnapshot {
        RunSnapshot {
            started_at,
            elapsed,
            stats: self.stats,
            emitted: self.emitted,
        }
    }
}

/// Immutable state of a finished run, input to the report generator
#[derive(Debug, Clone)]
pub struct RunSnapshot {
    /// Wall-clock start of the run
    pub started_at: DateTime<Utc>,
    /// Time from run start until the last worker exited
    pub elapsed: Duration,
    /// Aggregate statistics
    pub stats: AggregateStats,
    /// Raw records passed to the record sink
    pub emitted: u64,
}
