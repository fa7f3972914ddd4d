//! Per-worker counters

use std::iter::Sum;
use std::time::{Duration, Instant};

use crate::response::RequestOutcome;

/// What one worker did during a run
///
/// Diagnostic only: the report is built from the collector, not from these.
#[derive(Debug, Default, Clone)]
pub struct WorkerStats {
    /// Worker identifier
    pub worker_id: usize,

    /// Exchanges that produced a response
    pub completed: usize,

    /// Exchanges that failed
    pub failed: usize,

    /// Response bytes received
    pub bytes: u64,

    /// When the worker loop began
    pub started: Option<Instant>,

    /// When the worker loop exited
    pub finished: Option<Instant>,
}

impl WorkerStats {
    /// Empty counters for `worker_id`
    pub fn new(worker_id: usize) -> Self {
        Self {
            worker_id,
            ..Default::default()
        }
    }

    pub(crate) fn begin(&mut self) {
        self.started = Some(Instant::now());
    }

    pub(crate) fn finish(&mut self) {
        self.finished = Some(Instant::now());
    }

    /// Requests this worker issued
    pub fn issued(&self) -> usize {
        self.completed + self.failed
    }

    /// Fraction of issued requests that failed, 0.0 when none were issued
    pub fn failure_ratio(&self) -> f64 {
        match self.issued() {
            0 => 0.0,
            n => self.failed as f64 / n as f64,
        }
    }

    /// How long the worker has been (or was) running
    pub fn active_for(&self) -> Option<Duration> {
        let started = self.started?;
        Some(match self.finished {
            Some(finished) => finished.saturating_duration_since(started),
            None => started.elapsed(),
        })
    }

    /// Requests issued per second of activity
    pub fn issue_rate(&self) -> f64 {
        match self.active_for().map(|d| d.as_secs_f64()) {
            Some(secs) if secs > 0.0 => self.issued() as f64 / secs,
            _ => 0.0,
        }
    }

    /// Count one outcome
    pub fn record(&mut self, outcome: &RequestOutcome) {
        if outcome.is_success() {
            self.completed += 1;
            self.bytes += outcome.size;
        } else {
            self.failed += 1;
        }
    }

    /// Add another worker's counters to these
    pub fn absorb(&mut self, other: &WorkerStats) {
        self.completed += other.completed;
        self.failed += other.failed;
        self.bytes += other.bytes;
    }
}

impl<'a> Sum<&'a WorkerStats> for WorkerStats {
    fn sum<I: Iterator<Item = &'a WorkerStats>>(iter: I) -> Self {
        iter.fold(WorkerStats::default(), |mut total, stats| {
            total.absorb(stats);
            total
        })
    }
}
