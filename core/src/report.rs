//! Final report generation
//!
//! [`ReportGenerator::finalize`] turns the frozen [`RunSnapshot`] into either a
//! [`Summary`] or a [`RawRun`]. In raw mode the [`RawRecord`]s themselves have
//! already left through the orchestrator's record sink while the run was going.
//! Rendering to text or CSV is left to the `barrage-report` crate.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::OutputMode;
use crate::error::ErrorKind;
use crate::metrics::{HistogramBucket, LatencyPercentiles, PhaseStats};
use crate::orchestrator::RunSnapshot;
use crate::response::RequestOutcome;

/// Result of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Report {
    /// Aggregated statistics
    Summary(Summary),
    /// Records were streamed; only the run totals remain
    Raw(RawRun),
}

impl Report {
    /// The summary, if this is a summary report
    pub fn summary(&self) -> Option<&Summary> {
        match self {
            Report::Summary(summary) => Some(summary),
            Report::Raw(_) => None,
        }
    }

    /// The raw run totals, if this is a raw report
    pub fn raw(&self) -> Option<&RawRun> {
        match self {
            Report::Summary(_) => None,
            Report::Raw(raw) => Some(raw),
        }
    }
}

/// Aggregated statistics of a run (all times in seconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    /// Wall-clock start of the run
    pub started_at: DateTime<Utc>,
    /// Run length
    pub elapsed_secs: f64,
    /// Outcomes recorded
    pub total: u64,
    /// Exchanges that produced a response
    pub completed: u64,
    /// Exchanges that failed
    pub failed: u64,
    /// `completed / elapsed`
    pub requests_per_second: f64,
    /// Mean successful latency
    pub average: Option<f64>,
    /// Shortest successful latency
    pub fastest: Option<f64>,
    /// Longest successful latency
    pub slowest: Option<f64>,
    /// Response bytes over successful exchanges
    pub total_bytes: u64,
    /// `total_bytes / completed`
    pub bytes_per_request: f64,
    /// Latency distribution, absent when nothing completed
    pub percentiles: Option<LatencyPercentiles>,
    /// Response-time histogram from fastest to slowest
    pub histogram: Vec<HistogramBucket>,
    /// Sub-phase statistics
    pub phases: PhaseStats,
    /// Status-code distribution
    pub status_codes: BTreeMap<u16, u64>,
    /// Error-kind distribution
    pub errors: BTreeMap<ErrorKind, u64>,
}

/// Totals of a raw run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRun {
    /// Wall-clock start of the run
    pub started_at: DateTime<Utc>,
    /// Run length in seconds
    pub elapsed_secs: f64,
    /// Records handed to the record sink, in arrival order
    pub records: u64,
    /// Exchanges that produced a response
    pub completed: u64,
    /// Exchanges that failed
    pub failed: u64,
}

/// One row of raw output
///
/// Field order is the column order of the CSV output. Times are seconds with
/// microsecond resolution; absent phases and a missing error stay empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Time since run start when the request was issued
    pub offset_secs: f64,
    /// Total exchange duration
    pub response_time_secs: f64,
    /// Connection setup
    pub connect_secs: Option<f64>,
    /// Request write
    pub write_secs: Option<f64>,
    /// Wait for first byte
    pub first_byte_secs: Option<f64>,
    /// Body read
    pub read_secs: Option<f64>,
    /// HTTP status, 0 on failure
    pub status: u16,
    /// Response body size
    pub bytes: u64,
    /// Failure kind
    pub error: Option<ErrorKind>,
    /// Issuing worker
    pub worker: usize,
}

fn secs(d: Duration) -> f64 {
    d.as_micros() as f64 / 1_000_000.0
}

impl From<&RequestOutcome> for RawRecord {
    fn from(outcome: &RequestOutcome) -> Self {
        Self {
            offset_secs: secs(outcome.offset),
            response_time_secs: secs(outcome.duration),
            connect_secs: outcome.phases.connect.map(secs),
            write_secs: outcome.phases.write.map(secs),
            first_byte_secs: outcome.phases.first_byte.map(secs),
            read_secs: outcome.phases.read.map(secs),
            status: outcome.status,
            bytes: outcome.size,
            error: outcome.error,
            worker: outcome.worker_id,
        }
    }
}

/// Builds the final report of a run
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportGenerator {
    output: OutputMode,
}

impl ReportGenerator {
    /// Create a generator for the given output mode
    pub fn new(output: OutputMode) -> Self {
        Self { output }
    }

    /// Compute the report from a frozen snapshot
    pub fn finalize(&self, snapshot: RunSnapshot) -> Report {
        match self.output {
            OutputMode::Raw => Report::Raw(Self::raw(snapshot)),
            OutputMode::Summary => Report::Summary(Self::summarize(snapshot)),
        }
    }

    fn raw(snapshot: RunSnapshot) -> RawRun {
        RawRun {
            started_at: snapshot.started_at,
            elapsed_secs: snapshot.elapsed.as_secs_f64(),
            records: snapshot.emitted,
            completed: snapshot.stats.completed,
            failed: snapshot.stats.failed,
        }
    }

    fn summarize(snapshot: RunSnapshot) -> Summary {
        let stats = snapshot.stats;
        let elapsed = snapshot.elapsed.as_secs_f64();

        let requests_per_second = if elapsed > 0.0 {
            stats.completed as f64 / elapsed
        } else {
            0.0
        };
        let bytes_per_request = if stats.completed > 0 {
            stats.total_bytes as f64 / stats.completed as f64
        } else {
            0.0
        };
        let average = stats.average();

        let (percentiles, histogram) = match (stats.fastest, stats.slowest) {
            (Some(fastest), Some(slowest)) => stats
                .samples
                .distribution(fastest, slowest)
                .map(|(p, h)| (Some(p), h))
                .unwrap_or_default(),
            _ => (None, Vec::new()),
        };

        Summary {
            started_at: snapshot.started_at,
            elapsed_secs: elapsed,
            total: stats.completed + stats.failed,
            completed: stats.completed,
            failed: stats.failed,
            requests_per_second,
            average,
            fastest: stats.fastest,
            slowest: stats.slowest,
            total_bytes: stats.total_bytes,
            bytes_per_request,
            percentiles,
            histogram,
            phases: stats.phases,
            status_codes: stats.status_codes,
            errors: stats.errors,
        }
    }
}
