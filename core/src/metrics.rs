//! Metrics aggregation and percentile calculation
//!
//! All latencies are kept in seconds as `f64`. Count-bounded runs keep every
//! sample and compute exact percentiles; duration-bounded runs (or runs that
//! outgrow the exact-sample limit) fall back to an HdrHistogram.

use crate::error::ErrorKind;
use crate::response::{PhaseTimings, RequestOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Quantiles reported in the summary
pub const REPORTED_QUANTILES: [f64; 7] = [0.10, 0.25, 0.50, 0.75, 0.90, 0.95, 0.99];

/// Number of equal-width buckets in the latency histogram
pub const HISTOGRAM_BUCKETS: usize = 10;

/// Latency percentiles (all values in seconds)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct LatencyPercentiles {
    /// 10th percentile
    pub p10: f64,
    /// 25th percentile
    pub p25: f64,
    /// 50th percentile (median)
    pub p50: f64,
    /// 75th percentile
    pub p75: f64,
    /// 90th percentile
    pub p90: f64,
    /// 95th percentile
    pub p95: f64,
    /// 99th percentile
    pub p99: f64,
}

impl LatencyPercentiles {
    /// Calculate percentiles from values sorted ascending
    pub fn from_sorted(sorted: &[f64]) -> Self {
        Self::from_fn(|q| percentile(sorted, q))
    }

    fn from_fn(mut at: impl FnMut(f64) -> f64) -> Self {
        let [p10, p25, p50, p75, p90, p95, p99] = REPORTED_QUANTILES.map(&mut at);
        Self {
            p10,
            p25,
            p50,
            p75,
            p90,
            p95,
            p99,
        }
    }

    /// `(percent, seconds)` pairs in ascending order
    pub fn pairs(&self) -> [(u8, f64); 7] {
        [
            (10, self.p10),
            (25, self.p25),
            (50, self.p50),
            (75, self.p75),
            (90, self.p90),
            (95, self.p95),
            (99, self.p99),
        ]
    }

    fn clamp(self, lo: f64, hi: f64) -> Self {
        Self {
            p10: self.p10.clamp(lo, hi),
            p25: self.p25.clamp(lo, hi),
            p50: self.p50.clamp(lo, hi),
            p75: self.p75.clamp(lo, hi),
            p90: self.p90.clamp(lo, hi),
            p95: self.p95.clamp(lo, hi),
            p99: self.p99.clamp(lo, hi),
        }
    }
}

/// Calculate percentile from sorted values using linear interpolation
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let idx = p * (sorted.len() - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    let frac = idx - lower as f64;

    if upper >= sorted.len() {
        sorted[sorted.len() - 1]
    } else {
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}

/// Highest latency the streaming histogram tracks: one hour, in microseconds
const HISTOGRAM_MAX_MICROS: u64 = 3_600_000_000;

/// In-memory histogram for bounded-memory percentile calculation
///
/// Microsecond resolution, three significant digits. Samples beyond one hour
/// are clamped to the upper bound.
#[derive(Debug, Clone)]
pub struct LatencyHistogram {
    histogram: hdrhistogram::Histogram<u64>,
}

impl LatencyHistogram {
    /// Create a new histogram
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, HISTOGRAM_MAX_MICROS, 3)
            .expect("histogram bounds are valid constants");
        Self { histogram }
    }

    /// Record a duration
    pub fn record(&mut self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        self.histogram.saturating_record(micros);
    }

    /// Record a value in seconds
    pub fn record_secs(&mut self, secs: f64) {
        self.histogram.saturating_record((secs * 1_000_000.0).round() as u64);
    }

    /// Get the number of recorded values
    pub fn len(&self) -> u64 {
        self.histogram.len()
    }

    /// Check if the histogram is empty
    pub fn is_empty(&self) -> bool {
        self.histogram.is_empty()
    }

    /// Value at quantile `q` (0.0 - 1.0), in seconds
    pub fn value_at_quantile(&self, q: f64) -> f64 {
        self.histogram.value_at_quantile(q) as f64 / 1_000_000.0
    }

    /// Calculate percentiles from the histogram
    pub fn percentiles(&self) -> LatencyPercentiles {
        if self.histogram.is_empty() {
            return LatencyPercentiles::default();
        }
        LatencyPercentiles::from_fn(|q| self.value_at_quantile(q))
    }

    /// Recorded `(seconds, count)` pairs in ascending order
    pub fn recorded(&self) -> impl Iterator<Item = (f64, u64)> + '_ {
        self.histogram.iter_recorded().map(|v| {
            (
                self.histogram.median_equivalent(v.value_iterated_to()) as f64 / 1_000_000.0,
                v.count_at_value(),
            )
        })
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// One bar of the latency histogram
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HistogramBucket {
    /// Upper bound of the bucket, in seconds
    pub mark: f64,
    /// Samples that fell into the bucket
    pub count: u64,
}

/// Distribute ascending `(value, count)` pairs over equal-width buckets
///
/// Produces `HISTOGRAM_BUCKETS + 1` marks from `fastest` to `slowest`; each
/// sample lands in the first bucket whose mark is not below it.
pub fn bucketize(
    sorted: impl IntoIterator<Item = (f64, u64)>,
    fastest: f64,
    slowest: f64,
) -> Vec<HistogramBucket> {
    let width = (slowest - fastest) / HISTOGRAM_BUCKETS as f64;
    let mut buckets: Vec<HistogramBucket> = (0..HISTOGRAM_BUCKETS)
        .map(|i| HistogramBucket {
            mark: fastest + width * i as f64,
            count: 0,
        })
        .chain(std::iter::once(HistogramBucket {
            mark: slowest,
            count: 0,
        }))
        .collect();

    let last = buckets.len() - 1;
    let mut bi = 0;
    for (value, count) in sorted {
        while bi < last && value > buckets[bi].mark {
            bi += 1;
        }
        buckets[bi].count += count;
    }
    buckets
}

/// Latency samples of a run
#[derive(Debug, Clone)]
pub enum LatencySamples {
    /// Every sample, for exact percentiles
    Exact(Vec<f64>),
    /// Bounded-memory histogram
    Streaming(LatencyHistogram),
    /// Nothing kept; raw runs stream their records instead
    Discard,
}

impl LatencySamples {
    /// Keep every sample
    pub fn exact() -> Self {
        Self::Exact(Vec::new())
    }

    /// Keep a histogram only
    pub fn streaming() -> Self {
        Self::Streaming(LatencyHistogram::new())
    }

    /// Keep nothing
    pub fn discard() -> Self {
        Self::Discard
    }

    /// Record a sample, spilling to a histogram once `exact_limit` is reached
    pub fn record(&mut self, secs: f64, exact_limit: usize) {
        match self {
            Self::Exact(values) if values.len() >= exact_limit => {
                tracing::debug!(
                    samples = values.len(),
                    "Exact sample limit reached, switching to histogram"
                );
                let mut histogram = LatencyHistogram::new();
                for v in values.iter() {
                    histogram.record_secs(*v);
                }
                histogram.record_secs(secs);
                *self = Self::Streaming(histogram);
            }
            Self::Exact(values) => values.push(secs),
            Self::Streaming(histogram) => histogram.record_secs(secs),
            Self::Discard => {}
        }
    }

    /// Number of samples
    pub fn len(&self) -> u64 {
        match self {
            Self::Exact(values) => values.len() as u64,
            Self::Streaming(histogram) => histogram.len(),
            Self::Discard => 0,
        }
    }

    /// Check if no sample was recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True while samples are kept individually
    pub fn is_exact(&self) -> bool {
        matches!(self, Self::Exact(_))
    }

    /// Percentiles and histogram over `[fastest, slowest]`
    ///
    /// Returns `None` when no sample was recorded. Percentiles are clamped to
    /// the observed range so that histogram quantization never reports a
    /// value outside it.
    pub fn distribution(
        self,
        fastest: f64,
        slowest: f64,
    ) -> Option<(LatencyPercentiles, Vec<HistogramBucket>)> {
        if self.is_empty() {
            return None;
        }
        match self {
            Self::Exact(mut values) => {
                values.sort_by(f64::total_cmp);
                let percentiles = LatencyPercentiles::from_sorted(&values);
                let buckets = bucketize(values.iter().map(|v| (*v, 1)), fastest, slowest);
                Some((percentiles, buckets))
            }
            Self::Streaming(histogram) => {
                let percentiles = histogram.percentiles().clamp(fastest, slowest);
                let buckets = bucketize(histogram.recorded(), fastest, slowest);
                Some((percentiles, buckets))
            }
            Self::Discard => None,
        }
    }
}

/// Running statistics for one sub-phase of an exchange
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseStat {
    /// Exchanges that reported this phase
    pub count: u64,
    /// Sum of reported durations (seconds)
    pub total: f64,
    /// Shortest reported duration (seconds)
    pub min: f64,
    /// Longest reported duration (seconds)
    pub max: f64,
}

impl PhaseStat {
    /// Fold in one observation, ignoring phases the transport did not report
    pub fn record(&mut self, phase: Option<Duration>) {
        let Some(phase) = phase else { return };
        let secs = phase.as_secs_f64();
        if self.count == 0 {
            self.min = secs;
            self.max = secs;
        } else {
            self.min = self.min.min(secs);
            self.max = self.max.max(secs);
        }
        self.count += 1;
        self.total += secs;
    }

    /// Mean duration in seconds, `None` if the phase was never reported
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total / self.count as f64)
    }
}

/// Phase statistics over every successful exchange
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseStats {
    /// DNS plus dial
    pub connect: PhaseStat,
    /// Request write
    pub write: PhaseStat,
    /// Wait for first byte
    pub first_byte: PhaseStat,
    /// Response read
    pub read: PhaseStat,
}

impl PhaseStats {
    /// Fold in the phases of one exchange
    pub fn record(&mut self, phases: &PhaseTimings) {
        self.connect.record(phases.connect);
        self.write.record(phases.write);
        self.first_byte.record(phases.first_byte);
        self.read.record(phases.read);
    }

    /// True if no phase was ever reported
    pub fn is_empty(&self) -> bool {
        self.connect.count == 0
            && self.write.count == 0
            && self.first_byte.count == 0
            && self.read.count == 0
    }
}

/// Aggregate statistics folded from request outcomes
///
/// Latency, size and phase statistics cover successful exchanges only; a
/// failed exchange counts toward `failed` and its error kind.
#[derive(Debug, Clone)]
pub struct AggregateStats {
    /// Exchanges that produced a response (any status code)
    pub completed: u64,
    /// Exchanges that failed
    pub failed: u64,
    /// Response body bytes over successful exchanges
    pub total_bytes: u64,
    /// Sum of successful latencies (seconds)
    pub latency_sum: f64,
    /// Shortest successful latency (seconds)
    pub fastest: Option<f64>,
    /// Longest successful latency (seconds)
    pub slowest: Option<f64>,
    /// Latency samples
    pub samples: LatencySamples,
    /// Status-code distribution
    pub status_codes: BTreeMap<u16, u64>,
    /// Error-kind distribution
    pub errors: BTreeMap<ErrorKind, u64>,
    /// Sub-phase statistics
    pub phases: PhaseStats,
    exact_limit: usize,
}

impl AggregateStats {
    /// Create empty stats keeping up to `exact_limit` exact samples
    pub fn new(samples: LatencySamples, exact_limit: usize) -> Self {
        Self {
            completed: 0,
            failed: 0,
            total_bytes: 0,
            latency_sum: 0.0,
            fastest: None,
            slowest: None,
            samples,
            status_codes: BTreeMap::new(),
            errors: BTreeMap::new(),
            phases: PhaseStats::default(),
            exact_limit,
        }
    }

    /// Fold in one outcome
    pub fn record(&mut self, outcome: &RequestOutcome) {
        if let Some(kind) = outcome.error {
            self.failed += 1;
            *self.errors.entry(kind).or_insert(0) += 1;
            return;
        }

        let secs = outcome.duration.as_secs_f64();
        self.completed += 1;
        self.total_bytes += outcome.size;
        self.latency_sum += secs;
        self.fastest = Some(self.fastest.map_or(secs, |f| f.min(secs)));
        self.slowest = Some(self.slowest.map_or(secs, |s| s.max(secs)));
        self.samples.record(secs, self.exact_limit);
        *self.status_codes.entry(outcome.status).or_insert(0) += 1;
        self.phases.record(&outcome.phases);
    }

    /// Total outcomes recorded
    pub fn total(&self) -> u64 {
        self.completed + self.failed
    }

    /// Mean successful latency in seconds
    pub fn average(&self) -> Option<f64> {
        (self.completed > 0).then(|| self.latency_sum / self.completed as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ExchangeResponse;

    fn ok(ms: u64, status: u16) -> RequestOutcome {
        RequestOutcome::success(
            0,
            Duration::ZERO,
            Duration::from_millis(ms),
            ExchangeResponse::new(status, 10),
        )
    }

    #[test]
    fn test_percentile_calculation() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let percentiles = LatencyPercentiles::from_sorted(&values);

        assert!((percentiles.p50 - 5.5).abs() < 1e-9);
        assert!((percentiles.p10 - 1.9).abs() < 1e-9);
        assert!((percentiles.p99 - 9.91).abs() < 1e-9);
    }

    #[test]
    fn test_percentile_single_value() {
        let percentiles = LatencyPercentiles::from_sorted(&[42.0]);
        assert!(percentiles.pairs().iter().all(|(_, v)| *v == 42.0));
    }

    #[test]
    fn test_percentile_empty() {
        assert_eq!(percentile(&[], 0.5), 0.0);
    }

    #[test]
    fn test_percentiles_are_monotone() {
        let mut values: Vec<f64> = (0..997).map(|i| ((i * 7919) % 1000) as f64 / 1000.0).collect();
        values.sort_by(f64::total_cmp);
        let pairs = LatencyPercentiles::from_sorted(&values).pairs();
        for w in pairs.windows(2) {
            assert!(w[0].1 <= w[1].1);
        }
    }

    #[test]
    fn test_histogram_percentiles() {
        let mut histogram = LatencyHistogram::new();
        for i in 1..=100 {
            histogram.record(Duration::from_millis(i));
        }

        let percentiles = histogram.percentiles();
        assert!((percentiles.p50 - 0.050).abs() < 0.001);
        assert!((percentiles.p99 - 0.099).abs() < 0.001);
        assert_eq!(histogram.len(), 100);
    }

    #[test]
    fn test_empty_histogram() {
        let histogram = LatencyHistogram::new();
        assert!(histogram.is_empty());
        assert_eq!(histogram.percentiles(), LatencyPercentiles::default());
    }

    #[test]
    fn test_histogram_clamps_huge_values() {
        let mut histogram = LatencyHistogram::new();
        histogram.record(Duration::from_secs(10_000));
        assert_eq!(histogram.len(), 1);
    }

    #[test]
    fn test_bucketize_counts_every_sample() {
        let values: Vec<(f64, u64)> = (1..=100).map(|i| (i as f64, 1)).collect();
        let buckets = bucketize(values, 1.0, 100.0);

        assert_eq!(buckets.len(), HISTOGRAM_BUCKETS + 1);
        assert_eq!(buckets.iter().map(|b| b.count).sum::<u64>(), 100);
        assert_eq!(buckets[0].mark, 1.0);
        assert_eq!(buckets[0].count, 1);
        assert_eq!(buckets[HISTOGRAM_BUCKETS].mark, 100.0);
        for w in buckets.windows(2) {
            assert!(w[0].mark <= w[1].mark);
        }
    }

    #[test]
    fn test_bucketize_identical_values() {
        let buckets = bucketize(vec![(0.5, 3)], 0.5, 0.5);
        assert_eq!(buckets[0].count, 3);
        assert_eq!(buckets.iter().map(|b| b.count).sum::<u64>(), 3);
    }

    #[test]
    fn test_samples_spill_to_histogram() {
        let mut samples = LatencySamples::exact();
        for i in 0..5 {
            samples.record(i as f64 / 1000.0, 3);
        }
        assert!(!samples.is_exact());
        assert_eq!(samples.len(), 5);
    }

    #[test]
    fn test_discarded_samples_yield_no_distribution() {
        let mut samples = LatencySamples::discard();
        for i in 0..100 {
            samples.record(i as f64 / 1000.0, 3);
        }
        assert!(samples.is_empty());
        assert!(samples.distribution(0.0, 0.099).is_none());
    }

    #[test]
    fn test_streaming_distribution_stays_in_range() {
        let mut samples = LatencySamples::streaming();
        for ms in [3u64, 5, 7, 11, 13] {
            samples.record(ms as f64 / 1000.0, usize::MAX);
        }
        let (percentiles, buckets) = samples.distribution(0.003, 0.013).unwrap();
        for (_, v) in percentiles.pairs() {
            assert!((0.003..=0.013).contains(&v));
        }
        assert_eq!(buckets.iter().map(|b| b.count).sum::<u64>(), 5);
    }

    #[test]
    fn test_empty_distribution() {
        assert!(LatencySamples::exact().distribution(0.0, 0.0).is_none());
    }

    #[test]
    fn test_phase_stat() {
        let mut stat = PhaseStat::default();
        assert!(stat.average().is_none());
        stat.record(None);
        stat.record(Some(Duration::from_millis(10)));
        stat.record(Some(Duration::from_millis(30)));

        assert_eq!(stat.count, 2);
        assert!((stat.average().unwrap() - 0.020).abs() < 1e-9);
        assert!((stat.min - 0.010).abs() < 1e-9);
        assert!((stat.max - 0.030).abs() < 1e-9);
    }

    #[test]
    fn test_aggregate_stats_record() {
        let mut stats = AggregateStats::new(LatencySamples::exact(), 100);
        stats.record(&ok(10, 200));
        stats.record(&ok(30, 404));
        stats.record(&RequestOutcome::failure(
            1,
            Duration::ZERO,
            Duration::from_millis(500),
            ErrorKind::Timeout,
        ));

        assert_eq!(stats.total(), 3);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total_bytes, 20);
        assert_eq!(stats.fastest, Some(0.010));
        assert_eq!(stats.slowest, Some(0.030));
        assert!((stats.average().unwrap() - 0.020).abs() < 1e-9);
        assert_eq!(stats.status_codes.get(&200), Some(&1));
        assert_eq!(stats.status_codes.get(&404), Some(&1));
        assert_eq!(stats.errors.get(&ErrorKind::Timeout), Some(&1));
        assert_eq!(stats.samples.len(), 2);
    }
}
