//! Queue sizing between workers, the collector and the raw record consumer
//!
//! A worker has at most one outcome in flight, so the outcome queue only has
//! to absorb collector stalls. It scales with the pool instead of being a
//! fixed constant. The record queue feeds whatever writes raw output and is
//! sized the same way.

/// Outcome slots reserved per worker
pub const OUTCOMES_PER_WORKER: usize = 64;

/// Smallest queue handed out by [`ChannelConfig::for_concurrency`]
pub const MIN_BUFFER: usize = 1024;

/// Capacities of the run's internal queues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Workers -> collector
    pub outcome_buffer: usize,
    /// Collector -> raw record consumer
    pub record_buffer: usize,
}

impl ChannelConfig {
    /// Queues sized for a pool of `concurrency` workers
    ///
    /// ```
    /// use barrage_core::ChannelConfig;
    ///
    /// assert_eq!(ChannelConfig::for_concurrency(1).outcome_buffer, 1024);
    /// assert_eq!(ChannelConfig::for_concurrency(100).outcome_buffer, 6400);
    /// ```
    pub fn for_concurrency(concurrency: usize) -> Self {
        let buffer = concurrency
            .saturating_mul(OUTCOMES_PER_WORKER)
            .max(MIN_BUFFER);
        Self {
            outcome_buffer: buffer,
            record_buffer: buffer,
        }
    }

    /// Override the outcome queue capacity
    pub fn with_outcome_buffer(mut self, size: usize) -> Self {
        self.outcome_buffer = size;
        self
    }

    /// Override the record queue capacity
    pub fn with_record_buffer(mut self, size: usize) -> Self {
        self.record_buffer = size;
        self
    }

    /// Both queues need room for at least one item
    pub(crate) fn is_usable(&self) -> bool {
        self.outcome_buffer > 0 && self.record_buffer > 0
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::for_concurrency(1)
    }
}
