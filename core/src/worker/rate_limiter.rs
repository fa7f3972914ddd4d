//! Global rate limiting for request admission

use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use crate::stop::StopController;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Longest spacing between tokens; slower rates are clamped to it
pub const MAX_EMISSION_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Result of waiting for a rate-limit token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquire {
    /// A token was granted; the worker may issue one request
    Granted,
    /// The run is stopping; the worker must not issue a request
    Cancelled,
}

struct Pacer {
    limiter: DirectLimiter,
    rps: f64,
    interval: Duration,
}

/// `1 / rps` as a duration, clamped to [`MAX_EMISSION_INTERVAL`]
fn emission_interval(rps: f64) -> Duration {
    Duration::try_from_secs_f64(1.0 / rps)
        .map_or(MAX_EMISSION_INTERVAL, |interval| interval.min(MAX_EMISSION_INTERVAL))
}

/// Releases one token every `1 / rps` seconds to the whole worker pool
///
/// One instance is shared by every worker of a run, so the rate bounds the
/// pool as a whole. Burst is one token: the first acquire is immediate and
/// later ones are spaced by the emission interval.
pub struct RequestRateLimiter {
    pacer: Option<Pacer>,
}

impl RequestRateLimiter {
    /// Build a limiter for `rate_limit` requests per second
    ///
    /// `None`, zero, negative and non-finite rates pace nothing. Rates too
    /// slow to represent are paced at one token per [`MAX_EMISSION_INTERVAL`].
    ///
    /// ```
    /// use barrage_core::worker::RequestRateLimiter;
    ///
    /// let paced = RequestRateLimiter::new(Some(4.0));
    /// assert_eq!(paced.interval(), Some(std::time::Duration::from_millis(250)));
    /// assert!(!RequestRateLimiter::new(Some(0.0)).is_paced());
    /// ```
    pub fn new(rate_limit: Option<f64>) -> Self {
        let pacer = rate_limit
            .filter(|rps| rps.is_finite() && *rps > 0.0)
            .and_then(|rps| {
                // 0.5 rps is one token every 2s.
                let interval = emission_interval(rps);
                match Quota::with_period(interval) {
                    Some(quota) => Some(Pacer {
                        limiter: RateLimiter::direct(quota),
                        rps,
                        interval,
                    }),
                    None => {
                        tracing::warn!(
                            rps,
                            "Rate limit is finer than one nanosecond per request, running unpaced"
                        );
                        None
                    }
                }
            });

        Self { pacer }
    }

    /// A limiter that grants every request immediately
    pub fn unlimited() -> Self {
        Self { pacer: None }
    }

    /// Wait for a token, giving up as soon as `stop` fires
    ///
    /// A stopped run never leaves a worker parked here.
    pub async fn acquire(&self, stop: &StopController) -> Acquire {
        let Some(pacer) = &self.pacer else {
            return Acquire::Granted;
        };
        if stop.is_stopping() {
            return Acquire::Cancelled;
        }

        tokio::select! {
            biased;

            _ = stop.stopping() => Acquire::Cancelled,
            _ = pacer.limiter.until_ready() => Acquire::Granted,
        }
    }

    /// Take a token only if one is available right now
    pub fn ready_now(&self) -> bool {
        self.pacer
            .as_ref()
            .map_or(true, |pacer| pacer.limiter.check().is_ok())
    }

    /// Whether requests are being paced at all
    pub fn is_paced(&self) -> bool {
        self.pacer.is_some()
    }

    /// Effective requests per second, if paced
    pub fn rps(&self) -> Option<f64> {
        self.pacer.as_ref().map(|pacer| pacer.rps)
    }

    /// Spacing between tokens
    pub fn interval(&self) -> Option<Duration> {
        self.pacer.as_ref().map(|pacer| pacer.interval)
    }
}

impl std::fmt::Debug for RequestRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRateLimiter")
            .field("rps", &self.rps())
            .field("interval", &self.interval())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_unpaced_rates() {
        for rate in [None, Some(0.0), Some(-3.0), Some(f64::NAN), Some(f64::INFINITY)] {
            let limiter = RequestRateLimiter::new(rate);
            assert!(!limiter.is_paced(), "{:?} should not pace", rate);
            assert_eq!(limiter.rps(), None);
            assert!(limiter.ready_now());
            assert!(limiter.ready_now());
        }
    }

    #[test]
    fn test_interval_follows_rate() {
        assert_eq!(
            RequestRateLimiter::new(Some(100.0)).interval(),
            Some(Duration::from_millis(10))
        );
        assert_eq!(
            RequestRateLimiter::new(Some(0.5)).interval(),
            Some(Duration::from_secs(2))
        );
    }

    #[test]
    fn test_vanishing_rate_is_clamped() {
        for rps in [1e-30, f64::MIN_POSITIVE, 1e-9] {
            let limiter = RequestRateLimiter::new(Some(rps));
            assert!(limiter.is_paced());
            assert_eq!(limiter.interval(), Some(MAX_EMISSION_INTERVAL));
            assert!(limiter.ready_now());
            assert!(!limiter.ready_now());
        }
    }

    #[test]
    fn test_sub_nanosecond_rate_runs_unpaced() {
        let limiter = RequestRateLimiter::new(Some(1e12));
        assert!(!limiter.is_paced());
        assert_eq!(limiter.interval(), None);
        assert!(limiter.ready_now());
    }

    #[test]
    fn test_single_token_burst() {
        let limiter = RequestRateLimiter::new(Some(1.0));
        assert!(limiter.ready_now());
        assert!(!limiter.ready_now(), "second token is a full second away");
    }

    #[tokio::test]
    async fn test_unlimited_grants_immediately() {
        let stop = StopController::new();
        let limiter = RequestRateLimiter::unlimited();

        for _ in 0..1000 {
            assert_eq!(limiter.acquire(&stop).await, Acquire::Granted);
        }
    }

    #[tokio::test]
    async fn test_tokens_are_spaced() {
        let limiter = RequestRateLimiter::new(Some(50.0));
        let stop = StopController::new();

        let began = Instant::now();
        for _ in 0..6 {
            assert_eq!(limiter.acquire(&stop).await, Acquire::Granted);
        }
        // 1 free token, then 5 x 20ms.
        assert!(began.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn test_stopped_run_gets_no_token() {
        let limiter = RequestRateLimiter::new(Some(1.0));
        let stop = StopController::new();
        stop.trigger();

        assert_eq!(limiter.acquire(&stop).await, Acquire::Cancelled);
        assert!(limiter.ready_now(), "cancelled acquire must not spend the token");
    }

    #[tokio::test]
    async fn test_parked_worker_released_by_stop() {
        // A minute between tokens.
        let limiter = Arc::new(RequestRateLimiter::new(Some(1.0 / 60.0)));
        let stop = StopController::new();
        assert_eq!(limiter.acquire(&stop).await, Acquire::Granted);

        let parked = tokio::spawn({
            let limiter = Arc::clone(&limiter);
            let stop = stop.clone();
            async move { limiter.acquire(&stop).await }
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        let stopped_at = Instant::now();
        stop.trigger();

        let outcome = tokio::time::timeout(Duration::from_secs(1), parked)
            .await
            .expect("acquire ignored the stop signal")
            .unwrap();
        assert_eq!(outcome, Acquire::Cancelled);
        assert!(stopped_at.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_debug_shows_rate() {
        let shown = format!("{:?}", RequestRateLimiter::new(Some(20.0)));
        assert!(shown.contains("rps: Some(20.0)"));
        assert!(shown.contains("50ms"));
    }
}
