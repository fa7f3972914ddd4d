//! Workload configuration types

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Number of raw latency samples retained for exact percentiles before the
/// collector switches to a streaming histogram.
pub const DEFAULT_EXACT_SAMPLE_LIMIT: usize = 1_000_000;

/// Highest accepted rate limit. One token per nanosecond is the finest
/// spacing the pacer can express.
pub const MAX_RATE_LIMIT: f64 = 1e9;

/// Workload configuration
///
/// Defines how a run should be driven: concurrency level, termination mode,
/// rate limiting, per-request timeout and transport toggles. Immutable once a
/// run starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Number of concurrent workers
    pub concurrency: usize,

    /// Termination mode: fixed request count or fixed duration
    pub run_mode: RunMode,

    /// Global rate limit in requests per second; `None` means unlimited
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<f64>,

    /// Per-request timeout; `None` means no timeout
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// Transport toggles
    #[serde(default)]
    pub transport: TransportOptions,

    /// Report flavour
    #[serde(default)]
    pub output: OutputMode,

    /// Raw duration samples kept for exact percentiles
    #[serde(default = "default_exact_sample_limit")]
    pub exact_sample_limit: usize,
}

fn default_exact_sample_limit() -> usize {
    DEFAULT_EXACT_SAMPLE_LIMIT
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            concurrency: 50,
            run_mode: RunMode::default(),
            rate_limit: None,
            timeout: Some(Duration::from_secs(20)),
            transport: TransportOptions::default(),
            output: OutputMode::default(),
            exact_sample_limit: DEFAULT_EXACT_SAMPLE_LIMIT,
        }
    }
}

impl WorkloadConfig {
    /// Create a new config with the given concurrency
    pub fn new(concurrency: usize) -> Self {
        Self {
            concurrency,
            ..Default::default()
        }
    }

    /// Set the termination mode
    pub fn with_run_mode(mut self, mode: RunMode) -> Self {
        self.run_mode = mode;
        self
    }

    /// Set the global rate limit; `0.0` disables rate limiting
    pub fn with_rate_limit(mut self, rps: f64) -> Self {
        self.rate_limit = if rps == 0.0 { None } else { Some(rps) };
        self
    }

    /// Set the per-request timeout; `Duration::ZERO` disables it
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = if timeout.is_zero() { None } else { Some(timeout) };
        self
    }

    /// Set the transport options
    pub fn with_transport(mut self, transport: TransportOptions) -> Self {
        self.transport = transport;
        self
    }

    /// Set the output mode
    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    /// Set the exact sample limit
    pub fn with_exact_sample_limit(mut self, limit: usize) -> Self {
        self.exact_sample_limit = limit;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency(
                "concurrency must be at least 1".into(),
            ));
        }

        if let Some(rps) = self.rate_limit {
            if !rps.is_finite() || rps <= 0.0 {
                return Err(ConfigError::InvalidRateLimit(format!(
                    "rate limit must be a positive number, got {}",
                    rps
                )));
            }
            if rps > MAX_RATE_LIMIT {
                return Err(ConfigError::InvalidRateLimit(format!(
                    "rate limit {} exceeds the maximum of {} requests per second",
                    rps, MAX_RATE_LIMIT
                )));
            }
        }

        match self.run_mode {
            RunMode::Count(n) => {
                if n == 0 {
                    return Err(ConfigError::InvalidRunMode(
                        "request count must be at least 1".into(),
                    ));
                }
                if n < self.concurrency {
                    return Err(ConfigError::InvalidRunMode(format!(
                        "request count ({}) cannot be less than concurrency ({})",
                        n, self.concurrency
                    )));
                }
            }
            RunMode::Duration(d) => {
                if d.is_zero() {
                    return Err(ConfigError::InvalidRunMode(
                        "duration must be greater than zero".into(),
                    ));
                }
            }
        }

        if let Some(ref proxy) = self.transport.proxy {
            validate_proxy(proxy)?;
        }

        Ok(())
    }
}

fn validate_proxy(proxy: &str) -> Result<(), ConfigError> {
    let url = reqwest::Url::parse(proxy)
        .map_err(|e| ConfigError::InvalidProxy(format!("{}: {}", proxy, e)))?;

    match url.scheme() {
        "http" | "https" | "socks5" | "socks5h" => {}
        other => {
            return Err(ConfigError::InvalidProxy(format!(
                "unsupported proxy scheme '{}'",
                other
            )))
        }
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidProxy(format!("{}: missing host", proxy)));
    }

    Ok(())
}

/// Run termination mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Issue exactly N requests across all workers
    Count(usize),

    /// Issue requests until the duration elapses
    Duration(#[serde(with = "humantime_serde")] Duration),
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::Count(200)
    }
}

impl RunMode {
    /// Total request ceiling; `None` in duration mode
    pub fn request_target(&self) -> Option<usize> {
        match self {
            RunMode::Count(n) => Some(*n),
            RunMode::Duration(_) => None,
        }
    }

    /// Deadline for duration-bounded runs
    pub fn deadline(&self) -> Option<Duration> {
        match self {
            RunMode::Count(_) => None,
            RunMode::Duration(d) => Some(*d),
        }
    }
}

/// Transport toggles handed to the HTTP transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportOptions {
    /// Do not negotiate compressed responses
    #[serde(default)]
    pub disable_compression: bool,

    /// Open a new connection per request
    #[serde(default)]
    pub disable_keep_alives: bool,

    /// Do not follow redirects
    #[serde(default)]
    pub disable_redirects: bool,

    /// Outbound proxy URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    /// Prefer HTTP/2
    #[serde(default)]
    pub h2: bool,

    /// Skip TLS certificate verification
    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
}

fn default_accept_invalid_certs() -> bool {
    true
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            disable_compression: false,
            disable_keep_alives: false,
            disable_redirects: false,
            proxy: None,
            h2: false,
            accept_invalid_certs: default_accept_invalid_certs(),
        }
    }
}

/// Report flavour produced at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Aggregate statistics
    #[default]
    Summary,
    /// One record per outcome, no percentiles
    Raw,
}

impl std::str::FromStr for OutputMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "" | "summary" => Ok(OutputMode::Summary),
            "csv" | "raw" => Ok(OutputMode::Raw),
            other => Err(ConfigError::InvalidOutput(format!(
                "unknown output type '{}'; only 'csv' is supported",
                other
            ))),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid concurrency value
    #[error("Invalid concurrency: {0}")]
    InvalidConcurrency(String),

    /// Invalid rate limit
    #[error("Invalid rate limit: {0}")]
    InvalidRateLimit(String),

    /// Invalid request count / duration combination
    #[error("Invalid run mode: {0}")]
    InvalidRunMode(String),

    /// Malformed proxy target
    #[error("Invalid proxy: {0}")]
    InvalidProxy(String),

    /// Unknown output mode
    #[error("Invalid output: {0}")]
    InvalidOutput(String),
}
