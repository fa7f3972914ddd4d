//! barrage-core: HTTP load-generation engine
//!
//! This crate drives a fixed pool of concurrent workers against one request
//! template and turns what they observe into a report:
//!
//! - Workload configuration and validation
//! - Workers, the shared rate limiter and the request budget
//! - The orchestrator, its worker pool and the outcome collector
//! - Metrics aggregation and report generation
//! - The [`Transport`] trait the network layer plugs into
//!
//! # Example
//!
//! ```ignore
//! use barrage_core::{OrchestratorBuilder, RequestTemplate, RunMode};
//!
//! let orchestrator = OrchestratorBuilder::new()
//!     .concurrency(50)
//!     .run_mode(RunMode::Count(200))
//!     .transport(transport)
//!     .template(RequestTemplate::get(url))
//!     .build()?;
//!
//! let report = orchestrator.run_with_signal_handling().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod report;
pub mod request;
pub mod response;
pub mod stop;
pub mod traits;
pub mod worker;

#[cfg(test)]
mod testing;

pub use channel::ChannelConfig;
pub use config::{ConfigError, OutputMode, RunMode, TransportOptions, WorkloadConfig};
pub use error::{BenchError, BenchErrorKind, BenchResult, ErrorKind};
pub use metrics::{AggregateStats, HistogramBucket, LatencyPercentiles, PhaseStat, PhaseStats};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, ResultCollector, RunSnapshot, WorkerPool};
pub use report::{RawRecord, RawRun, Report, ReportGenerator, Summary};
pub use request::RequestTemplate;
pub use response::{ExchangeResponse, PhaseTimings, RequestOutcome};
pub use stop::{StopController, StopState};
pub use traits::{Transport, TransportError};
pub use worker::{RequestBudget, RequestRateLimiter, Worker, WorkerBuilder, WorkerStats};
