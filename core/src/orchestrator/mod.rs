//! Orchestrator for run lifecycle management
//!
//! The Orchestrator coordinates one load-test run:
//! - Spawning and joining the worker pool
//! - Feeding outcomes to a single collector task
//! - Arming the deadline in duration mode and relaying stop requests
//! - Producing the final report
//!
//! # Example
//!
//! ```ignore
//! use barrage_core::{OrchestratorBuilder, RunMode};
//!
//! let orchestrator = OrchestratorBuilder::new()
//!     .concurrency(10)
//!     .run_mode(RunMode::Count(1000))
//!     .transport(transport)
//!     .template(template)
//!     .build()?;
//!
//! let report = orchestrator.run_with_signal_handling().await?;
//! ```

mod builder;
mod collector;
mod executor;
mod pool;

pub use builder::OrchestratorBuilder;
pub use collector::{ResultCollector, RunSnapshot};
pub use executor::Orchestrator;
pub use pool::WorkerPool;
