//! Worker module for issuing load-test requests
//!
//! A Worker is the execution unit of a run, responsible for one loop:
//! **admit -> send -> report -> repeat**.
//!
//! Each Worker is a tokio task that:
//!
//! 1. Checks the stop signal
//! 2. Claims a slot from the shared request budget (count-bounded runs)
//! 3. Waits for a token from the shared rate limiter
//! 4. Performs one exchange via the [`Transport`](crate::traits::Transport)
//! 5. Sends the outcome to the collector via channel
//! 6. Repeats until the budget is spent or the run is stopped
//!
//! A worker never has more than one exchange in flight, so the number of
//! workers is the concurrency of the run.
//!
//! # Example
//!
//! ```ignore
//! use barrage_core::worker::{RequestBudget, WorkerBuilder};
//!
//! let worker = WorkerBuilder::new(0)
//!     .transport(transport)
//!     .template(template)
//!     .outcome_tx(tx)
//!     .stop(stop.clone())
//!     .budget(Arc::new(RequestBudget::new(100)))
//!     .build()?;
//!
//! let stats = worker.run().await;
//! println!("Completed: {}", stats.completed);
//! ```

mod budget;
mod builder;
mod executor;
mod rate_limiter;
mod stats;

pub use budget::RequestBudget;
pub use builder::WorkerBuilder;
pub use executor::Worker;
pub use rate_limiter::{Acquire, RequestRateLimiter, MAX_EMISSION_INTERVAL};
pub use stats::WorkerStats;
