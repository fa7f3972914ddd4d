//! barrage-transport: reqwest-backed HTTP transport
//!
//! Provides [`HttpTransport`], the implementation of
//! [`barrage_core::Transport`] used by the command-line front-end. The client
//! is built once per run from the workload's transport toggles and shared by
//! every worker.

#![warn(missing_docs)]

mod client;
mod error;

pub use client::{HttpConfig, HttpTransport};
pub use error::classify;
