//! Rendering of finished runs
//!
//! This crate turns the output of a run into:
//!
//! - a human-readable text summary of a [`barrage_core::Summary`]
//! - CSV, one row per [`barrage_core::RawRecord`], written as records stream in

#![warn(missing_docs)]
#![warn(clippy::all)]

mod csv_export;
mod summary;

pub use csv_export::{CsvExporter, CSV_COLUMNS};
pub use summary::SummaryRenderer;

/// Rendering failure
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    /// Writing to the output failed
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    /// CSV encoding failed
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
}
