//! CSV export of raw records

use std::io::Write;

use barrage_core::RawRecord;
use csv::WriterBuilder;

use crate::ReportError;

/// Header row, in column order
pub const CSV_COLUMNS: [&str; 10] = [
    "offset_secs",
    "response_time_secs",
    "connect_secs",
    "write_secs",
    "first_byte_secs",
    "read_secs",
    "status",
    "bytes",
    "error",
    "worker",
];

/// Streams raw records out as CSV rows
///
/// The header goes out on construction, so a run that produced nothing still
/// yields a valid file. Rows are written one at a time as records arrive.
pub struct CsvExporter<W: Write> {
    wtr: csv::Writer<W>,
    rows: u64,
}

impl<W: Write> CsvExporter<W> {
    /// Start a CSV stream on `out`
    pub fn new(out: W) -> Result<Self, ReportError> {
        let mut wtr = WriterBuilder::new().has_headers(false).from_writer(out);
        wtr.write_record(CSV_COLUMNS)?;
        Ok(Self { wtr, rows: 0 })
    }

    /// Append one row
    pub fn write(&mut self, record: &RawRecord) -> Result<(), ReportError> {
        self.wtr.serialize(record)?;
        self.rows += 1;
        Ok(())
    }

    /// Append every record `records` yields, pulling one at a time
    pub fn write_all<I>(&mut self, records: I) -> Result<(), ReportError>
    where
        I: IntoIterator<Item = RawRecord>,
    {
        for record in records {
            self.write(&record)?;
        }
        Ok(())
    }

    /// Rows written so far
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush buffered rows and return the row count
    pub fn finish(mut self) -> Result<u64, ReportError> {
        self.wtr.flush()?;
        Ok(self.rows)
    }
}
