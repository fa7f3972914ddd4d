//! Human-readable run summary

use std::io::Write;

use barrage_core::{PhaseStat, Summary};

use crate::ReportError;

const BAR_CHAR: char = '■';
const BAR_WIDTH: u64 = 40;

/// Renders a [`Summary`] as plain text
pub struct SummaryRenderer<'a> {
    summary: &'a Summary,
}

impl<'a> SummaryRenderer<'a> {
    /// Create a renderer for `summary`
    pub fn new(summary: &'a Summary) -> Self {
        Self { summary }
    }

    /// Write the full summary
    pub fn write<W: Write>(&self, out: &mut W) -> Result<(), ReportError> {
        let s = self.summary;

        writeln!(out)?;
        writeln!(out, "Summary:")?;
        writeln!(out, "  Total:\t{:.4} secs", s.elapsed_secs)?;
        if let (Some(slowest), Some(fastest), Some(average)) = (s.slowest, s.fastest, s.average) {
            writeln!(out, "  Slowest:\t{:.4} secs", slowest)?;
            writeln!(out, "  Fastest:\t{:.4} secs", fastest)?;
            writeln!(out, "  Average:\t{:.4} secs", average)?;
        }
        writeln!(out, "  Requests/sec:\t{:.4}", s.requests_per_second)?;
        writeln!(out)?;
        if s.total_bytes > 0 {
            writeln!(out, "  Total data:\t{} bytes", s.total_bytes)?;
            writeln!(out, "  Size/request:\t{} bytes", s.bytes_per_request.round() as u64)?;
        }

        self.write_histogram(out)?;
        self.write_latencies(out)?;
        self.write_phases(out)?;
        self.write_status_codes(out)?;
        self.write_errors(out)?;

        Ok(())
    }

    fn write_histogram<W: Write>(&self, out: &mut W) -> Result<(), ReportError> {
        let buckets = &self.summary.histogram;
        if buckets.is_empty() {
            return Ok(());
        }
        let max = buckets.iter().map(|b| b.count).max().unwrap_or(0).max(1);

        writeln!(out)?;
        writeln!(out, "Response time histogram:")?;
        for bucket in buckets {
            let width = (bucket.count * BAR_WIDTH / max) as usize;
            let bar: String = std::iter::repeat(BAR_CHAR).take(width).collect();
            writeln!(out, "  {:.3} [{}]\t|{}", bucket.mark, bucket.count, bar)?;
        }
        Ok(())
    }

    fn write_latencies<W: Write>(&self, out: &mut W) -> Result<(), ReportError> {
        let Some(percentiles) = &self.summary.percentiles else {
            return Ok(());
        };

        writeln!(out)?;
        writeln!(out, "Latency distribution:")?;
        for (percent, secs) in percentiles.pairs() {
            writeln!(out, "  {}% in {:.4} secs", percent, secs)?;
        }
        Ok(())
    }

    fn write_phases<W: Write>(&self, out: &mut W) -> Result<(), ReportError> {
        let phases = &self.summary.phases;
        if phases.is_empty() {
            return Ok(());
        }

        writeln!(out)?;
        writeln!(out, "Details (average, fastest, slowest):")?;
        for (label, stat) in [
            ("DNS+dialup", &phases.connect),
            ("req write", &phases.write),
            ("resp wait", &phases.first_byte),
            ("resp read", &phases.read),
        ] {
            write_phase(out, label, stat)?;
        }
        Ok(())
    }

    fn write_status_codes<W: Write>(&self, out: &mut W) -> Result<(), ReportError> {
        if self.summary.status_codes.is_empty() {
            return Ok(());
        }

        writeln!(out)?;
        writeln!(out, "Status code distribution:")?;
        for (code, count) in &self.summary.status_codes {
            writeln!(out, "  [{}]\t{} responses", code, count)?;
        }
        Ok(())
    }

    fn write_errors<W: Write>(&self, out: &mut W) -> Result<(), ReportError> {
        if self.summary.errors.is_empty() {
            return Ok(());
        }

        writeln!(out)?;
        writeln!(out, "Error distribution:")?;
        for (kind, count) in &self.summary.errors {
            writeln!(out, "  [{}]\t{}", count, kind)?;
        }
        Ok(())
    }
}

fn write_phase<W: Write>(out: &mut W, label: &str, stat: &PhaseStat) -> Result<(), ReportError> {
    if let Some(average) = stat.average() {
        writeln!(
            out,
            "  {}:\t{:.4} secs, {:.4} secs, {:.4} secs",
            label, average, stat.min, stat.max
        )?;
    }
    Ok(())
}
