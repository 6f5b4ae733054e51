use std::io::Write;

use usage_stats::UsageTable;

use crate::pipeline::{Envelope, PipelineError, Sink};

/// Writes a usage table as `period,hours_on,<energy unit>`; missing cells are empty.
pub struct CsvUsageSink<W: Write> {
    writer: W,
}

impl<W: Write> CsvUsageSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

impl<W: Write> Sink<UsageTable> for CsvUsageSink<W> {
    fn run(&mut self, input: &Envelope<UsageTable>) -> Result<(), PipelineError> {
        let table = &input.payload;
        let mut wtr = csv::Writer::from_writer(&mut self.writer);

        wtr.write_record(["period", "hours_on", table.energy_column()])
            .map_err(|e| PipelineError::Sink(format!("failed to write CSV header: {e}")))?;

        for row in table.rows() {
            wtr.write_record([row.label(), cell(row.hours_on), cell(row.energy)])
                .map_err(|e| PipelineError::Sink(format!("failed to write CSV row: {e}")))?;
        }

        wtr.flush()
            .map_err(|e| PipelineError::Sink(format!("failed to flush CSV output: {e}")))?;
        tracing::debug!(rows = table.len(), "usage table written as CSV");
        Ok(())
    }
}
