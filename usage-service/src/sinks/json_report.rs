use std::io::Write;

use serde::Serialize;
use serde_json::{Map, Value};
use usage_stats::{EnergyUnit, RowStatus, UsageRow, UsageTable};

use crate::pipeline::{Envelope, PipelineError, Sink};

#[derive(Serialize)]
struct UsageReport {
    energy_unit: EnergyUnit,
    rows: Vec<Map<String, Value>>,
}

fn report_row(row: &UsageRow, energy_column: &str) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("period".to_string(), Value::from(row.label()));
    out.insert("hours_on".to_string(), Value::from(row.hours_on));
    out.insert(energy_column.to_string(), Value::from(row.energy));
    let status = match row.status {
        RowStatus::Populated { .. } => "populated",
        RowStatus::NoData => "no_data",
        RowStatus::InsufficientSamples { .. } => "insufficient_samples",
    };
    out.insert("status".to_string(), Value::from(status));
    if let Some(text) = row.status.diagnostic(&row.label()) {
        out.insert("diagnostic".to_string(), Value::from(text));
    }
    out
}

/// Writes a usage table as a JSON document with one object per period.
pub struct JsonUsageSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonUsageSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Sink<UsageTable> for JsonUsageSink<W> {
    fn run(&mut self, input: &Envelope<UsageTable>) -> Result<(), PipelineError> {
        let table = &input.payload;
        let report = UsageReport {
            energy_unit: table.energy_unit(),
            rows: table
                .rows()
                .iter()
                .map(|row| report_row(row, table.energy_column()))
                .collect(),
        };

        serde_json::to_writer_pretty(&mut self.writer, &report)
            .map_err(|e| PipelineError::Sink(format!("failed to write JSON report: {e}")))?;
        writeln!(self.writer)
            .and_then(|_| self.writer.flush())
            .map_err(|e| PipelineError::Sink(format!("failed to flush JSON report: {e}")))?;
        Ok(())
    }
}
