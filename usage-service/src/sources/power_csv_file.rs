use std::{fs::File, io::Read, path::PathBuf};

use csv::StringRecord;
use time::OffsetDateTime;
use usage_stats::PowerSeries;

use crate::pipeline::{Envelope, PipelineError, Source};

/// CSV source for a single load's power readings.
///
/// Expected header columns (by name, configurable):
/// - ts (RFC3339 timestamp with offset)
/// - watts
///
/// Rows must already be in time order.
pub struct PowerCsvFileSource {
    path: PathBuf,
    ts_column: String,
    watts_column: String,
}

impl PowerCsvFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            ts_column: "ts".to_string(),
            watts_column: "watts".to_string(),
        }
    }

    pub fn with_columns(mut self, ts_column: &str, watts_column: &str) -> Self {
        self.ts_column = ts_column.to_string();
        self.watts_column = watts_column.to_string();
        self
    }
}

fn column_index(headers: &StringRecord, name: &str) -> Result<usize, PipelineError> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| PipelineError::Source(format!("missing column '{name}' in CSV header")))
}

fn record_to_reading(
    record: &StringRecord,
    ts_idx: usize,
    watts_idx: usize,
) -> Result<(OffsetDateTime, f64), PipelineError> {
    let line = record.position().map(|p| p.line()).unwrap_or_default();

    let ts_str = record
        .get(ts_idx)
        .ok_or_else(|| PipelineError::Source(format!("line {line}: missing timestamp")))?;
    let ts = OffsetDateTime::parse(ts_str.trim(), &time::format_description::well_known::Rfc3339)
        .map_err(|e| PipelineError::Source(format!("line {line}: invalid ts '{ts_str}': {e}")))?;

    let watts_str = record
        .get(watts_idx)
        .ok_or_else(|| PipelineError::Source(format!("line {line}: missing watts")))?;
    let watts: f64 = watts_str
        .trim()
        .parse()
        .map_err(|e| PipelineError::Source(format!("line {line}: invalid watts '{watts_str}': {e}")))?;

    Ok((ts, watts))
}

/// Parse readings from any CSV reader into a [`PowerSeries`].
pub fn read_power_series<R: Read>(
    reader: R,
    ts_column: &str,
    watts_column: &str,
) -> Result<PowerSeries, PipelineError> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|e| PipelineError::Source(format!("failed to read CSV headers: {e}")))?
        .clone();
    let ts_idx = column_index(&headers, ts_column)?;
    let watts_idx = column_index(&headers, watts_column)?;

    let mut readings = Vec::new();
    for result in rdr.records() {
        let record =
            result.map_err(|e| PipelineError::Source(format!("failed to read CSV record: {e}")))?;

        match record_to_reading(&record, ts_idx, watts_idx) {
            Ok(reading) => readings.push(reading),
            Err(e) => {
                metrics::counter!("power_csv_parse_errors_total").increment(1);
                return Err(e);
            }
        }
    }

    Ok(PowerSeries::from_readings(readings)?)
}

impl Source<PowerSeries> for PowerCsvFileSource {
    fn load(&self) -> Result<Envelope<PowerSeries>, PipelineError> {
        let file = File::open(&self.path).map_err(|e| {
            PipelineError::Source(format!("failed to open CSV file {}: {e}", self.path.display()))
        })?;
        let series = read_power_series(file, &self.ts_column, &self.watts_column)?;
        Ok(Envelope::new(series))
    }
}
