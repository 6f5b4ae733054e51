use anyhow::{bail, Result};
use std::{env, io, sync::Arc};
use usage_service::{
    config::{AppConfig, OutputFormat},
    observability,
    pipeline::{Envelope, Pipeline, PipelineError, Sink},
    sinks::{CsvUsageSink, JsonUsageSink},
    sources::PowerCsvFileSource,
    transform::{PowerSeriesValidation, UsageAggregation},
};
use usage_stats::UsageTable;

enum ReportSink {
    Csv(CsvUsageSink<io::Stdout>),
    Json(JsonUsageSink<io::Stdout>),
}

impl Sink<UsageTable> for ReportSink {
    fn run(&mut self, input: &Envelope<UsageTable>) -> Result<(), PipelineError> {
        match self {
            Self::Csv(s) => s.run(input),
            Self::Json(s) => s.run(input),
        }
    }
}

fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: usage_report <power_csv_path>");
    }
    let file_path = &args[1];

    // Load configuration (USAGE_CONFIG, or ./usage-config.toml, or defaults).
    let cfg = AppConfig::load()?;
    let options = cfg.usage_options()?;

    let source = PowerCsvFileSource::new(file_path)
        .with_columns(&cfg.source.ts_column, &cfg.source.watts_column);

    let sink = match cfg.output.format {
        OutputFormat::Csv => ReportSink::Csv(CsvUsageSink::new(io::stdout())),
        OutputFormat::Json => ReportSink::Json(JsonUsageSink::new(io::stdout())),
    };

    let pipeline = Pipeline {
        source,
        transforms: vec![Arc::new(PowerSeriesValidation)],
        aggregate: UsageAggregation::new(options),
        sink,
    };

    let table = pipeline.run()?;
    tracing::info!(
        populated = table.populated().count(),
        missing = table.missing_count(),
        total_energy = table.total_energy(),
        energy_unit = %table.energy_unit(),
        "usage report complete"
    );

    Ok(())
}
