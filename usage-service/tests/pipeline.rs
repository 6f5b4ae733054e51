use std::{io::Write, sync::Arc};

use time::{format_description::well_known::Rfc3339, macros::datetime, Duration};
use usage_service::{
    config::AppConfig,
    pipeline::{Pipeline, PipelineError},
    sinks::CsvUsageSink,
    sources::PowerCsvFileSource,
    transform::{PowerSeriesValidation, UsageAggregation},
};
use usage_stats::{RowStatus, StatsError};

/// Ten readings a day at local midnight + k * 2.4h, US/Eastern summer offset.
fn write_fixture(days: &[(i64, usize)], watts: f64) -> tempfile::NamedTempFile {
    let start = datetime!(2011-04-18 00:00:00 -4);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "ts,watts").unwrap();
    for (day, n) in days {
        for i in 0..*n as i64 {
            let ts = start + Duration::days(*day) + Duration::seconds(i * 8_640);
            writeln!(file, "{},{}", ts.format(&Rfc3339).unwrap(), watts).unwrap();
        }
    }
    file.flush().unwrap();
    file
}

#[test]
fn csv_file_to_daily_report() {
    let fixture = write_fixture(&[(0, 10), (1, 3), (2, 10), (4, 10)], 100.0);
    let cfg = AppConfig::from_toml_str("[usage]\ngranularity = \"daily\"\n").unwrap();

    let mut out = Vec::new();
    let pipeline = Pipeline {
        source: PowerCsvFileSource::new(fixture.path()),
        transforms: vec![Arc::new(PowerSeriesValidation)],
        aggregate: UsageAggregation::new(cfg.usage_options().unwrap()),
        sink: CsvUsageSink::new(&mut out),
    };
    let table = pipeline.run().unwrap();

    assert_eq!(table.len(), 5);
    assert!(table.get("2011-04-18").unwrap().energy.is_some());
    assert!(matches!(
        table.get("2011-04-19").unwrap().status,
        RowStatus::InsufficientSamples { n_samples: 3, .. }
    ));
    assert!(table.get("2011-04-20").unwrap().energy.is_some());
    assert_eq!(table.get("2011-04-21").unwrap().status, RowStatus::NoData);

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines[0], "period,hours_on,kwh");
    assert_eq!(lines[1], "2011-04-18,21.6,2.16");
    assert_eq!(lines[2], "2011-04-19,,");
    assert_eq!(lines[4], "2011-04-21,,");
}

#[test]
fn negative_readings_stop_the_pipeline() {
    let fixture = write_fixture(&[(0, 10)], -1.0);

    let mut out = Vec::new();
    let pipeline = Pipeline {
        source: PowerCsvFileSource::new(fixture.path()),
        transforms: vec![Arc::new(PowerSeriesValidation)],
        aggregate: UsageAggregation::default(),
        sink: CsvUsageSink::new(&mut out),
    };

    assert!(matches!(pipeline.run(), Err(PipelineError::Transform(_))));
    assert!(out.is_empty());
}

#[test]
fn missing_file_is_a_source_error() {
    let mut out = Vec::new();
    let pipeline = Pipeline {
        source: PowerCsvFileSource::new("/nonexistent/readings.csv"),
        transforms: Vec::new(),
        aggregate: UsageAggregation::default(),
        sink: CsvUsageSink::new(&mut out),
    };

    assert!(matches!(pipeline.run(), Err(PipelineError::Source(_))));
}

#[test]
fn invalid_configuration_is_rejected_before_loading() {
    let cfg = AppConfig::from_toml_str("[usage]\ngranularity = \"weekly\"\n").unwrap();
    assert!(matches!(
        cfg.usage_options(),
        Err(StatsError::InvalidGranularity(_))
    ));
}
