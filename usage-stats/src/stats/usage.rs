//! Per-period usage aggregation.

use std::ops::Range;

use rayon::prelude::*;

use crate::domain::{PowerSeries, RowStatus, UsageRow, UsageTable};
use crate::error::StatsError;
use crate::stats::{
    periods::{
        max_samples_per_period, resolve_boundaries_with_sample_period, Granularity, Period,
        DEFAULT_WINDOW_FACTOR,
    },
    sample_period::sample_period,
    single::{energy, hours_on, EnergyUnit},
};

/// Settings for [`usage_per_period`].
#[derive(Debug, Clone, PartialEq)]
pub struct UsageOptions {
    pub granularity: Granularity,
    /// Split periods at the first sample's civil time instead of UTC.
    pub use_local_time: bool,
    /// Watts at or above which the load counts as on.
    pub on_power_threshold: f64,
    /// Periods losing a larger share of their expected samples are reported missing.
    pub max_dropout_rate: f64,
    pub energy_unit: EnergyUnit,
    /// Longest gap in seconds a reading is assumed to hold for.
    pub max_sample_period: Option<f64>,
    pub verbose: bool,
    pub workers: usize,
    pub window_factor: f64,
}

impl Default for UsageOptions {
    fn default() -> Self {
        Self {
            granularity: Granularity::Daily,
            use_local_time: true,
            on_power_threshold: 5.0,
            max_dropout_rate: 0.4,
            energy_unit: EnergyUnit::KilowattHours,
            max_sample_period: None,
            verbose: false,
            workers: 1,
            window_factor: DEFAULT_WINDOW_FACTOR,
        }
    }
}

impl UsageOptions {
    pub fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), StatsError> {
        if !(0.0..=1.0).contains(&self.max_dropout_rate) {
            return Err(StatsError::Configuration(format!(
                "max_dropout_rate must be within [0, 1], got {}",
                self.max_dropout_rate
            )));
        }
        if !self.on_power_threshold.is_finite() {
            return Err(StatsError::Configuration(
                "on_power_threshold must be finite".to_string(),
            ));
        }
        if let Some(max) = self.max_sample_period {
            if !(max.is_finite() && max > 0.0) {
                return Err(StatsError::Configuration(format!(
                    "max_sample_period must be a positive number of seconds, got {max}"
                )));
            }
        }
        if self.workers == 0 {
            return Err(StatsError::Configuration("workers must be at least 1".to_string()));
        }
        if !(self.window_factor.is_finite() && self.window_factor >= 1.0) {
            return Err(StatsError::Configuration(format!(
                "window_factor must be a finite value >= 1, got {}",
                self.window_factor
            )));
        }
        Ok(())
    }
}

/// Minimum sample count a period needs before its statistics are trusted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SufficiencyPolicy {
    max_samples_per_period: f64,
    min_samples_per_period: f64,
}

impl SufficiencyPolicy {
    pub fn new(granularity: Granularity, sample_period_secs: f64, max_dropout_rate: f64) -> Self {
        let max_samples_per_period = max_samples_per_period(granularity, sample_period_secs);
        Self {
            max_samples_per_period,
            min_samples_per_period: max_samples_per_period * (1.0 - max_dropout_rate),
        }
    }

    pub fn max_samples_per_period(&self) -> f64 {
        self.max_samples_per_period
    }

    pub fn min_samples_per_period(&self) -> f64 {
        self.min_samples_per_period
    }

    pub fn is_sufficient(&self, n_samples: usize) -> bool {
        n_samples as f64 >= self.min_samples_per_period
    }

    /// Share of the expected samples missing from a period holding `n_samples`.
    pub fn dropout_rate(&self, n_samples: usize) -> f64 {
        1.0 - n_samples as f64 / self.max_samples_per_period
    }
}

/// Hours on and energy per calendar period.
///
/// The table holds one row per period between the first and last sample.
/// Periods without samples, or with fewer than the sufficiency policy allows,
/// are present with missing values.
pub fn usage_per_period(series: &PowerSeries, options: &UsageOptions) -> Result<UsageTable, StatsError> {
    options.validate()?;

    let period_secs = sample_period(series)?;
    let boundaries = resolve_boundaries_with_sample_period(
        series.timestamps(),
        options.granularity,
        options.use_local_time,
        options.window_factor,
        period_secs,
    )?;
    let policy = SufficiencyPolicy::new(options.granularity, period_secs, options.max_dropout_rate);

    tracing::debug!(
        sample_period_secs = period_secs,
        periods = boundaries.periods().len(),
        min_samples = policy.min_samples_per_period(),
        "aggregating usage per period"
    );

    let entries: Vec<(Period, Option<Range<usize>>)> =
        boundaries.iter().map(|(period, range)| (*period, range)).collect();

    let rows = if options.workers <= 1 || entries.len() <= 1 {
        period_rows(series, &entries, &policy, options)?
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .build()
            .map_err(|e| StatsError::Configuration(format!("failed to build worker pool: {e}")))?;
        pool.install(|| {
            entries
                .par_iter()
                .map(|(period, range)| period_row(series, *period, range.clone(), &policy, options))
                .collect::<Result<Vec<_>, _>>()
        })?
    };

    for row in rows.iter().filter(|row| row.status.is_missing()) {
        report_exclusion(row, options.verbose);
    }

    Ok(UsageTable::new(options.energy_unit, rows))
}

fn period_rows(
    series: &PowerSeries,
    entries: &[(Period, Option<Range<usize>>)],
    policy: &SufficiencyPolicy,
    options: &UsageOptions,
) -> Result<Vec<UsageRow>, StatsError> {
    entries
        .iter()
        .map(|(period, range)| period_row(series, *period, range.clone(), policy, options))
        .collect()
}

fn period_row(
    series: &PowerSeries,
    period: Period,
    range: Option<Range<usize>>,
    policy: &SufficiencyPolicy,
    options: &UsageOptions,
) -> Result<UsageRow, StatsError> {
    let Some(range) = range else {
        return Ok(UsageRow::missing(period, RowStatus::NoData));
    };

    let data = series.slice(range)?;
    let n_samples = data.len();
    if !policy.is_sufficient(n_samples) {
        let (Some(start), Some(end)) = (data.first_timestamp(), data.last_timestamp()) else {
            return Ok(UsageRow::missing(period, RowStatus::NoData));
        };
        return Ok(UsageRow::missing(
            period,
            RowStatus::InsufficientSamples {
                n_samples,
                dropout_rate: policy.dropout_rate(n_samples),
                start,
                end,
            },
        ));
    }

    Ok(UsageRow {
        period,
        hours_on: Some(hours_on(&data, options.on_power_threshold, options.max_sample_period)),
        energy: Some(energy(&data, options.max_sample_period, options.energy_unit)),
        status: RowStatus::Populated { n_samples },
    })
}

fn report_exclusion(row: &UsageRow, verbose: bool) {
    let reason = match row.status {
        RowStatus::NoData => "no_data",
        RowStatus::InsufficientSamples { .. } => "insufficient_samples",
        RowStatus::Populated { .. } => return,
    };
    metrics::counter!("usage_periods_excluded_total", "reason" => reason).increment(1);

    if verbose {
        if let Some(text) = row.status.diagnostic(&row.label()) {
            tracing::info!(period = %row.period, reason, "{text}");
        }
    }
}
