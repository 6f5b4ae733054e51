use crate::pipeline::{Envelope, PipelineError, Transform};
use time::macros::datetime;
use usage_stats::{usage_per_period, PowerSeries, UsageOptions, UsageTable};

/// Pure validation of a loaded `PowerSeries`.
///
/// Rules:
/// - every reading is a finite, non-negative number of watts.
/// - every ts is within a broad sanity window [2000-01-01, 2100-01-01).
pub fn validate_power_series(env: Envelope<PowerSeries>) -> Result<Envelope<PowerSeries>, PipelineError> {
    let series = &env.payload;

    if let Some(i) = series.watts().iter().position(|w| !w.is_finite() || *w < 0.0) {
        return Err(PipelineError::Transform(format!(
            "sample {i}: watts must be finite and non-negative, got {}",
            series.watts()[i]
        )));
    }

    let min_ts = datetime!(2000-01-01 00:00:00 UTC);
    let max_ts = datetime!(2100-01-01 00:00:00 UTC);

    // Sorted, so checking the ends covers every sample.
    let (first, last) = (series.timestamps()[0], series.timestamps()[series.len() - 1]);
    if first < min_ts || last >= max_ts {
        return Err(PipelineError::Transform("timestamp out of allowed range".to_string()));
    }

    Ok(env)
}

#[derive(Clone, Default)]
pub struct PowerSeriesValidation;

impl Transform<PowerSeries, PowerSeries> for PowerSeriesValidation {
    fn apply(&self, input: Envelope<PowerSeries>) -> Result<Envelope<PowerSeries>, PipelineError> {
        match validate_power_series(input) {
            Ok(env) => Ok(env),
            Err(e) => {
                metrics::counter!("validation_power_series_rejected_total").increment(1);
                Err(e)
            }
        }
    }
}

/// Per-period usage aggregation as a pipeline stage.
#[derive(Clone, Default)]
pub struct UsageAggregation {
    pub options: UsageOptions,
}

impl UsageAggregation {
    pub fn new(options: UsageOptions) -> Self {
        Self { options }
    }
}

impl Transform<PowerSeries, UsageTable> for UsageAggregation {
    fn apply(&self, input: Envelope<PowerSeries>) -> Result<Envelope<UsageTable>, PipelineError> {
        let table = usage_per_period(&input.payload, &self.options)?;
        Ok(input.map(|_| table))
    }
}
