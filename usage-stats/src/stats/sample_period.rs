use std::collections::BTreeMap;

use time::OffsetDateTime;

use crate::domain::{PowerSeries, SeriesView};
use crate::error::StatsError;

/// Number of leading timestamps inspected when estimating the sample period.
pub const SAMPLE_PERIOD_PREFIX: usize = 100;

/// Anything that carries a time axis.
pub trait TimeAxis {
    fn time_axis(&self) -> &[OffsetDateTime];
}

impl TimeAxis for [OffsetDateTime] {
    fn time_axis(&self) -> &[OffsetDateTime] {
        self
    }
}

impl TimeAxis for Vec<OffsetDateTime> {
    fn time_axis(&self) -> &[OffsetDateTime] {
        self
    }
}

impl TimeAxis for PowerSeries {
    fn time_axis(&self) -> &[OffsetDateTime] {
        self.timestamps()
    }
}

impl TimeAxis for SeriesView<'_> {
    fn time_axis(&self) -> &[OffsetDateTime] {
        self.timestamps()
    }
}

/// Estimate the sample period in seconds.
///
/// Returns the mode of the forward differences of the first
/// [`SAMPLE_PERIOD_PREFIX`] timestamps. Ties go to the shortest gap.
pub fn sample_period<T: TimeAxis + ?Sized>(data: &T) -> Result<f64, StatsError> {
    let axis = data.time_axis();
    let prefix = &axis[..axis.len().min(SAMPLE_PERIOD_PREFIX)];
    if prefix.len() < 2 {
        return Err(StatsError::InputType(format!(
            "a time axis of at least two timestamps is required, got {}",
            prefix.len()
        )));
    }

    let mut counts: BTreeMap<i128, usize> = BTreeMap::new();
    for pair in prefix.windows(2) {
        *counts.entry((pair[1] - pair[0]).whole_nanoseconds()).or_default() += 1;
    }

    let mut mode = (0_i128, 0_usize);
    for (gap, count) in counts {
        if count > mode.1 {
            mode = (gap, count);
        }
    }

    Ok(mode.0 as f64 / 1e9)
}
