//! Statistics over a single load's readings.
//!
//! Each reading is held until the next sample, so the trailing sample of a
//! range contributes nothing to on-duration or energy.

use std::{fmt, str::FromStr};

use crate::domain::SeriesView;
use crate::error::StatsError;
use crate::stats::sample_period::sample_period;

pub const JOULES_PER_KWH: f64 = 3_600_000.0;
const SECS_PER_HOUR: f64 = 3_600.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub enum EnergyUnit {
    #[default]
    KilowattHours,
    Joules,
}

impl EnergyUnit {
    /// Column name used for this unit in usage tables.
    pub fn column_name(&self) -> &'static str {
        match self {
            Self::KilowattHours => "kwh",
            Self::Joules => "joules",
        }
    }

    pub fn from_joules(&self, joules: f64) -> f64 {
        match self {
            Self::KilowattHours => joules / JOULES_PER_KWH,
            Self::Joules => joules,
        }
    }

    pub fn to_joules(&self, value: f64) -> f64 {
        match self {
            Self::KilowattHours => value * JOULES_PER_KWH,
            Self::Joules => value,
        }
    }
}

impl fmt::Display for EnergyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl FromStr for EnergyUnit {
    type Err = StatsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kwh" | "kilowatt-hours" | "kilowatt_hours" => Ok(Self::KilowattHours),
            "joules" | "j" => Ok(Self::Joules),
            _ => Err(StatsError::InvalidUnit(s.to_string())),
        }
    }
}

impl TryFrom<String> for EnergyUnit {
    type Error = StatsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EnergyUnit> for String {
    fn from(value: EnergyUnit) -> Self {
        value.column_name().to_string()
    }
}

fn capped(gap_secs: f64, max_sample_period: Option<f64>) -> f64 {
    match max_sample_period {
        Some(max) => gap_secs.min(max),
        None => gap_secs,
    }
}

/// Proportion of samples lost relative to the range's own sample period.
///
/// 0 means nothing was lost; the value goes negative when the range holds
/// more samples than its duration suggests.
pub fn dropout_rate(data: &SeriesView<'_>) -> Result<f64, StatsError> {
    let period_secs = sample_period(data)?;
    let expected = data.duration().as_seconds_f64() / period_secs;
    Ok(1.0 - data.len() as f64 / expected)
}

/// Hours during which the reading was at or above `on_power_threshold` watts.
///
/// With `max_sample_period` set, a gap longer than that many seconds after
/// an "on" sample only counts for `max_sample_period` seconds.
pub fn hours_on(data: &SeriesView<'_>, on_power_threshold: f64, max_sample_period: Option<f64>) -> f64 {
    let secs_on: f64 = data
        .held_readings()
        .filter(|(watts, _)| *watts >= on_power_threshold)
        .map(|(_, gap)| capped(gap, max_sample_period))
        .sum();
    secs_on / SECS_PER_HOUR
}

/// Energy consumed over the range, in `unit`.
pub fn energy(data: &SeriesView<'_>, max_sample_period: Option<f64>, unit: EnergyUnit) -> f64 {
    let joules: f64 = data
        .held_readings()
        .map(|(watts, gap)| watts * capped(gap, max_sample_period))
        .sum();
    unit.from_joules(joules)
}
