pub mod domain;
pub mod error;
pub mod stats;

pub use domain::{PowerSeries, RowStatus, SeriesView, UsageRow, UsageTable};
pub use error::StatsError;
pub use stats::{
    periods::{resolve_boundaries, BoundaryMap, Granularity, Period},
    sample_period::sample_period,
    single::{dropout_rate, energy, hours_on, EnergyUnit},
    usage::{usage_per_period, SufficiencyPolicy, UsageOptions},
};
