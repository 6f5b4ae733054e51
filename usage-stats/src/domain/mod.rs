pub mod power_series;
pub mod usage;

pub use power_series::{PowerSeries, SeriesView};
pub use usage::{RowStatus, UsageRow, UsageTable};
