pub mod power_csv_file;

pub use power_csv_file::{read_power_series, PowerCsvFileSource};
