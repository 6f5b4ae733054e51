pub mod csv_report;
pub mod json_report;

pub use csv_report::CsvUsageSink;
pub use json_report::JsonUsageSink;
