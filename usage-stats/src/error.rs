#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("input type error: {0}")]
    InputType(String),
    #[error("unrecognised energy unit '{0}'")]
    InvalidUnit(String),
    #[error("unrecognised period granularity '{0}'")]
    InvalidGranularity(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("malformed power series: {0}")]
    MalformedSeries(String),
    #[error("calendar arithmetic out of range: {0}")]
    OutOfRange(String),
}
