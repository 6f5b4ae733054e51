use serde::Deserialize;
use std::{fs, path::Path};
use usage_stats::{EnergyUnit, Granularity, StatsError, UsageOptions};

const DEFAULT_CONFIG_PATH: &str = "usage-config.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UsageConfig {
    pub granularity: String,
    pub use_local_time: bool,
    pub on_power_threshold: f64,
    pub max_dropout_rate: f64,
    pub energy_unit: String,
    pub max_sample_period: Option<f64>,
    pub verbose: bool,
    pub workers: usize,
    pub window_factor: f64,
}

impl Default for UsageConfig {
    fn default() -> Self {
        let options = UsageOptions::default();
        Self {
            granularity: options.granularity.to_string(),
            use_local_time: options.use_local_time,
            on_power_threshold: options.on_power_threshold,
            max_dropout_rate: options.max_dropout_rate,
            energy_unit: options.energy_unit.to_string(),
            max_sample_period: options.max_sample_period,
            verbose: options.verbose,
            workers: options.workers,
            window_factor: options.window_factor,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub ts_column: String,
    pub watts_column: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            ts_column: "ts".to_string(),
            watts_column: "watts".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub usage: UsageConfig,
    pub source: SourceConfig,
    pub output: OutputConfig,
}

impl AppConfig {
    /// Reads the file named by `USAGE_CONFIG`, or `usage-config.toml`.
    ///
    /// Without `USAGE_CONFIG` a missing default file yields the defaults.
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        match env::var("USAGE_CONFIG") {
            Ok(path) => Self::from_file(&path),
            Err(_) if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        Ok(cfg)
    }

    /// Library options for the `[usage]` section, validated.
    pub fn usage_options(&self) -> Result<UsageOptions, StatsError> {
        let u = &self.usage;
        let options = UsageOptions {
            granularity: u.granularity.parse::<Granularity>()?,
            use_local_time: u.use_local_time,
            on_power_threshold: u.on_power_threshold,
            max_dropout_rate: u.max_dropout_rate,
            energy_unit: u.energy_unit.parse::<EnergyUnit>()?,
            max_sample_period: u.max_sample_period,
            verbose: u.verbose,
            workers: u.workers,
            window_factor: u.window_factor,
        };
        options.validate()?;
        Ok(options)
    }
}
