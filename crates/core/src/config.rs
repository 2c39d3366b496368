use serde::Deserialize;
use std::path::Path;

/// Root application configuration. Loaded from an optional YAML file layered
/// under environment variables with the prefix `LOGFLOW__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_path")]
    pub log_path: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Anomaly detection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// Advisory capacity hint for the response-time buffer; does not change
    /// windowing behavior.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_sensitivity_level")]
    pub sensitivity_level: f64,
    /// Reserved; carried for config-file compatibility.
    #[serde(default = "default_baseline_minutes")]
    pub baseline_minutes: u32,
    /// Reserved; carried for config-file compatibility.
    #[serde(default = "default_error_rate_threshold")]
    pub error_rate_threshold: f64,
    /// One of `stddev`, `moving_average`, `cusum`. Unknown values fall back
    /// to `stddev`.
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    /// Alpha parameter for the moving-average detector, valid range (0, 1).
    #[serde(default = "default_smoothing_factor")]
    pub smoothing_factor: f64,
    /// CUSUM k parameter: slack absorbed before the accumulators grow.
    #[serde(default = "default_cusum_slack")]
    pub cusum_slack: f64,
    /// CUSUM h parameter: decision threshold.
    #[serde(default = "default_cusum_threshold")]
    pub cusum_threshold: f64,
}

/// Web dashboard settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_dashboard_port")]
    pub port: u16,
    #[serde(default = "default_dashboard_host")]
    pub host: String,
    /// Reserved; carried for config-file compatibility.
    #[serde(default)]
    pub enable_tui: bool,
    /// Reserved; carried for config-file compatibility.
    #[serde(default = "default_refresh_rate_ms")]
    pub refresh_rate_ms: u64,
    /// Reserved; carried for config-file compatibility.
    #[serde(default = "default_max_log_lines")]
    pub max_log_lines: usize,
}

// Default functions
fn default_log_path() -> String {
    "/var/log/app.log".to_string()
}
fn default_log_format() -> String {
    "json".to_string()
}
fn default_window_size() -> usize {
    100
}
fn default_sensitivity_level() -> f64 {
    2.0
}
fn default_baseline_minutes() -> u32 {
    10
}
fn default_error_rate_threshold() -> f64 {
    0.05
}
fn default_algorithm() -> String {
    "stddev".to_string()
}
fn default_smoothing_factor() -> f64 {
    0.3
}
fn default_cusum_slack() -> f64 {
    0.5
}
fn default_cusum_threshold() -> f64 {
    5.0
}
fn default_dashboard_port() -> u16 {
    8080
}
fn default_dashboard_host() -> String {
    "localhost".to_string()
}
fn default_refresh_rate_ms() -> u64 {
    1000
}
fn default_max_log_lines() -> usize {
    500
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            sensitivity_level: default_sensitivity_level(),
            baseline_minutes: default_baseline_minutes(),
            error_rate_threshold: default_error_rate_threshold(),
            algorithm: default_algorithm(),
            smoothing_factor: default_smoothing_factor(),
            cusum_slack: default_cusum_slack(),
            cusum_threshold: default_cusum_threshold(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            port: default_dashboard_port(),
            host: default_dashboard_host(),
            enable_tui: false,
            refresh_rate_ms: default_refresh_rate_ms(),
            max_log_lines: default_max_log_lines(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path(),
            log_format: default_log_format(),
            detector: DetectorConfig::default(),
            dashboard: DashboardConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional YAML file and `LOGFLOW__`-prefixed
    /// environment variables. A missing file is not an error; defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("LOGFLOW")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
