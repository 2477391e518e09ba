use std::path::PathBuf;

use serde::Deserialize;

use crate::budget::VitalBudgets;

/// Remote reporting endpoints. Absent entirely ⇒ reporting is disabled and
/// the buffer is bounded by ring eviction alone.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportingConfig {
    /// Bulk flush endpoint (`{metrics, userAgent, url, timestamp}`).
    pub endpoint: String,
    /// Optional per-vital endpoint (`{sessionId, metric, analytics}`).
    #[serde(default)]
    pub vitals_endpoint: Option<String>,
}

/// Monitor configuration. Every field has a documented default, so an empty
/// TOML file (or `MonitorConfig::default()`) yields a working local-only
/// monitor.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Probability (0.0–1.0) that this session instruments at all.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,

    /// Maximum buffered metrics before FIFO eviction.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Buffer occupancy that triggers an automatic flush.
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,

    /// Log every tracked metric at debug level.
    #[serde(default)]
    pub console_logging: bool,

    /// Directory for the bounded debug mirror; `None` disables it.
    #[serde(default)]
    pub mirror_dir: Option<PathBuf>,

    /// Only resources under this prefix produce `static_resource_load`
    /// metrics; keeps third-party/CDN noise out.
    #[serde(default = "default_asset_prefix")]
    pub asset_prefix: String,

    /// Memory sampling interval.
    #[serde(default = "default_memory_sample_secs")]
    pub memory_sample_secs: u64,

    /// User agent string carried in flush payloads.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default)]
    pub reporting: Option<ReportingConfig>,

    #[serde(default)]
    pub budgets: VitalBudgets,
}

fn default_sample_rate() -> f64 {
    1.0
}

fn default_capacity() -> usize {
    1000
}

fn default_flush_threshold() -> usize {
    50
}

fn default_asset_prefix() -> String {
    "/static/".to_string()
}

fn default_memory_sample_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    concat!("perf-telemetry/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            capacity: default_capacity(),
            flush_threshold: default_flush_threshold(),
            console_logging: false,
            mirror_dir: None,
            asset_prefix: default_asset_prefix(),
            memory_sample_secs: default_memory_sample_secs(),
            user_agent: default_user_agent(),
            reporting: None,
            budgets: VitalBudgets::default(),
        }
    }
}

impl MonitorConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_documented_defaults() {
        let config: MonitorConfig = toml::from_str("").unwrap();
        assert_eq!(config.sample_rate, 1.0);
        assert_eq!(config.capacity, 1000);
        assert_eq!(config.flush_threshold, 50);
        assert_eq!(config.asset_prefix, "/static/");
        assert_eq!(config.memory_sample_secs, 30);
        assert!(config.reporting.is_none());
        assert!(!config.console_logging);
    }

    #[test]
    fn reporting_section_parses() {
        let config: MonitorConfig = toml::from_str(
            r#"
            sample_rate = 0.25
            capacity = 200

            [reporting]
            endpoint = "https://metrics.example.org/v1/bulk"
            vitals_endpoint = "https://metrics.example.org/v1/vitals"
            "#,
        )
        .unwrap();
        assert_eq!(config.sample_rate, 0.25);
        assert_eq!(config.capacity, 200);
        let reporting = config.reporting.unwrap();
        assert!(reporting.endpoint.ends_with("/bulk"));
        assert!(reporting.vitals_endpoint.unwrap().ends_with("/vitals"));
    }
}
