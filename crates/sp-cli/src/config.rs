//! Configuration loading for the Sandpiper CLI.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sp_connectors::SandboxConfig;
use std::path::Path;

/// Application configuration, loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database URL.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Default language for display strings.
    #[serde(default = "default_language")]
    pub language: String,

    /// Optional directory with extra `<lang>.json` catalogs.
    #[serde(default)]
    pub lang_dir: Option<String>,

    /// Sandbox connector configuration.
    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// Base URL of the human-facing report site.
    #[serde(default = "default_report_base_url")]
    pub report_base_url: String,

    /// Status-monitor polling policy.
    #[serde(default)]
    pub monitor: MonitorSettings,

    /// Logging profile: `default`, `development`, or `production`.
    #[serde(default = "default_logging_profile")]
    pub logging: String,
}

/// Polling policy knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_database_url() -> String {
    "sqlite://sandpiper.db?mode=rwc".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_report_base_url() -> String {
    "https://app.any.run".to_string()
}

fn default_logging_profile() -> String {
    "default".to_string()
}

fn default_max_attempts() -> u32 {
    60
}

fn default_poll_interval_secs() -> u64 {
    5
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            language: default_language(),
            lang_dir: None,
            sandbox: SandboxConfig::default(),
            report_base_url: default_report_base_url(),
            monitor: MonitorSettings::default(),
            logging: default_logging_profile(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.language, "en");
        assert_eq!(config.monitor.max_attempts, 60);
        assert_eq!(config.monitor.poll_interval_secs, 5);
    }

    #[test]
    fn partial_yaml_fills_defaults() {
        let config: AppConfig =
            serde_yaml::from_str("database_url: sqlite://test.db\n").unwrap();
        assert_eq!(config.database_url, "sqlite://test.db");
        assert_eq!(config.report_base_url, "https://app.any.run");
        assert_eq!(config.sandbox.base_url, "https://api.any.run");
    }
}
