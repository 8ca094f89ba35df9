//! Configuration for the control core.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Backend address to connect to (e.g. `mock://lab`).
    pub address: String,
    /// Polling cadence and batching.
    pub polling: PollingConfig,
}

impl ControlConfig {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: ControlConfig =
            serde_yaml::from_str(&content).with_context(|| "Failed to parse config file")?;

        Ok(config)
    }
}

/// Polling configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Target interval between event polls, in milliseconds.
    pub event_interval_millis: u64,
    /// Target interval between task polls, in milliseconds.
    pub task_interval_millis: u64,
    /// Maximum number of items requested per poll.
    pub max_batch: usize,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            event_interval_millis: 2000,
            task_interval_millis: 1000,
            max_batch: 100,
        }
    }
}

impl PollingConfig {
    /// Target interval between event polls.
    pub fn event_interval(&self) -> Duration {
        Duration::from_millis(self.event_interval_millis)
    }

    /// Target interval between task polls.
    pub fn task_interval(&self) -> Duration {
        Duration::from_millis(self.task_interval_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControlConfig::default();
        assert_eq!(config.polling.event_interval(), Duration::from_millis(2000));
        assert_eq!(config.polling.task_interval(), Duration::from_millis(1000));
        assert_eq!(config.polling.max_batch, 100);
    }

    #[test]
    fn test_yaml_parsing_with_partial_overrides() {
        let yaml = r#"
address: mock://lab
polling:
  task_interval_millis: 250
"#;
        let config: ControlConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.address, "mock://lab");
        assert_eq!(config.polling.task_interval(), Duration::from_millis(250));
        // Unspecified fields keep their defaults.
        assert_eq!(config.polling.max_batch, 100);
    }
}
