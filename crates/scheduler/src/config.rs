use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::clock::Millis;
use crate::error::SchedulerError;

/// Scheduler configuration, typically parsed from TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Time slice budget per flush, in milliseconds.
    #[serde(default = "default_frame_interval")]
    pub frame_interval_ms: Millis,
    /// A single task step running at least this long is logged as slow.
    #[serde(default = "default_slow_task_warn")]
    pub slow_task_warn_ms: Millis,
}

fn default_frame_interval() -> Millis { 5 }
fn default_slow_task_warn() -> Millis { 50 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval(),
            slow_task_warn_ms: default_slow_task_warn(),
        }
    }
}

// ── Loading & Validation ────────────────────────────────────────────

impl SchedulerConfig {
    /// Parse config from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, SchedulerError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SchedulerError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self, SchedulerError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CADENCE_FRAME_INTERVAL_MS") {
            if let Ok(ms) = v.parse::<Millis>() {
                self.frame_interval_ms = ms;
            }
        }
        if let Ok(v) = std::env::var("CADENCE_SLOW_TASK_WARN_MS") {
            if let Ok(ms) = v.parse::<Millis>() {
                self.slow_task_warn_ms = ms;
            }
        }
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.frame_interval_ms <= 0 {
            return Err(SchedulerError::Config(format!(
                "frame_interval_ms must be positive, got {}",
                self.frame_interval_ms
            )));
        }
        if self.slow_task_warn_ms < 0 {
            return Err(SchedulerError::Config(format!(
                "slow_task_warn_ms must not be negative, got {}",
                self.slow_task_warn_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_config_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.frame_interval_ms, 5);
        assert_eq!(config.slow_task_warn_ms, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_partial_toml_fills_defaults() {
        let config: SchedulerConfig = toml::from_str("frame_interval_ms = 8").unwrap();
        assert_eq!(config.frame_interval_ms, 8);
        assert_eq!(config.slow_task_warn_ms, 50);
    }

    #[test]
    fn parse_empty_toml() {
        let config: SchedulerConfig = toml::from_str("").unwrap();
        assert_eq!(config, SchedulerConfig::default());
    }

    #[test]
    fn reject_non_positive_frame_interval() {
        let config = SchedulerConfig {
            frame_interval_ms: 0,
            ..SchedulerConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("frame_interval_ms"));
    }

    #[test]
    fn reject_malformed_toml() {
        let err = SchedulerConfig::from_toml("frame_interval_ms = \"fast\"").unwrap_err();
        assert!(matches!(err, SchedulerError::ConfigParse(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = SchedulerConfig::from_file("/nonexistent/cadence.toml").unwrap_err();
        assert!(matches!(err, SchedulerError::ConfigIo(_)));
    }
}
