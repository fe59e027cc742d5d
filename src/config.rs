//! Wheel sizing configuration: file, then environment overrides, then
//! built-in defaults. Loading hierarchy follows the crate's config
//! conventions: defaults < file < environment.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::placement::max_range_ms;

/// Sizing parameters for a [`crate::monitor::TimeoutMonitor`].
///
/// Defaults: `wheel_size = 60`, `slot_interval = 1000ms`, `num_wheels = 3`,
/// `callback_pool_size = 4`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelConfig {
    pub wheel_size: usize,
    pub slot_interval_ms: u64,
    pub num_wheels: usize,
    pub callback_pool_size: usize,
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            wheel_size: 60,
            slot_interval_ms: 1000,
            num_wheels: 3,
            callback_pool_size: 4,
        }
    }
}

impl WheelConfig {
    pub fn slot_interval(&self) -> Duration {
        Duration::from_millis(self.slot_interval_ms)
    }

    /// Maximum representable timeout under this configuration.
    pub fn max_range_ms(&self) -> u128 {
        max_range_ms(self.wheel_size, self.slot_interval(), self.num_wheels)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.wheel_size == 0 {
            return Err(ConfigError::InvalidEnvOverride {
                var: "wheel_size".to_string(),
                value: "0".to_string(),
            });
        }
        if self.num_wheels == 0 {
            return Err(ConfigError::InvalidEnvOverride {
                var: "num_wheels".to_string(),
                value: "0".to_string(),
            });
        }
        if self.slot_interval_ms == 0 {
            return Err(ConfigError::InvalidEnvOverride {
                var: "slot_interval_ms".to_string(),
                value: "0".to_string(),
            });
        }
        if self.callback_pool_size == 0 {
            return Err(ConfigError::InvalidEnvOverride {
                var: "callback_pool_size".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Load from a TOML file at `path`, then apply `TIMEWHEEL_*` environment
    /// overrides, then validate. Missing fields in the file fall back to
    /// [`WheelConfig::default`] values via `#[serde(default)]`.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: WheelConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Start from [`WheelConfig::default`], apply `TIMEWHEEL_*` environment
    /// overrides, then validate. Useful when no config file is present.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = std::env::var("TIMEWHEEL_WHEEL_SIZE") {
            self.wheel_size = parse_env("TIMEWHEEL_WHEEL_SIZE", &value)?;
        }
        if let Ok(value) = std::env::var("TIMEWHEEL_SLOT_INTERVAL_MS") {
            self.slot_interval_ms = parse_env("TIMEWHEEL_SLOT_INTERVAL_MS", &value)?;
        }
        if let Ok(value) = std::env::var("TIMEWHEEL_NUM_WHEELS") {
            self.num_wheels = parse_env("TIMEWHEEL_NUM_WHEELS", &value)?;
        }
        if let Ok(value) = std::env::var("TIMEWHEEL_CALLBACK_POOL_SIZE") {
            self.callback_pool_size = parse_env("TIMEWHEEL_CALLBACK_POOL_SIZE", &value)?;
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        var: var.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_spec() {
        let config = WheelConfig::default();
        assert_eq!(config.wheel_size, 60);
        assert_eq!(config.slot_interval_ms, 1000);
        assert_eq!(config.num_wheels, 3);
        assert_eq!(config.callback_pool_size, 4);
    }

    #[test]
    fn loads_partial_file_and_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "wheel_size = 4\nnum_wheels = 2").unwrap();
        let config = WheelConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.wheel_size, 4);
        assert_eq!(config.num_wheels, 2);
        assert_eq!(config.slot_interval_ms, 1000, "unset fields keep defaults");
    }

    #[test]
    fn env_override_wins_over_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "wheel_size = 4").unwrap();
        std::env::set_var("TIMEWHEEL_WHEEL_SIZE", "10");
        let config = WheelConfig::load_from_file(file.path()).unwrap();
        std::env::remove_var("TIMEWHEEL_WHEEL_SIZE");
        assert_eq!(config.wheel_size, 10);
    }

    #[test]
    fn zero_wheel_size_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "wheel_size = 0").unwrap();
        assert!(WheelConfig::load_from_file(file.path()).is_err());
    }

    #[test]
    fn max_range_reflects_configured_shape() {
        let config = WheelConfig {
            wheel_size: 4,
            slot_interval_ms: 100,
            num_wheels: 2,
            callback_pool_size: 4,
        };
        assert_eq!(config.max_range_ms(), 1600);
    }
}
