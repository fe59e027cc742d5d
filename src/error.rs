//! Error types for the timeout monitor.

use thiserror::Error;

/// Result alias for fallible monitor operations.
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Errors returned by [`crate::monitor::TimeoutMonitor`] operations.
///
/// `remove` is intentionally excluded from this taxonomy: an unknown task
/// identifier is a normal, non-error outcome there (it returns `false`).
#[derive(Debug, Error)]
pub enum MonitorError {
    /// `add` was called before `start` or after `stop`.
    #[error("monitor not running")]
    NotRunning,

    /// `add` was called with a non-positive timeout.
    #[error("timeout must be positive")]
    InvalidTimeout,

    /// `add` was called with a timeout greater than `slot_interval * wheel_size^num_wheels`.
    #[error("timeout exceeds maximum range")]
    RangeExceeded,

    /// `add` was called with a `task_id` already present in the registry.
    #[error("task already monitored")]
    DuplicateTask,

    /// Placement into the wheel failed after the registry entry was created;
    /// the registry entry is rolled back before this error is returned.
    ///
    /// This should only occur on internal invariant breakage — the placement
    /// calculator is total over the range `add` already validated — and
    /// exists as a defensive surface, not a path normal operation exercises.
    #[error("task placement failed")]
    PlacementFailed,

    /// Construction-time failure: `wheel_size == 0` or `num_wheels == 0`.
    #[error("invalid wheel configuration: {0}")]
    InvalidConfiguration(String),
}

/// Errors from loading a [`crate::config::WheelConfig`] from disk/environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid environment override for {var}: {value}")]
    InvalidEnvOverride { var: String, value: String },
}
