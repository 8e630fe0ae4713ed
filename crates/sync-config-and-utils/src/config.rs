//! Engine configuration.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Timing knobs for the mutation queue and snapshot reconciler.
///
/// Stored as milliseconds so the JSON config stays human-editable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncTuning {
    /// How long a debounced key waits for further updates before writing.
    pub debounce_ms: u64,
    /// First retry delay after a transient write failure.
    pub retry_base_ms: u64,
    /// Cap on the exponential retry delay.
    pub retry_max_ms: u64,
    /// Total write attempts per cycle, including the first one.
    pub max_attempts: u32,
    /// Pushes arriving this soon after a local write are treated as echoes.
    pub quiet_interval_ms: u64,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            retry_base_ms: 1000,
            retry_max_ms: 10_000,
            max_attempts: 3,
            quiet_interval_ms: 1000,
        }
    }
}

impl SyncTuning {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }

    pub fn retry_max(&self) -> Duration {
        Duration::from_millis(self.retry_max_ms)
    }

    pub fn quiet_interval(&self) -> Duration {
        Duration::from_millis(self.quiet_interval_ms)
    }

    /// Reject values that would stop writes from ever being attempted.
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_attempts == 0 {
            return Err(CoreError::InvalidTuning(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.retry_base_ms > self.retry_max_ms {
            return Err(CoreError::InvalidTuning(format!(
                "retry_base_ms ({}) exceeds retry_max_ms ({})",
                self.retry_base_ms, self.retry_max_ms
            )));
        }
        Ok(())
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Queue and reconciler timing.
    #[serde(default)]
    pub sync: SyncTuning,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            sync: SyncTuning::default(),
        }
    }
}

impl Config {
    /// Create a Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            debug!(path = %config_path.display(), "No config file, using defaults");
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.sync.validate()?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Only the log level can be overridden at runtime.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("WELLNESS_LOG_LEVEL") {
            self.log_level = log_level;
        }
    }
}
