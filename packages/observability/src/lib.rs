//! # Observability
//!
//! Centralized logging for the wellness sync engine.
//!
//! Library crates never configure logging. They emit `tracing` events with
//! structured fields and leave routing to whoever embeds them. The embedding
//! application calls [`init`] or [`init_with_config`] once.
//!
//! ## Dev Mode
//!
//! With the default `dev` feature every event is written as one JSON object
//! per line to `~/.wellness/logs/dev.jsonl`:
//!
//! - `tail -f ~/.wellness/logs/dev.jsonl | jq` for pretty JSON
//! - `jq 'select(.target | startswith("mutation_queue"))'` to follow the queue
//!
//! ## Usage
//!
//! ```rust,ignore
//! observability::init_with_config(observability::LogConfig {
//!     service_name: "wellness-app".into(),
//!     default_level: "debug".into(),
//!     also_stderr: true,
//!     ..Default::default()
//! });
//! tracing::info!("sync engine ready");
//! ```

#[cfg(feature = "dev")]
mod dev;

mod json_layer;

use std::path::PathBuf;

pub use json_layer::{JsonLayer, LogEntry};

/// Where and how much to log.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Written as `service` on every line.
    pub service_name: String,
    /// Filter used when `RUST_LOG` is unset.
    pub default_level: String,
    /// Defaults to `~/.wellness/logs/dev.jsonl`.
    pub log_path: Option<PathBuf>,
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "wellness-app".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize logging with default settings for `service_name`.
pub fn init(service_name: &str) {
    init_with_config(LogConfig {
        service_name: service_name.into(),
        ..Default::default()
    });
}

/// Install the global subscriber. Only the first call has any effect.
pub fn init_with_config(config: LogConfig) {
    #[cfg(feature = "dev")]
    dev::init_dev_subscriber(&config);

    #[cfg(not(feature = "dev"))]
    {
        use tracing_subscriber::util::SubscriberInitExt;
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.default_level)),
            )
            .compact()
            .finish()
            .try_init();
    }
}
