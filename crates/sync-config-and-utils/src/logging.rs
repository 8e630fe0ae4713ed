//! Logging initialization.
//!
//! Thin wrapper over the observability crate so embedders configure logging
//! from the same [`Config`](crate::Config) they load everything else from.

use crate::Paths;

/// Initialize logging for the embedding app.
///
/// JSONL goes to `~/.wellness/logs/dev.jsonl` (or under `paths` when given),
/// with `level` as the default filter unless `RUST_LOG` is set.
pub fn init_logging(level: &str, paths: Option<&Paths>) {
    init_logging_for_service("wellness-app", level, paths);
}

/// Initialize logging with a custom service name.
pub fn init_logging_for_service(service_name: &str, level: &str, paths: Option<&Paths>) {
    observability::init_with_config(observability::LogConfig {
        service_name: service_name.into(),
        default_level: level.into(),
        log_path: paths.map(Paths::log_file),
        also_stderr: false,
    });
}
