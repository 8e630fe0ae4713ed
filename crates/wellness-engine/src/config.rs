//! Engine construction settings.

use crate::EngineResult;
use quota_gate::{Plan, QuotaTable};
use sync_config_and_utils::{init_logging, Config, Paths, SyncTuning};

/// Everything the engine needs besides the store and the clock.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub log_level: String,
    pub tuning: SyncTuning,
    pub quota_table: QuotaTable,
    /// Subscription plan quotas are checked against.
    pub plan: Plan,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_config(Config::default(), QuotaTable::default())
    }
}

impl EngineConfig {
    pub fn from_config(config: Config, quota_table: QuotaTable) -> Self {
        Self {
            log_level: config.log_level,
            tuning: config.sync,
            quota_table,
            plan: Plan::Free,
        }
    }

    /// Load `config.json` and `quotas.json` from `paths`, falling back to
    /// defaults for whichever is missing.
    pub fn load(paths: &Paths) -> EngineResult<Self> {
        let config = Config::load(paths)?;
        let quota_table = QuotaTable::load(paths)?;
        Ok(Self::from_config(config, quota_table))
    }

    /// Route engine logs to the JSONL file under `paths`.
    pub fn init_logging(&self, paths: Option<&Paths>) {
        init_logging(&self.log_level, paths);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quota_gate::{QuotaLimit, QuotaMetric};
    use tempfile::tempdir;

    #[test]
    fn load_merges_both_files() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        paths.ensure_dirs().unwrap();
        std::fs::write(
            paths.config_file(),
            r#"{ "log_level": "debug", "sync": { "quiet_interval_ms": 2000 } }"#,
        )
        .unwrap();
        std::fs::write(
            paths.quota_table_file(),
            r#"{ "free": { "mealLogsPerDay": 8 } }"#,
        )
        .unwrap();

        let config = EngineConfig::load(&paths).unwrap();
        assert_eq!(config.tuning.quiet_interval_ms, 2000);
        assert_eq!(config.tuning.debounce_ms, 500);
        assert_eq!(
            config.quota_table.limit(Plan::Free, QuotaMetric::MealLogs),
            QuotaLimit::Limited(8)
        );
        assert_eq!(config.plan, Plan::Free);
    }

    #[test]
    fn load_without_files_uses_defaults() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().to_path_buf());
        let config = EngineConfig::load(&paths).unwrap();
        assert_eq!(config.tuning, SyncTuning::default());
        assert_eq!(config.quota_table, QuotaTable::default());
    }
}
