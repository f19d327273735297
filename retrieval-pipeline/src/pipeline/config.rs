use std::time::Duration;

use common::utils::config::AppConfig;

/// Tunable parameters that govern query execution.
#[derive(Debug, Clone)]
pub struct QueryTuning {
    /// Upper bound for one scoring call; `None` waits indefinitely.
    pub scoring_timeout: Option<Duration>,
    /// Only documents that finished ingestion are handed to the scorer.
    pub ready_documents_only: bool,
}

impl Default for QueryTuning {
    fn default() -> Self {
        Self {
            scoring_timeout: None,
            ready_documents_only: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryConfig {
    pub tuning: QueryTuning,
}

impl QueryConfig {
    pub fn new(tuning: QueryTuning) -> Self {
        Self { tuning }
    }

    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::new(QueryTuning {
            scoring_timeout: config.scoring_timeout_secs.map(Duration::from_secs),
            ..QueryTuning::default()
        })
    }
}
