use std::time::Duration;

use common::utils::config::AppConfig;

#[derive(Debug, Clone)]
pub struct IngestionTuning {
    /// Upper bound for one extraction call; `None` waits indefinitely.
    pub extraction_timeout: Option<Duration>,
    /// Characters of extracted text echoed in debug logs.
    pub preview_chars: usize,
}

impl Default for IngestionTuning {
    fn default() -> Self {
        Self {
            extraction_timeout: None,
            preview_chars: 120,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngestionConfig {
    pub tuning: IngestionTuning,
}

impl IngestionConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            tuning: IngestionTuning {
                extraction_timeout: config.extraction_timeout_secs.map(Duration::from_secs),
                ..IngestionTuning::default()
            },
        }
    }
}
