use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// MIME types accepted by the upload dialog. Entries ending in `/*` match a
/// whole top-level type.
pub const DEFAULT_SUPPORTED_FILE_TYPES: &[&str] = &[
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "text/plain",
    "text/html",
    "text/csv",
    "image/*",
];

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub supported_file_types: Vec<String>,
    pub max_file_size_bytes: u64,
    pub default_relevance_threshold: f32,
    pub default_max_results: usize,
    pub extraction_timeout_secs: Option<u64>,
    pub scoring_timeout_secs: Option<u64>,
    pub default_user_id: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supported_file_types: DEFAULT_SUPPORTED_FILE_TYPES
                .iter()
                .map(|entry| (*entry).to_string())
                .collect(),
            max_file_size_bytes: 10 * 1024 * 1024,
            default_relevance_threshold: 0.5,
            default_max_results: 10,
            extraction_timeout_secs: None,
            scoring_timeout_secs: None,
            default_user_id: "current-user".to_string(),
        }
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(
            Environment::default()
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("supported_file_types"),
        )
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn empty_sources_fall_back_to_defaults() {
        let config: AppConfig = Config::builder()
            .build()
            .expect("build")
            .try_deserialize()
            .expect("deserialize");

        assert_eq!(config, AppConfig::default());
        assert_eq!(config.max_file_size_bytes, 10_485_760);
        assert!(config.supported_file_types.iter().any(|t| t == "image/*"));
    }

    #[test]
    fn file_source_overrides_selected_fields() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(
                r#"
                    supported_file_types = ["text/plain"]
                    default_max_results = 3
                    scoring_timeout_secs = 5
                "#,
                FileFormat::Toml,
            ))
            .build()
            .expect("build")
            .try_deserialize()
            .expect("deserialize");

        assert_eq!(config.supported_file_types, vec!["text/plain".to_string()]);
        assert_eq!(config.default_max_results, 3);
        assert_eq!(config.scoring_timeout_secs, Some(5));
        assert!((config.default_relevance_threshold - 0.5).abs() < f32::EPSILON);
    }
}
