use crate::{error::AppError, storage::types::uploaded_file::UploadedFile};

use super::config::AppConfig;

/// Whether `mime_type` is covered by an allow-list entry. Entries of the form
/// `type/*` match every subtype of `type`.
pub fn is_supported_type(allowed: &[String], mime_type: &str) -> bool {
    let mime_type = mime_type.trim().to_ascii_lowercase();
    allowed.iter().any(|entry| {
        let entry = entry.trim().to_ascii_lowercase();
        match entry.strip_suffix("/*") {
            Some(top_level) => mime_type
                .split_once('/')
                .is_some_and(|(kind, _)| kind == top_level),
            None => entry == mime_type,
        }
    })
}

/// Checks an upload against the configured limits and returns the resolved
/// MIME type. Runs before any document is created.
pub fn validate_upload(config: &AppConfig, file: &UploadedFile) -> Result<String, AppError> {
    if file.filename.trim().is_empty() {
        return Err(AppError::Validation("File name must not be empty".into()));
    }

    let mime_type = file.resolved_mime_type();
    if !is_supported_type(&config.supported_file_types, &mime_type) {
        return Err(AppError::Validation(format!(
            "Unsupported file type {mime_type} for {}",
            file.filename
        )));
    }

    if file.size() > config.max_file_size_bytes {
        return Err(AppError::Validation(format!(
            "File is too large. Maximum allowed is {} bytes",
            config.max_file_size_bytes
        )));
    }

    Ok(mime_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_entries_match_whole_top_level_type() {
        let allowed = vec!["image/*".to_string(), "text/plain".to_string()];

        assert!(is_supported_type(&allowed, "image/png"));
        assert!(is_supported_type(&allowed, "IMAGE/JPEG"));
        assert!(is_supported_type(&allowed, "text/plain"));
        assert!(!is_supported_type(&allowed, "text/html"));
        assert!(!is_supported_type(&allowed, "imagery"));
    }

    #[test]
    fn validate_upload_resolves_type_from_extension() {
        let config = AppConfig::default();
        let file = UploadedFile::new("minutes.txt", b"agenda".to_vec());

        let mime = validate_upload(&config, &file).expect("supported");
        assert_eq!(mime, "text/plain");
    }

    #[test]
    fn validate_upload_prefers_declared_type() {
        let config = AppConfig::default();
        let file = UploadedFile::new("scan", b"\x89PNG".to_vec()).with_mime_type("image/png");

        assert_eq!(
            validate_upload(&config, &file).expect("supported"),
            "image/png"
        );
    }

    #[test]
    fn validate_upload_rejects_unsupported_type() {
        let config = AppConfig::default();
        let file = UploadedFile::new("tool.exe", b"MZ".to_vec());

        let result = validate_upload(&config, &file);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn validate_upload_rejects_oversized_file() {
        let config = AppConfig {
            max_file_size_bytes: 4,
            ..Default::default()
        };
        let file = UploadedFile::new("notes.txt", b"12345".to_vec());

        let result = validate_upload(&config, &file);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn validate_upload_rejects_blank_filename() {
        let config = AppConfig::default();
        let file = UploadedFile::new("  ", b"x".to_vec()).with_mime_type("text/plain");

        let result = validate_upload(&config, &file);
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
