use std::path::Path;

use bytes::Bytes;
use mime_guess::from_path;

/// Raw upload handed to the repository: a filename, an optional declared MIME
/// type and the file bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: None,
            bytes: bytes.into(),
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Declared MIME type when present, otherwise guessed from the extension.
    pub fn resolved_mime_type(&self) -> String {
        match self.mime_type.as_deref().map(str::trim) {
            Some(declared) if !declared.is_empty() => declared.to_ascii_lowercase(),
            _ => Self::guess_mime_type(Path::new(&self.filename)),
        }
    }

    /// Filename up to its first dot.
    pub fn title(&self) -> String {
        self.filename
            .split('.')
            .next()
            .filter(|stem| !stem.is_empty())
            .unwrap_or(&self.filename)
            .to_string()
    }

    fn guess_mime_type(path: &Path) -> String {
        from_path(path)
            .first_or(mime::APPLICATION_OCTET_STREAM)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_mime_type() {
        assert_eq!(
            UploadedFile::guess_mime_type(Path::new("test.txt")),
            "text/plain"
        );
        assert_eq!(
            UploadedFile::guess_mime_type(Path::new("image.png")),
            "image/png"
        );
        assert_eq!(
            UploadedFile::guess_mime_type(Path::new("document.pdf")),
            "application/pdf"
        );
        assert_eq!(
            UploadedFile::guess_mime_type(Path::new("no_extension")),
            "application/octet-stream"
        );
    }

    #[test]
    fn declared_type_wins_over_extension() {
        let file = UploadedFile::new("report.txt", "a,b".as_bytes().to_vec())
            .with_mime_type("Text/CSV");
        assert_eq!(file.resolved_mime_type(), "text/csv");

        let blank = UploadedFile::new("report.txt", Vec::new()).with_mime_type("  ");
        assert_eq!(blank.resolved_mime_type(), "text/plain");
    }

    #[test]
    fn title_is_filename_up_to_first_dot() {
        assert_eq!(
            UploadedFile::new("q4.financial.xlsx", Vec::new()).title(),
            "q4"
        );
        assert_eq!(UploadedFile::new(".env", Vec::new()).title(), ".env");
        assert_eq!(UploadedFile::new("README", Vec::new()).title(), "README");
    }
}
