use async_trait::async_trait;
use common::{
    error::AppError,
    storage::types::{
        document::DocumentMetadata, document_content::DocumentContent,
        uploaded_file::UploadedFile,
    },
};

use crate::utils::text_extraction::extract_plain_text;

/// What the extraction collaborator returns for one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionOutput {
    pub content: DocumentContent,
    pub metadata: DocumentMetadata,
}

/// Boundary to the document parsing service. Implementations report their own
/// failures as [`AppError::Transport`].
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn extract(
        &self,
        file: &UploadedFile,
        mime_type: &str,
    ) -> Result<ExtractionOutput, AppError>;
}

/// In-process extractor for `text/*` uploads.
#[derive(Debug, Clone, Default)]
pub struct DefaultExtractionService;

#[async_trait]
impl ExtractionService for DefaultExtractionService {
    async fn extract(
        &self,
        file: &UploadedFile,
        mime_type: &str,
    ) -> Result<ExtractionOutput, AppError> {
        if !mime_type.starts_with("text/") {
            return Err(AppError::Transport(format!(
                "no extractor available for {mime_type}"
            )));
        }

        let content = extract_plain_text(&file.bytes, mime_type)?;
        Ok(ExtractionOutput {
            content,
            metadata: DocumentMetadata::default(),
        })
    }
}
