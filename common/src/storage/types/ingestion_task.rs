use chrono::{DateTime, Utc};

use super::{new_id, uploaded_file::UploadedFile, StoredObject};

/// One-shot unit of ingestion work: the raw upload bound to the document id
/// it must populate. Each upload produces exactly one task, so no two tasks
/// target the same document.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionTask {
    pub id: String,
    pub document_id: String,
    pub file: UploadedFile,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

impl StoredObject for IngestionTask {
    fn collection_name() -> &'static str {
        "ingestion_task"
    }

    fn get_id(&self) -> &str {
        &self.id
    }
}

impl IngestionTask {
    pub fn new(document_id: String, file: UploadedFile, mime_type: String) -> Self {
        Self {
            id: new_id(),
            document_id,
            file,
            mime_type,
            created_at: Utc::now(),
        }
    }
}
