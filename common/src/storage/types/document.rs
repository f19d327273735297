use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use state_machines::state_machine;

use crate::error::AppError;

use super::{document_content::DocumentContent, new_id, uploaded_file::UploadedFile, StoredObject};

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Processing,
    Ready,
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Processing => "processing",
            DocumentStatus::Ready => "ready",
            DocumentStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Ready | DocumentStatus::Error)
    }
}

#[derive(Debug, Clone, Copy)]
pub enum DocumentTransition {
    Complete,
    Fail,
}

impl DocumentTransition {
    fn as_str(&self) -> &'static str {
        match self {
            DocumentTransition::Complete => "complete",
            DocumentTransition::Fail => "fail",
        }
    }
}

mod lifecycle {
    use super::state_machine;

    state_machine! {
        name: DocumentLifecycleMachine,
        initial: Processing,
        states: [Processing, Ready, Failed],
        events {
            complete {
                transition: { from: Processing, to: Ready }
            }
            fail {
                transition: { from: Processing, to: Failed }
            }
        }
    }

    pub(super) fn processing() -> DocumentLifecycleMachine<(), Processing> {
        DocumentLifecycleMachine::new(())
    }
}

fn invalid_transition(state: DocumentStatus, event: DocumentTransition) -> AppError {
    AppError::Validation(format!(
        "Invalid document transition: {} -> {}",
        state.as_str(),
        event.as_str()
    ))
}

/// Resolves the status a lifecycle event leads to, rejecting anything other
/// than `processing -> ready` and `processing -> error`.
pub fn compute_next_status(
    state: DocumentStatus,
    event: DocumentTransition,
) -> Result<DocumentStatus, AppError> {
    use lifecycle::processing;
    match (state, event) {
        (DocumentStatus::Processing, DocumentTransition::Complete) => processing()
            .complete()
            .map(|_| DocumentStatus::Ready)
            .map_err(|_| invalid_transition(state, event)),
        (DocumentStatus::Processing, DocumentTransition::Fail) => processing()
            .fail()
            .map(|_| DocumentStatus::Error)
            .map_err(|_| invalid_transition(state, event)),
        _ => Err(invalid_transition(state, event)),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub word_count: Option<usize>,
    #[serde(default)]
    pub image_count: Option<usize>,
    #[serde(default)]
    pub table_count: Option<usize>,
    #[serde(default)]
    pub code_block_count: Option<usize>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
}

impl DocumentMetadata {
    /// Fills counts the extraction service left unset from the content itself.
    pub fn with_derived_counts(mut self, content: &DocumentContent) -> Self {
        let pages = content.page_count();
        if self.page_count.is_none() && pages > 0 {
            self.page_count = Some(pages);
        }
        self.word_count.get_or_insert_with(|| content.word_count());
        self.image_count.get_or_insert(content.images.len());
        self.table_count.get_or_insert(content.tables.len());
        self.code_block_count
            .get_or_insert(content.code_blocks.len());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub filename: String,
    pub file_type: String,
    pub file_size: u64,
    pub upload_date: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub status: DocumentStatus,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub collaborators: BTreeSet<String>,
    #[serde(default)]
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub content: DocumentContent,
}

impl StoredObject for Document {
    fn collection_name() -> &'static str {
        "document"
    }

    fn get_id(&self) -> &str {
        &self.id
    }
}

impl Document {
    /// Allocates a freshly uploaded document awaiting ingestion.
    pub fn from_upload(file: &UploadedFile, file_type: String) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            title: file.title(),
            filename: file.filename.clone(),
            file_type,
            file_size: file.size(),
            upload_date: now,
            last_modified: now,
            status: DocumentStatus::Processing,
            tags: BTreeSet::new(),
            collaborators: BTreeSet::new(),
            metadata: DocumentMetadata::default(),
            content: DocumentContent::default(),
        }
    }

    /// Builds an already ingested document, e.g. for seeding demonstration data.
    pub fn ready(
        id: String,
        title: String,
        filename: String,
        file_type: String,
        content: DocumentContent,
    ) -> Self {
        let now = Utc::now();
        let metadata = DocumentMetadata::default().with_derived_counts(&content);
        Self {
            id,
            title,
            file_size: content.text.len() as u64,
            filename,
            file_type,
            upload_date: now,
            last_modified: now,
            status: DocumentStatus::Ready,
            tags: BTreeSet::new(),
            collaborators: BTreeSet::new(),
            metadata,
            content,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_collaborators<I, S>(mut self, collaborators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.collaborators
            .extend(collaborators.into_iter().map(Into::into));
        self
    }

    /// Moves the document through its ingestion lifecycle.
    pub fn transition(&mut self, event: DocumentTransition) -> Result<(), AppError> {
        self.status = compute_next_status(self.status, event)?;
        self.last_modified = Utc::now();
        Ok(())
    }
}

/// Partial field update merged into an existing document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DocumentPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub status: Option<DocumentStatus>,
    #[serde(default)]
    pub tags: Option<BTreeSet<String>>,
    #[serde(default)]
    pub collaborators: Option<BTreeSet<String>>,
    #[serde(default)]
    pub metadata: Option<DocumentMetadata>,
    #[serde(default)]
    pub content: Option<DocumentContent>,
}

impl DocumentPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply_to(self, document: &mut Document) {
        if let Some(title) = self.title {
            document.title = title;
        }
        if let Some(filename) = self.filename {
            document.filename = filename;
        }
        if let Some(file_type) = self.file_type {
            document.file_type = file_type;
        }
        if let Some(status) = self.status {
            document.status = status;
        }
        if let Some(tags) = self.tags {
            document.tags = tags;
        }
        if let Some(collaborators) = self.collaborators {
            document.collaborators = collaborators;
        }
        if let Some(metadata) = self.metadata {
            document.metadata = metadata;
        }
        if let Some(content) = self.content {
            document.content = content;
        }
        document.last_modified = Utc::now();
    }
}
