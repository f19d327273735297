use std::sync::Arc;

use tracing::{debug, error, info};

use crate::{
    error::AppError,
    utils::{config::AppConfig, ingest_limits::validate_upload},
};

use super::{
    queue::IngestionQueue,
    state::StoreAction,
    store::KnowledgeStore,
    types::{
        document::{Document, DocumentPatch},
        ingestion_task::IngestionTask,
        uploaded_file::UploadedFile,
    },
};

/// Narrows [`DocumentRepository::list`] the way the document manager view does.
#[derive(Debug, Clone, Default)]
pub struct DocumentFilter {
    /// Case-insensitive match against title or filename.
    pub search: Option<String>,
    /// Case-insensitive substring of the MIME type, e.g. `pdf`.
    pub file_type: Option<String>,
}

impl DocumentFilter {
    pub fn matches(&self, document: &Document) -> bool {
        let search_ok = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .is_none_or(|term| {
                let term = term.to_lowercase();
                document.title.to_lowercase().contains(&term)
                    || document.filename.to_lowercase().contains(&term)
            });

        let type_ok = self
            .file_type
            .as_deref()
            .map(str::trim)
            .filter(|kind| !kind.is_empty())
            .is_none_or(|kind| {
                document
                    .file_type
                    .to_ascii_lowercase()
                    .contains(&kind.to_ascii_lowercase())
            });

        search_ok && type_ok
    }
}

/// Owns the document collection: validates commands, applies them to the
/// store and hands new uploads to the ingestion queue.
#[derive(Clone)]
pub struct DocumentRepository {
    store: KnowledgeStore,
    config: AppConfig,
    queue: IngestionQueue,
}

impl DocumentRepository {
    pub fn new(store: KnowledgeStore, config: AppConfig, queue: IngestionQueue) -> Self {
        Self {
            store,
            config,
            queue,
        }
    }

    pub fn store(&self) -> &KnowledgeStore {
        &self.store
    }

    /// Creates a `processing` document for the upload and queues it for
    /// ingestion. Returns without waiting for extraction.
    #[tracing::instrument(skip_all, fields(filename = %file.filename))]
    pub fn upload_document(&self, file: UploadedFile) -> Result<String, AppError> {
        let (document_id, task) = self.track("Failed to upload document", || {
            let mime_type = validate_upload(&self.config, &file)?;
            let document = Document::from_upload(&file, mime_type.clone());
            let document_id = document.id.clone();
            let task = IngestionTask::new(document_id.clone(), file, mime_type);
            Ok((
                vec![StoreAction::AddDocument(document)],
                (document_id, task),
            ))
        })?;

        let task_id = task.id.clone();
        if let Err(err) = self.queue.enqueue(task) {
            error!(%document_id, error = %err, "Failed to queue document for ingestion");
            self.store.dispatch(StoreAction::FailIngestion {
                id: document_id.clone(),
                reason: format!("Failed to process document: {err}"),
            })?;
            return Ok(document_id);
        }

        info!(%document_id, %task_id, "Document queued for ingestion");
        Ok(document_id)
    }

    pub fn delete_document(&self, id: &str) -> Result<(), AppError> {
        self.track("Failed to delete document", || {
            Ok((vec![StoreAction::DeleteDocument(id.to_string())], ()))
        })?;
        info!(document_id = %id, "Document deleted");
        Ok(())
    }

    /// Merges `patch` into the document and bumps `last_modified`. Only
    /// existence is checked.
    pub fn update_document(&self, id: &str, patch: DocumentPatch) -> Result<(), AppError> {
        self.track("Failed to update document", || {
            Ok((
                vec![StoreAction::UpdateDocument {
                    id: id.to_string(),
                    patch,
                }],
                (),
            ))
        })?;
        debug!(document_id = %id, "Document updated");
        Ok(())
    }

    /// Selects the document with `id`, or clears the selection when `id` is
    /// `None` or unknown.
    pub fn select_document(&self, id: Option<&str>) {
        // Unknown ids resolve to an empty selection rather than an error.
        let _ = self
            .store
            .dispatch(StoreAction::SelectDocument(id.map(ToString::to_string)));
    }

    /// Inserts pre-built documents, typically already `ready`.
    pub fn seed(&self, documents: Vec<Document>) -> Result<(), AppError> {
        let count = documents.len();
        self.track("Failed to load documents", || {
            Ok((vec![StoreAction::SeedDocuments(documents)], ()))
        })?;
        info!(count, "Seeded documents");
        Ok(())
    }

    pub fn list(&self, filter: &DocumentFilter) -> Vec<Arc<Document>> {
        self.store.read(|state| {
            state
                .documents()
                .iter()
                .filter(|doc| filter.matches(doc))
                .cloned()
                .collect()
        })
    }

    pub fn document(&self, id: &str) -> Option<Arc<Document>> {
        self.store.document(id)
    }

    pub fn selected_document(&self) -> Option<Arc<Document>> {
        self.store.selected_document()
    }

    /// Runs one mutating operation: raises the loading flag, applies the
    /// produced actions together with the end of the operation, and on
    /// failure reports `failure` on the error channel and leaves the
    /// collections untouched.
    fn track<T>(
        &self,
        failure: &str,
        operation: impl FnOnce() -> Result<(Vec<StoreAction>, T), AppError>,
    ) -> Result<T, AppError> {
        self.store.dispatch(StoreAction::BeginOperation)?;

        let applied = operation().and_then(|(mut actions, value)| {
            actions.push(StoreAction::EndOperation { error: None });
            self.store.dispatch_all(actions).map(|()| value)
        });

        applied.inspect_err(|err| {
            let _ = self.store.dispatch(StoreAction::EndOperation {
                error: Some(format!("{failure}: {err}")),
            });
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{
        queue::{ingestion_queue, IngestionReceiver},
        types::{document::DocumentStatus, document_content::DocumentContent},
    };

    fn repository() -> (DocumentRepository, IngestionReceiver) {
        let (queue, receiver) = ingestion_queue();
        let repo = DocumentRepository::new(KnowledgeStore::new(), AppConfig::default(), queue);
        (repo, receiver)
    }

    fn ready_document(id: &str, title: &str, filename: &str, file_type: &str) -> Document {
        Document::ready(
            id.into(),
            title.into(),
            filename.into(),
            file_type.into(),
            DocumentContent {
                text: format!("{title} body"),
                ..DocumentContent::default()
            },
        )
    }

    #[tokio::test]
    async fn upload_creates_processing_document_and_queues_task() {
        let (repo, mut receiver) = repository();

        let id = repo
            .upload_document(UploadedFile::new("meeting.notes.txt", b"agenda".to_vec()))
            .expect("upload");

        let doc = repo.document(&id).expect("document");
        assert_eq!(doc.status, DocumentStatus::Processing);
        assert_eq!(doc.title, "meeting");
        assert_eq!(doc.file_type, "text/plain");
        assert_eq!(doc.file_size, 6);
        assert!(doc.content.is_empty());
        assert!(!repo.store().loading());
        assert!(repo.store().error().is_none());

        let task = receiver.next().await.expect("queued task");
        assert_eq!(task.document_id, id);
        assert_eq!(task.mime_type, "text/plain");
    }

    #[tokio::test]
    async fn unsupported_upload_is_rejected_before_document_exists() {
        let (repo, mut receiver) = repository();

        let err = repo
            .upload_document(UploadedFile::new("setup.exe", b"MZ".to_vec()))
            .expect_err("unsupported");

        assert!(matches!(err, AppError::Validation(_)));
        assert!(repo.store().documents().is_empty());
        assert!(!repo.store().loading());
        assert!(repo
            .store()
            .error()
            .is_some_and(|msg| msg.starts_with("Failed to upload document")));

        drop(repo);
        assert!(receiver.next().await.is_none());
    }

    #[tokio::test]
    async fn upload_with_closed_queue_marks_document_failed() {
        let (repo, mut receiver) = repository();
        receiver.close();

        let id = repo
            .upload_document(UploadedFile::new("notes.txt", b"x".to_vec()))
            .expect("document still created");

        assert_eq!(
            repo.document(&id).map(|d| d.status),
            Some(DocumentStatus::Error)
        );
        assert!(repo.store().error().is_some());
    }

    #[tokio::test]
    async fn delete_selected_document_clears_selection() {
        let (repo, _receiver) = repository();
        repo.seed(vec![
            ready_document("1", "Report", "report.pdf", "application/pdf"),
            ready_document("2", "Budget", "budget.xlsx", "application/vnd.ms-excel"),
        ])
        .expect("seed");

        repo.select_document(Some("1"));
        repo.select_document(Some("1"));
        assert_eq!(repo.selected_document().map(|d| d.id.clone()), Some("1".into()));

        repo.delete_document("1").expect("delete");

        assert!(repo.document("1").is_none());
        assert!(repo.selected_document().is_none());
        assert_eq!(repo.store().documents().len(), 1);
    }

    #[tokio::test]
    async fn delete_missing_document_reports_not_found() {
        let (repo, _receiver) = repository();
        repo.seed(vec![ready_document("1", "Report", "report.pdf", "application/pdf")])
            .expect("seed");

        let err = repo.delete_document("nope").expect_err("missing");

        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(repo.store().documents().len(), 1);
        assert!(repo
            .store()
            .error()
            .is_some_and(|msg| msg.starts_with("Failed to delete document")));
        assert!(!repo.store().loading());
    }

    #[tokio::test]
    async fn update_merges_fields_and_clears_stale_error() {
        let (repo, _receiver) = repository();
        repo.seed(vec![ready_document("1", "Report", "report.pdf", "application/pdf")])
            .expect("seed");
        let before = repo.document("1").expect("document").last_modified;
        let _ = repo.delete_document("missing");
        assert!(repo.store().error().is_some());

        repo.update_document(
            "1",
            DocumentPatch {
                title: Some("Annual report".into()),
                tags: Some(["finance".to_string()].into_iter().collect()),
                ..DocumentPatch::default()
            },
        )
        .expect("update");

        let doc = repo.document("1").expect("document");
        assert_eq!(doc.title, "Annual report");
        assert!(doc.tags.contains("finance"));
        assert_eq!(doc.filename, "report.pdf");
        assert!(doc.last_modified >= before);
        assert!(repo.store().error().is_none());
    }

    #[tokio::test]
    async fn update_missing_document_is_not_found() {
        let (repo, _receiver) = repository();
        let err = repo
            .update_document("ghost", DocumentPatch::default())
            .expect_err("missing");
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn seed_rejects_colliding_ids() {
        let (repo, _receiver) = repository();
        repo.seed(vec![ready_document("1", "Report", "report.pdf", "application/pdf")])
            .expect("seed");

        let err = repo
            .seed(vec![ready_document("1", "Other", "other.pdf", "application/pdf")])
            .expect_err("collision");

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(repo.document("1").map(|d| d.title.clone()), Some("Report".into()));
    }

    #[tokio::test]
    async fn list_filters_by_search_and_type() {
        let (repo, _receiver) = repository();
        repo.seed(vec![
            ready_document("1", "Quarterly Report", "q3.pdf", "application/pdf"),
            ready_document("2", "Budget", "budget-report.xlsx", "application/vnd.ms-excel"),
            ready_document("3", "Diagram", "arch.png", "image/png"),
        ])
        .expect("seed");

        let by_search = repo.list(&DocumentFilter {
            search: Some("REPORT".into()),
            file_type: None,
        });
        assert_eq!(by_search.len(), 2);

        let by_both = repo.list(&DocumentFilter {
            search: Some("report".into()),
            file_type: Some("pdf".into()),
        });
        assert_eq!(
            by_both.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            vec!["1"]
        );

        assert_eq!(repo.list(&DocumentFilter::default()).len(), 3);
    }
}
