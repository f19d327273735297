use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use crate::error::AppError;

use super::types::{
    document::{Document, DocumentMetadata, DocumentPatch, DocumentStatus, DocumentTransition},
    document_content::DocumentContent,
    query::{Query, QueryResult, QueryStatus, QueryTransition},
    StoredObject,
};

/// Snapshot of everything the presentation layer reads: both collections,
/// both selections and the shared loading/error slot.
///
/// Entities sit behind `Arc` so that snapshots are cheap to clone; mutation
/// goes exclusively through [`StoreState::apply`].
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    documents: Vec<Arc<Document>>,
    selected_document_id: Option<String>,
    queries: Vec<Arc<Query>>,
    selected_query_id: Option<String>,
    in_flight: usize,
    error: Option<String>,
}

/// Commands understood by the transition function.
#[derive(Debug, Clone)]
pub enum StoreAction {
    BeginOperation,
    /// Ends one tracked operation; `None` clears any stale error.
    EndOperation {
        error: Option<String>,
    },
    SetError(String),
    ClearError,
    AddDocument(Document),
    SeedDocuments(Vec<Document>),
    UpdateDocument {
        id: String,
        patch: DocumentPatch,
    },
    CompleteIngestion {
        id: String,
        content: DocumentContent,
        metadata: DocumentMetadata,
    },
    FailIngestion {
        id: String,
        reason: String,
    },
    DeleteDocument(String),
    SelectDocument(Option<String>),
    AddQuery(Query),
    StartQuery(String),
    CompleteQuery {
        id: String,
        results: Vec<QueryResult>,
    },
    FailQuery {
        id: String,
        reason: String,
    },
    SelectQuery(Option<String>),
    /// Applied all-or-nothing: if any step fails none of them take effect.
    Batch(Vec<StoreAction>),
}

impl StoreAction {
    pub fn label(&self) -> &'static str {
        match self {
            StoreAction::BeginOperation => "begin_operation",
            StoreAction::EndOperation { .. } => "end_operation",
            StoreAction::SetError(_) => "set_error",
            StoreAction::ClearError => "clear_error",
            StoreAction::AddDocument(_) => "add_document",
            StoreAction::SeedDocuments(_) => "seed_documents",
            StoreAction::UpdateDocument { .. } => "update_document",
            StoreAction::CompleteIngestion { .. } => "complete_ingestion",
            StoreAction::FailIngestion { .. } => "fail_ingestion",
            StoreAction::DeleteDocument(_) => "delete_document",
            StoreAction::SelectDocument(_) => "select_document",
            StoreAction::AddQuery(_) => "add_query",
            StoreAction::StartQuery(_) => "start_query",
            StoreAction::CompleteQuery { .. } => "complete_query",
            StoreAction::FailQuery { .. } => "fail_query",
            StoreAction::SelectQuery(_) => "select_query",
            StoreAction::Batch(_) => "batch",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total_documents: usize,
    pub documents_by_status: HashMap<DocumentStatus, usize>,
    pub documents_by_type: BTreeMap<String, usize>,
    pub total_queries: usize,
    pub queries_by_status: HashMap<QueryStatus, usize>,
    pub total_results: usize,
}

fn position_of<T: StoredObject>(items: &[Arc<T>], id: &str) -> Option<usize> {
    items.iter().position(|item| item.get_id() == id)
}

fn missing(collection: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{collection} {id}"))
}

impl StoreState {
    pub fn documents(&self) -> &[Arc<Document>] {
        &self.documents
    }

    pub fn document(&self, id: &str) -> Option<&Arc<Document>> {
        self.documents.iter().find(|doc| doc.id == id)
    }

    pub fn selected_document(&self) -> Option<&Arc<Document>> {
        self.selected_document_id
            .as_deref()
            .and_then(|id| self.document(id))
    }

    pub fn queries(&self) -> &[Arc<Query>] {
        &self.queries
    }

    pub fn query(&self, id: &str) -> Option<&Arc<Query>> {
        self.queries.iter().find(|query| query.id == id)
    }

    pub fn selected_query(&self) -> Option<&Arc<Query>> {
        self.selected_query_id
            .as_deref()
            .and_then(|id| self.query(id))
    }

    pub fn loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn stats(&self) -> StoreStats {
        let mut stats = StoreStats {
            total_documents: self.documents.len(),
            total_queries: self.queries.len(),
            ..StoreStats::default()
        };

        for doc in &self.documents {
            *stats.documents_by_status.entry(doc.status).or_default() += 1;
            *stats
                .documents_by_type
                .entry(doc.file_type.clone())
                .or_default() += 1;
        }
        for query in &self.queries {
            *stats.queries_by_status.entry(query.status).or_default() += 1;
            stats.total_results += query.results.len();
        }

        stats
    }

    /// Pure transition function: validates the action against the current
    /// state and applies it. On error the state is left exactly as it was.
    pub fn apply(&mut self, action: StoreAction) -> Result<(), AppError> {
        match action {
            StoreAction::BeginOperation => {
                self.in_flight = self.in_flight.saturating_add(1);
            }
            StoreAction::EndOperation { error } => {
                self.in_flight = self.in_flight.saturating_sub(1);
                self.error = error;
            }
            StoreAction::SetError(message) => self.error = Some(message),
            StoreAction::ClearError => self.error = None,
            StoreAction::AddDocument(document) => {
                if self.document(&document.id).is_some() {
                    return Err(AppError::Validation(format!(
                        "document {} already exists",
                        document.id
                    )));
                }
                self.documents.push(Arc::new(document));
            }
            StoreAction::SeedDocuments(documents) => {
                for (idx, document) in documents.iter().enumerate() {
                    let duplicate_in_batch = documents
                        .iter()
                        .take(idx)
                        .any(|earlier| earlier.id == document.id);
                    if duplicate_in_batch || self.document(&document.id).is_some() {
                        return Err(AppError::Validation(format!(
                            "document {} already exists",
                            document.id
                        )));
                    }
                }
                self.documents
                    .extend(documents.into_iter().map(Arc::new));
            }
            StoreAction::UpdateDocument { id, patch } => {
                let idx = position_of(&self.documents, &id)
                    .ok_or_else(|| missing(Document::collection_name(), &id))?;
                if let Some(doc) = self.documents.get_mut(idx) {
                    patch.apply_to(Arc::make_mut(doc));
                }
            }
            StoreAction::CompleteIngestion {
                id,
                content,
                metadata,
            } => {
                let doc = self.document_mut(&id)?;
                let mut next = (**doc).clone();
                next.transition(DocumentTransition::Complete)?;
                next.metadata = metadata.with_derived_counts(&content);
                next.content = content;
                *doc = Arc::new(next);
            }
            StoreAction::FailIngestion { id, reason } => {
                let doc = self.document_mut(&id)?;
                let mut next = (**doc).clone();
                next.transition(DocumentTransition::Fail)?;
                *doc = Arc::new(next);
                self.error = Some(reason);
            }
            StoreAction::DeleteDocument(id) => {
                let idx = position_of(&self.documents, &id)
                    .ok_or_else(|| missing(Document::collection_name(), &id))?;
                self.documents.remove(idx);
                if self.selected_document_id.as_deref() == Some(id.as_str()) {
                    self.selected_document_id = None;
                }
            }
            StoreAction::SelectDocument(id) => {
                self.selected_document_id =
                    id.filter(|candidate| self.document(candidate).is_some());
            }
            StoreAction::AddQuery(query) => {
                if self.query(&query.id).is_some() {
                    return Err(AppError::Validation(format!(
                        "query {} already exists",
                        query.id
                    )));
                }
                self.queries.push(Arc::new(query));
            }
            StoreAction::StartQuery(id) => {
                let query = self.query_mut(&id)?;
                let mut next = (**query).clone();
                next.transition(QueryTransition::Start)?;
                *query = Arc::new(next);
            }
            StoreAction::CompleteQuery { id, results } => {
                // Documents deleted while the query was scoring take their hits with them.
                let results: Vec<QueryResult> = results
                    .into_iter()
                    .filter(|result| self.document(&result.document_id).is_some())
                    .collect();
                let query = self.query_mut(&id)?;
                let mut next = (**query).clone();
                next.transition(QueryTransition::Complete)?;
                next.results = results;
                *query = Arc::new(next);
            }
            StoreAction::FailQuery { id, reason } => {
                let query = self.query_mut(&id)?;
                let mut next = (**query).clone();
                next.transition(QueryTransition::Fail)?;
                next.results.clear();
                *query = Arc::new(next);
                self.error = Some(reason);
            }
            StoreAction::SelectQuery(id) => {
                self.selected_query_id = id.filter(|candidate| self.query(candidate).is_some());
            }
            StoreAction::Batch(actions) => {
                let mut scratch = self.clone();
                for action in actions {
                    scratch.apply(action)?;
                }
                *self = scratch;
            }
        }

        Ok(())
    }

    fn document_mut(&mut self, id: &str) -> Result<&mut Arc<Document>, AppError> {
        self.documents
            .iter_mut()
            .find(|doc| doc.id == id)
            .ok_or_else(|| missing(Document::collection_name(), id))
    }

    fn query_mut(&mut self, id: &str) -> Result<&mut Arc<Query>, AppError> {
        self.queries
            .iter_mut()
            .find(|query| query.id == id)
            .ok_or_else(|| missing(Query::collection_name(), id))
    }
}

/// Functional form of [`StoreState::apply`]: returns the next state and leaves
/// the input untouched.
pub fn reduce(state: &StoreState, action: StoreAction) -> Result<StoreState, AppError> {
    let mut next = state.clone();
    next.apply(action)?;
    Ok(next)
}
