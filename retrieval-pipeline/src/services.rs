use std::sync::Arc;

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::types::{
        document::Document,
        query::{QueryFilters, QueryKind, QueryResult},
    },
};

/// Input handed to the scoring collaborator: the query text plus a snapshot of
/// the documents that survived scoping and filtering.
#[derive(Debug, Clone, Copy)]
pub struct ScoringRequest<'a> {
    pub text: &'a str,
    pub kind: QueryKind,
    pub candidates: &'a [Arc<Document>],
    pub filters: &'a QueryFilters,
}

/// Boundary to the ranking service. Results come back in the service's own
/// order; thresholding, ordering and limits are applied by the engine.
/// Implementations report their own failures as [`AppError::Transport`].
#[async_trait]
pub trait ScoringService: Send + Sync {
    async fn score(&self, request: ScoringRequest<'_>) -> Result<Vec<QueryResult>, AppError>;
}
