mod config;

pub use config::{QueryConfig, QueryTuning};

use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};

use common::{
    error::AppError,
    storage::{
        state::{StoreAction, StoreState},
        store::KnowledgeStore,
        types::{
            document::{Document, DocumentStatus},
            query::{Query, QueryFilters, QueryKind, QueryResult},
        },
    },
    utils::{
        config::AppConfig,
        identity::{IdentityProvider, StaticIdentity},
    },
};
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::{
    lexical::LexicalScoringService,
    scoring::{rank_results, retain_in_scope},
    services::{ScoringRequest, ScoringService},
};

/// A query as issued by the presentation layer.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub text: String,
    /// Scope; empty means every document present when the query starts.
    pub document_ids: Vec<String>,
    pub kind: QueryKind,
    pub filters: QueryFilters,
}

/// Candidate documents for one query, captured at call time.
struct ScopeSnapshot {
    scope: Vec<String>,
    candidates: Vec<Arc<Document>>,
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

pub struct QueryEngine {
    store: KnowledgeStore,
    config: QueryConfig,
    default_filters: QueryFilters,
    identity: Arc<dyn IdentityProvider>,
    services: Arc<dyn ScoringService>,
}

impl QueryEngine {
    pub fn new(store: KnowledgeStore, config: &AppConfig) -> Self {
        Self::with_services(
            store,
            QueryConfig::from_app_config(config),
            QueryFilters::from_config(config),
            Arc::new(StaticIdentity::new(config.default_user_id.clone())),
            Arc::new(LexicalScoringService::default()),
        )
    }

    pub fn with_services(
        store: KnowledgeStore,
        config: QueryConfig,
        default_filters: QueryFilters,
        identity: Arc<dyn IdentityProvider>,
        services: Arc<dyn ScoringService>,
    ) -> Self {
        Self {
            store,
            config,
            default_filters,
            identity,
            services,
        }
    }

    /// Filters configured as defaults, for callers that do not supply their own.
    pub fn default_filters(&self) -> QueryFilters {
        self.default_filters.clone()
    }

    /// Runs a text query and returns the id of the new query, which is left
    /// selected. Only empty text is rejected; a scoring failure still yields
    /// a query, in `error` status.
    pub async fn execute_query(
        &self,
        text: &str,
        document_ids: &[String],
        filters: QueryFilters,
    ) -> Result<String, AppError> {
        self.execute(QueryRequest {
            text: text.to_string(),
            document_ids: document_ids.to_vec(),
            kind: QueryKind::Text,
            filters,
        })
        .await
    }

    #[instrument(skip_all, fields(kind = ?request.kind, scope = request.document_ids.len()))]
    pub async fn execute(&self, request: QueryRequest) -> Result<String, AppError> {
        self.store.dispatch(StoreAction::BeginOperation)?;

        let text = request.text.trim();
        if text.is_empty() {
            let err = AppError::Validation("Query text must not be empty".into());
            self.end_operation(Some(format!("Failed to execute query: {err}")));
            return Err(err);
        }

        let filters = request.filters.normalized();
        let started = Instant::now();
        let snapshot = self
            .store
            .read(|state| self.collect_candidates(state, &request.document_ids, &filters));
        let collect_ms = duration_millis(started.elapsed());

        let query = Query::new(
            text.to_string(),
            self.identity.current_user_id(),
            snapshot.scope.clone(),
            request.kind,
            filters.clone(),
        );
        let query_id = query.id.clone();

        if let Err(err) = self
            .store
            .dispatch(StoreAction::AddQuery(query))
            .and_then(|()| self.store.dispatch(StoreAction::StartQuery(query_id.clone())))
        {
            self.end_operation(Some(format!("Failed to execute query: {err}")));
            return Err(err);
        }

        debug!(
            %query_id,
            candidates = snapshot.candidates.len(),
            collect_ms,
            "query candidates collected"
        );

        let scoring_started = Instant::now();
        let scored = self.score(text, request.kind, &snapshot.candidates, &filters).await;
        let scoring_ms = duration_millis(scoring_started.elapsed());

        match scored {
            Ok(mut results) => {
                let candidate_ids: HashSet<&str> = snapshot
                    .candidates
                    .iter()
                    .map(|doc| doc.id.as_str())
                    .collect();
                let returned = results.len();
                retain_in_scope(&mut results, &candidate_ids);
                let ranked =
                    rank_results(results, filters.relevance_threshold, filters.max_results);
                let kept = ranked.len();

                self.finish(vec![
                    StoreAction::CompleteQuery {
                        id: query_id.clone(),
                        results: ranked,
                    },
                    StoreAction::SelectQuery(Some(query_id.clone())),
                    StoreAction::EndOperation { error: None },
                ])?;

                info!(
                    %query_id,
                    returned,
                    kept,
                    scoring_ms,
                    total_ms = duration_millis(started.elapsed()),
                    "query completed"
                );
                Ok(query_id)
            }
            Err(err) => {
                let reason = format!("Failed to execute query: {err}");
                self.finish(vec![
                    StoreAction::FailQuery {
                        id: query_id.clone(),
                        reason: reason.clone(),
                    },
                    StoreAction::SelectQuery(Some(query_id.clone())),
                    StoreAction::EndOperation {
                        error: Some(reason),
                    },
                ])?;

                warn!(%query_id, error = %err, scoring_ms, "query failed");
                if err.is_transport() {
                    Ok(query_id)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Selects the query with `id`, or clears the selection when `id` is
    /// `None` or unknown.
    pub fn select_query(&self, id: Option<&str>) {
        // Unknown ids resolve to an empty selection rather than an error.
        let _ = self
            .store
            .dispatch(StoreAction::SelectQuery(id.map(ToString::to_string)));
    }

    pub fn queries(&self) -> Vec<Arc<Query>> {
        self.store.queries()
    }

    pub fn selected_query(&self) -> Option<Arc<Query>> {
        self.store.selected_query()
    }

    fn collect_candidates(
        &self,
        state: &StoreState,
        document_ids: &[String],
        filters: &QueryFilters,
    ) -> ScopeSnapshot {
        let scope: Vec<String> = if document_ids.is_empty() {
            state.documents().iter().map(|doc| doc.id.clone()).collect()
        } else {
            let mut seen = HashSet::new();
            document_ids
                .iter()
                .filter(|id| seen.insert(id.as_str()))
                .cloned()
                .collect()
        };

        let mut candidates = Vec::with_capacity(scope.len());
        for id in &scope {
            let Some(document) = state.document(id) else {
                warn!(document_id = %id, "query scope references unknown document");
                continue;
            };
            if self.config.tuning.ready_documents_only && document.status != DocumentStatus::Ready
            {
                debug!(
                    document_id = %id,
                    status = document.status.as_str(),
                    "skipping document that is not ready"
                );
                continue;
            }
            if filters.admits(document) {
                candidates.push(Arc::clone(document));
            }
        }

        ScopeSnapshot { scope, candidates }
    }

    async fn score(
        &self,
        text: &str,
        kind: QueryKind,
        candidates: &[Arc<Document>],
        filters: &QueryFilters,
    ) -> Result<Vec<QueryResult>, AppError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let call = self.services.score(ScoringRequest {
            text,
            kind,
            candidates,
            filters,
        });
        match self.config.tuning.scoring_timeout {
            Some(limit) => timeout(limit, call).await.map_err(|_| {
                AppError::Transport(format!("scoring timed out after {}ms", limit.as_millis()))
            })?,
            None => call.await,
        }
    }

    /// Applies the closing transition; if that is rejected the operation is
    /// still ended so the loading flag cannot get stuck.
    fn finish(&self, actions: Vec<StoreAction>) -> Result<(), AppError> {
        self.store.dispatch_all(actions).inspect_err(|err| {
            self.end_operation(Some(format!("Failed to execute query: {err}")));
        })
    }

    fn end_operation(&self, error: Option<String>) {
        let _ = self.store.dispatch(StoreAction::EndOperation { error });
    }
}
