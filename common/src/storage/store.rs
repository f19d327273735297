use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::error::AppError;

use super::{
    state::{StoreAction, StoreState, StoreStats},
    types::{document::Document, query::Query},
};

/// Handle to the in-memory knowledge store shared by the repository, the
/// ingestion worker and the query engine.
///
/// Cloning the handle is cheap; all clones observe and mutate the same state.
/// Each dispatched action is applied in a single step, so subscribers only
/// ever see fully applied transitions.
#[derive(Clone)]
pub struct KnowledgeStore {
    state: Arc<watch::Sender<StoreState>>,
}

impl Default for KnowledgeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KnowledgeStore {
    pub fn new() -> Self {
        Self::with_state(StoreState::default())
    }

    pub fn with_state(state: StoreState) -> Self {
        let (sender, _) = watch::channel(state);
        Self {
            state: Arc::new(sender),
        }
    }

    /// Applies an action. Subscribers are notified only when it succeeds; a
    /// rejected action leaves the state untouched.
    pub fn dispatch(&self, action: StoreAction) -> Result<(), AppError> {
        let label = action.label();
        let mut outcome = Ok(());
        self.state.send_if_modified(|state| match state.apply(action) {
            Ok(()) => true,
            Err(err) => {
                outcome = Err(err);
                false
            }
        });

        if let Err(err) = &outcome {
            debug!(action = label, error = %err, "Store action rejected");
        }
        outcome
    }

    /// Applies several actions as one all-or-nothing transition.
    pub fn dispatch_all(&self, actions: Vec<StoreAction>) -> Result<(), AppError> {
        self.dispatch(StoreAction::Batch(actions))
    }

    pub fn read<R>(&self, f: impl FnOnce(&StoreState) -> R) -> R {
        f(&self.state.borrow())
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.state.subscribe()
    }

    /// Resolves with the first snapshot, current or future, that satisfies
    /// `predicate`.
    pub async fn wait_until(
        &self,
        predicate: impl FnMut(&StoreState) -> bool,
    ) -> Result<StoreState, AppError> {
        let mut receiver = self.subscribe();
        let snapshot = receiver
            .wait_for(predicate)
            .await
            .map_err(|err| AppError::InternalError(format!("store closed: {err}")))?;
        Ok(StoreState::clone(&snapshot))
    }

    pub fn documents(&self) -> Vec<Arc<Document>> {
        self.read(|state| state.documents().to_vec())
    }

    pub fn document(&self, id: &str) -> Option<Arc<Document>> {
        self.read(|state| state.document(id).cloned())
    }

    pub fn selected_document(&self) -> Option<Arc<Document>> {
        self.read(|state| state.selected_document().cloned())
    }

    pub fn queries(&self) -> Vec<Arc<Query>> {
        self.read(|state| state.queries().to_vec())
    }

    pub fn query(&self, id: &str) -> Option<Arc<Query>> {
        self.read(|state| state.query(id).cloned())
    }

    pub fn selected_query(&self) -> Option<Arc<Query>> {
        self.read(|state| state.selected_query().cloned())
    }

    pub fn loading(&self) -> bool {
        self.read(StoreState::loading)
    }

    pub fn error(&self) -> Option<String> {
        self.read(|state| state.error().map(ToString::to_string))
    }

    pub fn stats(&self) -> StoreStats {
        self.read(StoreState::stats)
    }

    /// Resets the error slot without touching anything else.
    pub fn clear_error(&self) {
        // ClearError cannot be rejected.
        let _ = self.dispatch(StoreAction::ClearError);
    }
}
