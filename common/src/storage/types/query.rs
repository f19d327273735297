use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use state_machines::state_machine;

use crate::{error::AppError, utils::config::AppConfig};

use super::{document::Document, new_id, StoredObject};

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Error,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Pending => "pending",
            QueryStatus::Processing => "processing",
            QueryStatus::Completed => "completed",
            QueryStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryStatus::Completed | QueryStatus::Error)
    }
}

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    #[default]
    Text,
    Multimodal,
    Code,
    Data,
}

#[derive(Debug, Clone, Copy)]
pub enum QueryTransition {
    Start,
    Complete,
    Fail,
}

impl QueryTransition {
    fn as_str(&self) -> &'static str {
        match self {
            QueryTransition::Start => "start",
            QueryTransition::Complete => "complete",
            QueryTransition::Fail => "fail",
        }
    }
}

mod lifecycle {
    use super::state_machine;

    state_machine! {
        name: QueryLifecycleMachine,
        initial: Pending,
        states: [Pending, Processing, Completed, Failed],
        events {
            start {
                transition: { from: Pending, to: Processing }
            }
            complete {
                transition: { from: Processing, to: Completed }
            }
            fail {
                transition: { from: Pending, to: Failed }
                transition: { from: Processing, to: Failed }
            }
        }
    }

    pub(super) fn pending() -> QueryLifecycleMachine<(), Pending> {
        QueryLifecycleMachine::new(())
    }

    pub(super) fn processing() -> QueryLifecycleMachine<(), Processing> {
        pending()
            .start()
            .expect("start transition from Pending should exist")
    }
}

fn invalid_transition(state: QueryStatus, event: QueryTransition) -> AppError {
    AppError::Validation(format!(
        "Invalid query transition: {} -> {}",
        state.as_str(),
        event.as_str()
    ))
}

pub fn compute_next_status(
    state: QueryStatus,
    event: QueryTransition,
) -> Result<QueryStatus, AppError> {
    use lifecycle::{pending, processing};
    match (state, event) {
        (QueryStatus::Pending, QueryTransition::Start) => pending()
            .start()
            .map(|_| QueryStatus::Processing)
            .map_err(|_| invalid_transition(state, event)),
        (QueryStatus::Processing, QueryTransition::Complete) => processing()
            .complete()
            .map(|_| QueryStatus::Completed)
            .map_err(|_| invalid_transition(state, event)),
        (QueryStatus::Pending, QueryTransition::Fail) => pending()
            .fail()
            .map(|_| QueryStatus::Error)
            .map_err(|_| invalid_transition(state, event)),
        (QueryStatus::Processing, QueryTransition::Fail) => processing()
            .fail()
            .map(|_| QueryStatus::Error)
            .map_err(|_| invalid_transition(state, event)),
        _ => Err(invalid_transition(state, event)),
    }
}

/// Inclusive upload-date window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryFilters {
    #[serde(default)]
    pub date_range: Option<DateRange>,
    #[serde(default)]
    pub document_types: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub authors: Option<Vec<String>>,
    pub relevance_threshold: f32,
    pub max_results: usize,
}

impl Default for QueryFilters {
    fn default() -> Self {
        Self {
            date_range: None,
            document_types: None,
            tags: None,
            authors: None,
            relevance_threshold: 0.5,
            max_results: 10,
        }
    }
}

impl QueryFilters {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            relevance_threshold: config.default_relevance_threshold,
            max_results: config.default_max_results,
            ..Self::default()
        }
        .normalized()
    }

    /// Clamps the threshold into `[0, 1]`; a non-finite threshold admits everything.
    pub fn normalized(mut self) -> Self {
        self.relevance_threshold = if self.relevance_threshold.is_finite() {
            self.relevance_threshold.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    /// Whether a candidate document passes the metadata filters. Empty filter
    /// lists are treated as absent.
    pub fn admits(&self, document: &Document) -> bool {
        if let Some(range) = &self.date_range {
            if !range.contains(document.upload_date) {
                return false;
            }
        }

        if let Some(types) = self.document_types.as_ref().filter(|t| !t.is_empty()) {
            let file_type = document.file_type.to_ascii_lowercase();
            if !types
                .iter()
                .any(|wanted| file_type.contains(&wanted.to_ascii_lowercase()))
            {
                return false;
            }
        }

        if let Some(tags) = self.tags.as_ref().filter(|t| !t.is_empty()) {
            if !tags.iter().any(|tag| document.tags.contains(tag)) {
                return false;
            }
        }

        if let Some(authors) = self.authors.as_ref().filter(|a| !a.is_empty()) {
            let Some(author) = document.metadata.author.as_deref() else {
                return false;
            };
            if !authors
                .iter()
                .any(|wanted| wanted.eq_ignore_ascii_case(author))
            {
                return false;
            }
        }

        true
    }
}

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    #[default]
    Text,
    Image,
    Table,
    Chart,
    Code,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ResultCoordinates {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ResultPosition {
    pub page: u32,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub paragraph: Option<u32>,
    #[serde(default)]
    pub coordinates: Option<ResultCoordinates>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub id: String,
    pub document_id: String,
    pub relevance_score: f32,
    pub content: String,
    pub context: String,
    pub position: ResultPosition,
    #[serde(rename = "type")]
    pub kind: ResultKind,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl StoredObject for QueryResult {
    fn collection_name() -> &'static str {
        "query_result"
    }

    fn get_id(&self) -> &str {
        &self.id
    }
}

impl QueryResult {
    pub fn new(
        document_id: String,
        relevance_score: f32,
        content: String,
        context: String,
        position: ResultPosition,
        kind: ResultKind,
    ) -> Self {
        Self {
            id: new_id(),
            document_id,
            relevance_score,
            content,
            context,
            position,
            kind,
            metadata: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Query {
    pub id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub documents: Vec<String>,
    #[serde(rename = "type")]
    pub kind: QueryKind,
    pub filters: QueryFilters,
    pub status: QueryStatus,
    #[serde(default)]
    pub results: Vec<QueryResult>,
}

impl StoredObject for Query {
    fn collection_name() -> &'static str {
        "query"
    }

    fn get_id(&self) -> &str {
        &self.id
    }
}

impl Query {
    pub fn new(
        text: String,
        user_id: String,
        documents: Vec<String>,
        kind: QueryKind,
        filters: QueryFilters,
    ) -> Self {
        Self {
            id: new_id(),
            text,
            timestamp: Utc::now(),
            user_id,
            documents,
            kind,
            filters,
            status: QueryStatus::Pending,
            results: Vec::new(),
        }
    }

    pub fn transition(&mut self, event: QueryTransition) -> Result<(), AppError> {
        self.status = compute_next_status(self.status, event)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Duration;

    use super::*;
    use crate::storage::types::document_content::DocumentContent;

    fn document(file_type: &str, tags: &[&str]) -> Document {
        Document::ready(
            "1".into(),
            "Financial Analysis Report".into(),
            "q4-financial-report.xlsx".into(),
            file_type.into(),
            DocumentContent::default(),
        )
        .with_tags(tags.iter().copied())
    }

    #[test]
    fn query_lifecycle_follows_pending_processing_terminal() {
        let mut query = Query::new(
            "findings".into(),
            "user-1".into(),
            vec!["1".into()],
            QueryKind::Text,
            QueryFilters::default(),
        );
        assert_eq!(query.status, QueryStatus::Pending);

        assert!(query.transition(QueryTransition::Complete).is_err());
        query.transition(QueryTransition::Start).expect("start");
        assert_eq!(query.status, QueryStatus::Processing);
        query.transition(QueryTransition::Complete).expect("complete");
        assert_eq!(query.status, QueryStatus::Completed);

        let err = query
            .transition(QueryTransition::Fail)
            .expect_err("completed is terminal");
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(query.status, QueryStatus::Completed);
    }

    #[test]
    fn pending_query_can_fail_directly() {
        assert_eq!(
            compute_next_status(QueryStatus::Pending, QueryTransition::Fail).expect("fail"),
            QueryStatus::Error
        );
        assert!(compute_next_status(QueryStatus::Error, QueryTransition::Start).is_err());
    }

    #[test]
    fn filters_narrow_by_type_tag_author_and_date() {
        let mut doc = document("excel", &["finance", "quarterly"]);
        doc.metadata.author = Some("Finance Team".into());

        assert!(QueryFilters::default().admits(&doc));

        let by_type = QueryFilters {
            document_types: Some(vec!["EXCEL".into()]),
            ..QueryFilters::default()
        };
        assert!(by_type.admits(&doc));

        let wrong_type = QueryFilters {
            document_types: Some(vec!["pdf".into()]),
            ..QueryFilters::default()
        };
        assert!(!wrong_type.admits(&doc));

        let by_tag = QueryFilters {
            tags: Some(vec!["ai".into(), "finance".into()]),
            ..QueryFilters::default()
        };
        assert!(by_tag.admits(&doc));

        let by_author = QueryFilters {
            authors: Some(vec!["finance team".into()]),
            ..QueryFilters::default()
        };
        assert!(by_author.admits(&doc));

        let future = QueryFilters {
            date_range: Some(DateRange {
                start: doc.upload_date + Duration::days(1),
                end: doc.upload_date + Duration::days(2),
            }),
            ..QueryFilters::default()
        };
        assert!(!future.admits(&doc));

        let empty_lists = QueryFilters {
            tags: Some(Vec::new()),
            document_types: Some(Vec::new()),
            ..QueryFilters::default()
        };
        assert!(empty_lists.admits(&doc));
        assert_eq!(doc.tags, BTreeSet::from(["finance".to_string(), "quarterly".to_string()]));
    }

    #[test]
    fn normalized_clamps_threshold() {
        let high = QueryFilters {
            relevance_threshold: 1.7,
            ..QueryFilters::default()
        }
        .normalized();
        assert!((high.relevance_threshold - 1.0).abs() < f32::EPSILON);

        let nan = QueryFilters {
            relevance_threshold: f32::NAN,
            ..QueryFilters::default()
        }
        .normalized();
        assert!(nan.relevance_threshold.abs() < f32::EPSILON);
    }
}
