use std::{cmp::Ordering, collections::HashSet};

use common::storage::types::query::QueryResult;
use tracing::warn;

pub const fn clamp_unit(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Drops results that point outside the query scope. Scoring services may only
/// return hits for the documents they were given.
pub fn retain_in_scope(results: &mut Vec<QueryResult>, scope: &HashSet<&str>) {
    let before = results.len();
    results.retain(|result| scope.contains(result.document_id.as_str()));
    let dropped = before.saturating_sub(results.len());
    if dropped > 0 {
        warn!(dropped, "discarded results referencing documents outside the query scope");
    }
}

/// Applies the relevance threshold, orders by score descending and keeps the
/// top `max_results`. The sort is stable, so equal scores keep the order the
/// scoring service returned them in. Non-finite scores are discarded and the
/// rest clamped into `[0, 1]` first.
pub fn rank_results(
    results: Vec<QueryResult>,
    relevance_threshold: f32,
    max_results: usize,
) -> Vec<QueryResult> {
    let mut ranked: Vec<QueryResult> = results
        .into_iter()
        .filter(|result| result.relevance_score.is_finite())
        .map(|mut result| {
            result.relevance_score = clamp_unit(result.relevance_score);
            result
        })
        .filter(|result| result.relevance_score >= relevance_threshold)
        .collect();

    ranked.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(Ordering::Equal)
    });
    ranked.truncate(max_results);
    ranked
}
