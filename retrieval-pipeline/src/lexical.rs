use std::collections::BTreeSet;

use async_trait::async_trait;
use common::{
    error::AppError,
    storage::types::{
        document::Document,
        document_content::ContentPosition,
        query::{QueryKind, QueryResult, ResultCoordinates, ResultKind, ResultPosition},
    },
};
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use crate::{
    scoring::clamp_unit,
    services::{ScoringRequest, ScoringService},
};

const MIN_TERM_CHARS: usize = 3;

/// Baseline in-process scorer: ranks every content unit of the candidate
/// documents by the share of query terms it contains.
#[derive(Debug, Clone)]
pub struct LexicalScoringService {
    /// Added to units whose kind matches what the query asks for.
    pub kind_boost: f32,
    /// Longest snippet copied into a result's `content`.
    pub snippet_chars: usize,
}

impl Default for LexicalScoringService {
    fn default() -> Self {
        Self {
            kind_boost: 0.1,
            snippet_chars: 280,
        }
    }
}

struct ContentUnit {
    text: String,
    context: String,
    position: ResultPosition,
    kind: ResultKind,
}

/// Lowercases, strips diacritics and splits on anything not alphanumeric.
pub fn normalize_terms(text: &str) -> BTreeSet<String> {
    let folded: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect();

    folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|term| term.chars().count() >= MIN_TERM_CHARS)
        .map(ToString::to_string)
        .collect()
}

/// Share of `terms` present in `haystack`, in `[0, 1]`.
pub fn lexical_overlap_score(terms: &BTreeSet<String>, haystack: &str) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let present = normalize_terms(haystack);
    let matches = terms.iter().filter(|term| present.contains(*term)).count();
    #[allow(clippy::cast_precision_loss)]
    let share = matches as f32 / terms.len() as f32;
    share
}

fn preferred_kinds(kind: QueryKind) -> &'static [ResultKind] {
    match kind {
        QueryKind::Text => &[ResultKind::Text],
        QueryKind::Multimodal => &[ResultKind::Image, ResultKind::Chart],
        QueryKind::Code => &[ResultKind::Code],
        QueryKind::Data => &[ResultKind::Table, ResultKind::Chart],
    }
}

fn coordinates(position: ContentPosition) -> Option<ResultCoordinates> {
    Some(ResultCoordinates {
        x: position.x,
        y: position.y,
        width: 0.0,
        height: 0.0,
    })
}

fn join_present(parts: &[Option<&str>]) -> String {
    parts
        .iter()
        .flatten()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn content_units(document: &Document) -> Vec<ContentUnit> {
    let content = &document.content;
    let mut units = Vec::new();

    if content.sections.is_empty() {
        let paragraphs = content
            .text
            .split("\n\n")
            .map(str::trim)
            .filter(|p| !p.is_empty());
        for (idx, paragraph) in paragraphs.enumerate() {
            units.push(ContentUnit {
                text: paragraph.to_string(),
                context: document.title.clone(),
                position: ResultPosition {
                    page: 1,
                    section: None,
                    paragraph: u32::try_from(idx.saturating_add(1)).ok(),
                    coordinates: None,
                },
                kind: ResultKind::Text,
            });
        }
    } else {
        for section in content.sections_flat() {
            if section.content.trim().is_empty() {
                continue;
            }
            let title = (!section.title.is_empty()).then(|| section.title.clone());
            units.push(ContentUnit {
                text: section.content.clone(),
                context: title.clone().unwrap_or_else(|| document.title.clone()),
                position: ResultPosition {
                    page: section.start_page,
                    section: title,
                    paragraph: None,
                    coordinates: None,
                },
                kind: ResultKind::Text,
            });
        }
    }

    for table in &content.tables {
        units.push(ContentUnit {
            text: join_present(&[
                Some(table.to_text().as_str()),
                table.analysis.as_deref(),
            ]),
            context: table
                .caption
                .clone()
                .unwrap_or_else(|| document.title.clone()),
            position: ResultPosition {
                page: table.position.page,
                coordinates: coordinates(table.position),
                ..ResultPosition::default()
            },
            kind: ResultKind::Table,
        });
    }

    for image in &content.images {
        units.push(ContentUnit {
            text: join_present(&[
                image.caption.as_deref(),
                Some(image.alt.as_str()),
                image.analysis.as_deref(),
            ]),
            context: image
                .caption
                .clone()
                .unwrap_or_else(|| image.alt.clone()),
            position: ResultPosition {
                page: image.position.page,
                coordinates: coordinates(image.position),
                ..ResultPosition::default()
            },
            kind: ResultKind::Image,
        });
    }

    for chart in &content.charts {
        units.push(ContentUnit {
            text: join_present(&[chart.title.as_deref(), chart.analysis.as_deref()]),
            context: chart
                .title
                .clone()
                .unwrap_or_else(|| document.title.clone()),
            position: ResultPosition {
                page: chart.position.page,
                coordinates: coordinates(chart.position),
                ..ResultPosition::default()
            },
            kind: ResultKind::Chart,
        });
    }

    for block in &content.code_blocks {
        units.push(ContentUnit {
            text: join_present(&[Some(block.code.as_str()), block.analysis.as_deref()]),
            context: format!("{} code block", block.language),
            position: ResultPosition {
                page: block.position.page,
                coordinates: coordinates(block.position),
                ..ResultPosition::default()
            },
            kind: ResultKind::Code,
        });
    }

    units
}

impl LexicalScoringService {
    fn snippet(&self, text: &str) -> String {
        let trimmed = text.trim();
        if trimmed.chars().count() <= self.snippet_chars {
            return trimmed.to_string();
        }
        let mut snippet: String = trimmed.chars().take(self.snippet_chars).collect();
        snippet.push('…');
        snippet
    }

    fn score_document(
        &self,
        document: &Document,
        terms: &BTreeSet<String>,
        preferred: &[ResultKind],
    ) -> Vec<QueryResult> {
        content_units(document)
            .into_iter()
            .filter_map(|unit| {
                let overlap = lexical_overlap_score(terms, &unit.text);
                if overlap <= 0.0 {
                    return None;
                }
                let boost = if preferred.contains(&unit.kind) {
                    self.kind_boost
                } else {
                    0.0
                };
                Some(QueryResult::new(
                    document.id.clone(),
                    clamp_unit(overlap + boost),
                    self.snippet(&unit.text),
                    unit.context,
                    unit.position,
                    unit.kind,
                ))
            })
            .collect()
    }
}

#[async_trait]
impl ScoringService for LexicalScoringService {
    async fn score(&self, request: ScoringRequest<'_>) -> Result<Vec<QueryResult>, AppError> {
        let terms = normalize_terms(request.text);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let preferred = preferred_kinds(request.kind);

        Ok(request
            .candidates
            .iter()
            .flat_map(|document| self.score_document(document, &terms, preferred))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use common::storage::types::{
        document_content::{CodeBlockContent, DocumentContent, DocumentSection, TableContent},
        query::QueryFilters,
    };

    use super::*;

    fn report() -> Arc<Document> {
        let mut intro = DocumentSection::new(
            "s1".into(),
            "Introduction".into(),
            1,
            "Key findings on revenue growth.".into(),
        );
        intro.subsections.push(DocumentSection::new(
            "s2".into(),
            "Méthodologie".into(),
            2,
            "Survey of café owners.".into(),
        ));
        let content = DocumentContent {
            text: "Key findings on revenue growth. Survey of café owners.".into(),
            sections: vec![intro],
            tables: vec![TableContent {
                id: "t1".into(),
                headers: vec!["Region".into(), "Revenue".into()],
                rows: vec![vec!["North".into(), "10".into()]],
                caption: Some("Revenue by region".into()),
                position: ContentPosition::new(3, 10.0, 20.0),
                analysis: None,
            }],
            code_blocks: vec![CodeBlockContent {
                id: "c1".into(),
                language: "sql".into(),
                code: "SELECT revenue FROM sales".into(),
                line_numbers: None,
                position: ContentPosition::new(4, 0.0, 0.0),
                analysis: None,
            }],
            ..DocumentContent::default()
        };
        Arc::new(Document::ready(
            "1".into(),
            "Report".into(),
            "report.pdf".into(),
            "application/pdf".into(),
            content,
        ))
    }

    async fn score(text: &str, kind: QueryKind, candidates: &[Arc<Document>]) -> Vec<QueryResult> {
        let filters = QueryFilters::default();
        LexicalScoringService::default()
            .score(ScoringRequest {
                text,
                kind,
                candidates,
                filters: &filters,
            })
            .await
            .expect("lexical scoring never fails")
    }

    #[test]
    fn normalize_terms_folds_case_and_diacritics() {
        let terms = normalize_terms("Café, RÉSUMÉ and an ox");
        assert_eq!(
            terms.into_iter().collect::<Vec<_>>(),
            vec!["and", "cafe", "resume"]
        );
    }

    #[tokio::test]
    async fn scores_sections_tables_and_code() {
        let results = score("revenue", QueryKind::Text, &[report()]).await;

        let kinds: Vec<ResultKind> = results.iter().map(|r| r.kind).collect();
        assert!(kinds.contains(&ResultKind::Text));
        assert!(kinds.contains(&ResultKind::Table));
        assert!(kinds.contains(&ResultKind::Code));
        assert!(results.iter().all(|r| r.document_id == "1"));

        let table = results
            .iter()
            .find(|r| r.kind == ResultKind::Table)
            .expect("table hit");
        assert_eq!(table.position.page, 3);
        assert_eq!(table.context, "Revenue by region");
        assert!(table.position.coordinates.is_some());

        let section = results
            .iter()
            .find(|r| r.kind == ResultKind::Text)
            .expect("section hit");
        assert_eq!(section.position.section.as_deref(), Some("Introduction"));
    }

    #[tokio::test]
    async fn nested_sections_match_without_accents() {
        let results = score("cafe survey", QueryKind::Text, &[report()]).await;
        let hit = results.first().expect("hit");
        assert_eq!(hit.context, "Méthodologie");
        assert!((hit.relevance_score - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn query_kind_boosts_matching_units() {
        let results = score("revenue totals", QueryKind::Code, &[report()]).await;
        let code = results
            .iter()
            .find(|r| r.kind == ResultKind::Code)
            .expect("code hit");
        let text = results
            .iter()
            .find(|r| r.kind == ResultKind::Text)
            .expect("text hit");
        assert!(code.relevance_score > text.relevance_score);
    }

    #[tokio::test]
    async fn short_or_unknown_terms_yield_nothing() {
        assert!(score("an of", QueryKind::Text, &[report()]).await.is_empty());
        assert!(score("zebra", QueryKind::Text, &[report()]).await.is_empty());
    }

    #[tokio::test]
    async fn untitled_leading_section_is_scored_under_document_title() {
        let document = Arc::new(Document::ready(
            "3".into(),
            "Summary".into(),
            "summary.txt".into(),
            "text/plain".into(),
            DocumentContent {
                text: "Revenue grew 20%.\n\n# Appendix\nstaff list".into(),
                sections: vec![
                    DocumentSection::new(
                        "section-0".into(),
                        String::new(),
                        1,
                        "Revenue grew 20%.\n".into(),
                    ),
                    DocumentSection::new(
                        "section-1".into(),
                        "Appendix".into(),
                        1,
                        "staff list".into(),
                    ),
                ],
                ..DocumentContent::default()
            },
        ));

        let results = score("revenue", QueryKind::Text, &[document]).await;

        let hit = results.first().expect("preamble hit");
        assert_eq!(hit.context, "Summary");
        assert_eq!(hit.position.section, None);
    }

    #[tokio::test]
    async fn plain_text_documents_score_by_paragraph() {
        let document = Arc::new(Document::ready(
            "2".into(),
            "Notes".into(),
            "notes.txt".into(),
            "text/plain".into(),
            DocumentContent {
                text: "Opening remarks.\n\nBudget findings for Q3.".into(),
                ..DocumentContent::default()
            },
        ));

        let results = score("findings", QueryKind::Text, &[document]).await;

        let hit = results.first().expect("paragraph hit");
        assert_eq!(hit.position.paragraph, Some(2));
        assert_eq!(hit.context, "Notes");
        assert_eq!(hit.content, "Budget findings for Q3.");
    }
}
