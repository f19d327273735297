use serde::{Deserialize, Serialize};

/// Page plus coordinates of an extracted content unit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct ContentPosition {
    pub page: u32,
    pub x: f32,
    pub y: f32,
}

impl ContentPosition {
    pub const fn new(page: u32, x: f32, y: f32) -> Self {
        Self { page, x, y }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageContent {
    pub id: String,
    pub url: String,
    pub alt: String,
    #[serde(default)]
    pub caption: Option<String>,
    pub position: ContentPosition,
    #[serde(default)]
    pub analysis: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableContent {
    pub id: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    #[serde(default)]
    pub caption: Option<String>,
    pub position: ContentPosition,
    #[serde(default)]
    pub analysis: Option<String>,
}

impl TableContent {
    /// Flattens headers and cells into a single searchable line per row.
    pub fn to_text(&self) -> String {
        let mut lines = Vec::with_capacity(self.rows.len().saturating_add(1));
        lines.push(self.headers.join(" | "));
        lines.extend(self.rows.iter().map(|row| row.join(" | ")));
        lines.join("\n")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Bar,
    Pie,
    Scatter,
    #[default]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChartContent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub data: serde_json::Value,
    #[serde(default)]
    pub title: Option<String>,
    pub position: ContentPosition,
    #[serde(default)]
    pub analysis: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CodeBlockContent {
    pub id: String,
    pub language: String,
    pub code: String,
    #[serde(default)]
    pub line_numbers: Option<bool>,
    pub position: ContentPosition,
    #[serde(default)]
    pub analysis: Option<String>,
}

/// A node of the document outline. Children are owned, so the tree is acyclic
/// by construction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentSection {
    pub id: String,
    pub title: String,
    pub level: u32,
    pub content: String,
    pub start_page: u32,
    pub end_page: u32,
    #[serde(default)]
    pub subsections: Vec<DocumentSection>,
}

impl DocumentSection {
    pub fn new(id: String, title: String, level: u32, content: String) -> Self {
        Self {
            id,
            title,
            level,
            content,
            start_page: 1,
            end_page: 1,
            subsections: Vec::new(),
        }
    }

    /// Depth-first, pre-order traversal of this node and its descendants.
    pub fn walk(&self) -> SectionWalk<'_> {
        SectionWalk { stack: vec![self] }
    }
}

pub struct SectionWalk<'a> {
    stack: Vec<&'a DocumentSection>,
}

impl<'a> Iterator for SectionWalk<'a> {
    type Item = &'a DocumentSection;

    fn next(&mut self) -> Option<Self::Item> {
        let section = self.stack.pop()?;
        self.stack.extend(section.subsections.iter().rev());
        Some(section)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DocumentContent {
    pub text: String,
    #[serde(default)]
    pub images: Vec<ImageContent>,
    #[serde(default)]
    pub tables: Vec<TableContent>,
    #[serde(default)]
    pub charts: Vec<ChartContent>,
    #[serde(default)]
    pub code_blocks: Vec<CodeBlockContent>,
    #[serde(default)]
    pub sections: Vec<DocumentSection>,
}

impl DocumentContent {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
            && self.images.is_empty()
            && self.tables.is_empty()
            && self.charts.is_empty()
            && self.code_blocks.is_empty()
            && self.sections.is_empty()
    }

    /// All sections of the outline, depth first.
    pub fn sections_flat(&self) -> impl Iterator<Item = &DocumentSection> {
        self.sections.iter().flat_map(DocumentSection::walk)
    }

    pub fn section_count(&self) -> usize {
        self.sections_flat().count()
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    /// Highest page referenced by any positioned unit or section.
    pub fn page_count(&self) -> u32 {
        let positioned = self
            .images
            .iter()
            .map(|i| i.position.page)
            .chain(self.tables.iter().map(|t| t.position.page))
            .chain(self.charts.iter().map(|c| c.position.page))
            .chain(self.code_blocks.iter().map(|c| c.position.page));
        let sections = self.sections_flat().map(|s| s.end_page.max(s.start_page));

        positioned.chain(sections).max().unwrap_or(0)
    }
}
