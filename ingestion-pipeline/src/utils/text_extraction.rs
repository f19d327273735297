use common::{
    error::AppError,
    storage::types::document_content::{
        CodeBlockContent, ContentPosition, DocumentContent, DocumentSection, TableContent,
    },
};

const FENCE: &str = "```";

/// Builds structured content from a plain-text upload. Markdown headings open
/// (nested) sections, fenced blocks become code blocks, and `text/csv` bodies
/// additionally yield a table.
pub fn extract_plain_text(bytes: &[u8], mime_type: &str) -> Result<DocumentContent, AppError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|err| AppError::Transport(format!("file is not valid UTF-8: {err}")))?;

    let mut content = DocumentContent {
        text: text.to_string(),
        ..DocumentContent::default()
    };

    if mime_type == "text/csv" {
        content.tables.extend(parse_csv_table(text));
    } else {
        let (sections, code_blocks) = parse_outline(text);
        content.sections = sections;
        content.code_blocks = code_blocks;
    }

    Ok(content)
}

fn heading(line: &str) -> Option<(u32, &str)> {
    let trimmed = line.trim_start();
    let hashes = trimmed.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = trimmed.get(hashes..)?;
    if !rest.starts_with(' ') {
        return None;
    }
    let title = rest.trim();
    if title.is_empty() {
        return None;
    }
    u32::try_from(hashes).ok().map(|level| (level, title))
}

fn attach(
    finished: DocumentSection,
    stack: &mut [DocumentSection],
    roots: &mut Vec<DocumentSection>,
) {
    match stack.last_mut() {
        Some(parent) => parent.subsections.push(finished),
        None => roots.push(finished),
    }
}

fn append_line(target: &mut String, line: &str) {
    if !target.is_empty() {
        target.push('\n');
    }
    target.push_str(line);
}

/// Appends to the innermost open section, or to the preamble before any heading.
fn append_to_open(stack: &mut [DocumentSection], preamble: &mut String, line: &str) {
    match stack.last_mut() {
        Some(section) => append_line(&mut section.content, line),
        None => append_line(preamble, line),
    }
}

fn parse_outline(text: &str) -> (Vec<DocumentSection>, Vec<CodeBlockContent>) {
    let mut roots: Vec<DocumentSection> = Vec::new();
    let mut stack: Vec<DocumentSection> = Vec::new();
    let mut code_blocks = Vec::new();
    let mut open_fence: Option<(String, String)> = None;
    let mut section_seq = 0_usize;
    let mut preamble = String::new();

    for line in text.lines() {
        if let Some((language, mut code)) = open_fence.take() {
            if line.trim_start().starts_with(FENCE) {
                code_blocks.push(CodeBlockContent {
                    id: format!("code-{}", code_blocks.len().saturating_add(1)),
                    language,
                    code,
                    line_numbers: None,
                    position: ContentPosition::new(1, 0.0, 0.0),
                    analysis: None,
                });
            } else {
                append_line(&mut code, line);
                open_fence = Some((language, code));
            }
            append_to_open(&mut stack, &mut preamble, line);
            continue;
        }

        if let Some(language) = line.trim_start().strip_prefix(FENCE) {
            open_fence = Some((language.trim().to_string(), String::new()));
            append_to_open(&mut stack, &mut preamble, line);
            continue;
        }

        if let Some((level, title)) = heading(line) {
            while stack.last().is_some_and(|top| top.level >= level) {
                if let Some(finished) = stack.pop() {
                    attach(finished, &mut stack, &mut roots);
                }
            }
            section_seq = section_seq.saturating_add(1);
            stack.push(DocumentSection::new(
                format!("section-{section_seq}"),
                title.to_string(),
                level,
                String::new(),
            ));
            continue;
        }

        append_to_open(&mut stack, &mut preamble, line);
    }

    // An unterminated fence still counts as a code block.
    if let Some((language, code)) = open_fence {
        code_blocks.push(CodeBlockContent {
            id: format!("code-{}", code_blocks.len().saturating_add(1)),
            language,
            code,
            line_numbers: None,
            position: ContentPosition::new(1, 0.0, 0.0),
            analysis: None,
        });
    }

    while let Some(finished) = stack.pop() {
        attach(finished, &mut stack, &mut roots);
    }

    // Text ahead of the first heading becomes an untitled leading section.
    if !roots.is_empty() && !preamble.trim().is_empty() {
        roots.insert(
            0,
            DocumentSection::new("section-0".into(), String::new(), 1, preamble),
        );
    }

    (roots, code_blocks)
}

fn split_row(line: &str) -> Vec<String> {
    line.split(',').map(|cell| cell.trim().to_string()).collect()
}

fn parse_csv_table(text: &str) -> Option<TableContent> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());
    let headers = split_row(lines.next()?);
    let rows = lines.map(split_row).collect();

    Some(TableContent {
        id: "table-1".into(),
        headers,
        rows,
        caption: None,
        position: ContentPosition::new(1, 0.0, 0.0),
        analysis: None,
    })
}
