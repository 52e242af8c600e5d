//! Text chunking and markdown-table conversion for outgoing replies.

use crate::config::{ChunkMode, TableMode};

/// Largest index `<= max` that sits on a char boundary of `text`.
fn floor_char_boundary(text: &str, max: usize) -> usize {
    if max >= text.len() {
        return text.len();
    }
    let mut index = max;
    while !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Split text into chunks of at most `limit` bytes.
///
/// `Boundary` mode prefers splitting at a newline, then a space, and only
/// cuts mid-word when a single line exceeds the limit. `Hard` mode cuts at
/// fixed offsets, still respecting char boundaries.
#[must_use]
pub fn chunk_text(text: &str, limit: usize, mode: ChunkMode) -> Vec<String> {
    if limit == 0 {
        return Vec::new();
    }
    if text.len() <= limit {
        return vec![text.to_owned()];
    }
    match mode {
        ChunkMode::Boundary => chunk_at_boundaries(text, limit),
        ChunkMode::Hard => chunk_hard(text, limit),
    }
}

fn chunk_hard(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = text;
    while !remaining.is_empty() {
        let mut cut = floor_char_boundary(remaining, limit);
        if cut == 0 {
            // limit smaller than one char: emit the char anyway
            cut = remaining
                .chars()
                .next()
                .map(char::len_utf8)
                .unwrap_or(remaining.len());
        }
        chunks.push(remaining[..cut].to_owned());
        remaining = &remaining[cut..];
    }
    chunks
}

fn chunk_at_boundaries(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= limit {
            chunks.push(remaining.to_owned());
            break;
        }

        let mut window_end = floor_char_boundary(remaining, limit);
        if window_end == 0 {
            window_end = remaining
                .chars()
                .next()
                .map(char::len_utf8)
                .unwrap_or(remaining.len());
        }

        let window = &remaining[..window_end];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&at| at > 0)
            .unwrap_or(window_end);

        chunks.push(remaining[..split_at].to_owned());
        remaining = remaining[split_at..].trim_start_matches('\n');
        if let Some(rest) = remaining.strip_prefix(' ') {
            remaining = rest;
        }
    }

    chunks
}

// ── Markdown table conversion ────────────────────────────────────────────

enum Segment {
    Text(String),
    Table(Vec<String>),
}

/// Convert markdown tables into a representation the non-card rendering
/// paths can show: either a width-aligned plain grid or a per-row list.
/// Non-table lines are untouched.
#[must_use]
pub fn convert_markdown_tables(text: &str, mode: TableMode) -> String {
    let segments = split_table_segments(text);
    if segments.len() == 1
        && let Segment::Text(only) = &segments[0]
    {
        return only.clone();
    }

    let mut out = String::with_capacity(text.len());
    for (i, segment) in segments.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        match segment {
            Segment::Text(lines) => out.push_str(lines),
            Segment::Table(lines) => match mode {
                TableMode::Aligned => out.push_str(&render_table_aligned(lines)),
                TableMode::List => out.push_str(&render_table_list(lines)),
            },
        }
    }
    out
}

fn split_table_segments(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut text_lines: Vec<&str> = Vec::new();
    let mut table_lines: Vec<&str> = Vec::new();

    for line in text.split('\n') {
        if is_table_line(line.trim()) {
            table_lines.push(line);
        } else {
            if !table_lines.is_empty() {
                flush_table(&mut segments, &mut text_lines, &mut table_lines);
            }
            text_lines.push(line);
        }
    }
    if !table_lines.is_empty() {
        flush_table(&mut segments, &mut text_lines, &mut table_lines);
    }
    if !text_lines.is_empty() {
        segments.push(Segment::Text(text_lines.join("\n")));
    }
    if segments.is_empty() {
        segments.push(Segment::Text(String::new()));
    }
    segments
}

fn flush_table<'a>(
    segments: &mut Vec<Segment>,
    text_lines: &mut Vec<&'a str>,
    table_lines: &mut Vec<&'a str>,
) {
    // A table needs a header row plus a separator row; anything else is prose.
    if table_lines.len() >= 2 && is_separator_row(table_lines[1]) {
        if !text_lines.is_empty() {
            segments.push(Segment::Text(text_lines.join("\n")));
            text_lines.clear();
        }
        segments.push(Segment::Table(
            table_lines.iter().map(|s| (*s).to_owned()).collect(),
        ));
    } else {
        text_lines.extend(table_lines.iter());
    }
    table_lines.clear();
}

fn is_table_line(trimmed: &str) -> bool {
    if trimmed.len() <= 1 {
        return false;
    }
    // Require >= 2 pipes unless the row is |-framed, so prose like
    // "use the | operator" stays prose.
    trimmed.starts_with('|') || trimmed.chars().filter(|&c| c == '|').count() >= 2
}

fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    !inner.is_empty()
        && inner.split('|').all(|cell| {
            let cell = cell.trim();
            !cell.is_empty() && cell.chars().all(|c| c == '-' || c == ':')
        })
}

fn parse_cells(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|cell| cell.trim().to_owned()).collect()
}

/// Rows of the table with the separator row (index 1) dropped.
fn parse_rows(lines: &[String]) -> Vec<Vec<String>> {
    lines
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != 1)
        .map(|(_, line)| parse_cells(line))
        .collect()
}

fn render_table_aligned(lines: &[String]) -> String {
    let rows = parse_rows(lines);
    if rows.is_empty() {
        return String::new();
    }

    let col_count = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut widths = vec![0usize; col_count];
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for (row_idx, row) in rows.iter().enumerate() {
        if row_idx > 0 {
            out.push('\n');
        }
        for (col_idx, cell) in row.iter().enumerate() {
            if col_idx > 0 {
                out.push_str(" | ");
            }
            out.push_str(cell);
            let width = widths.get(col_idx).copied().unwrap_or(0);
            for _ in 0..width.saturating_sub(cell.chars().count()) {
                out.push(' ');
            }
        }
        if row_idx == 0 && rows.len() > 1 {
            out.push('\n');
            for (col_idx, &width) in widths.iter().enumerate() {
                if col_idx > 0 {
                    out.push_str("-+-");
                }
                for _ in 0..width {
                    out.push('-');
                }
            }
        }
    }
    out
}

/// Each data row becomes a small block: the first column as a bold title,
/// remaining columns as `Header: value` lines.
fn render_table_list(lines: &[String]) -> String {
    let rows = parse_rows(lines);
    if rows.len() < 2 {
        return rows.first().map(|r| r.join(" | ")).unwrap_or_default();
    }
    let headers = &rows[0];
    let mut out = String::new();
    for (row_idx, row) in rows.iter().skip(1).enumerate() {
        if row_idx > 0 {
            out.push('\n');
        }
        let title = row.first().map(String::as_str).unwrap_or("");
        out.push_str(&format!("**{title}**\n"));
        for (col_idx, cell) in row.iter().enumerate().skip(1) {
            let header = headers.get(col_idx).map(String::as_str).unwrap_or("?");
            out.push_str(&format!("{header}: {cell}\n"));
        }
    }
    if out.ends_with('\n') {
        out.pop();
    }
    out
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(chunk_text("hello", 100, ChunkMode::Boundary), vec!["hello"]);
    }

    #[test]
    fn boundary_chunking_prefers_newlines() {
        let chunks = chunk_text("line1\nline2\nline3", 10, ChunkMode::Boundary);
        assert_eq!(chunks, vec!["line1", "line2", "line3"]);
    }

    #[test]
    fn boundary_chunking_falls_back_to_spaces() {
        let chunks = chunk_text("hello world foo bar", 10, ChunkMode::Boundary);
        assert_eq!(chunks, vec!["hello", "world foo", "bar"]);
    }

    #[test]
    fn boundary_chunking_respects_utf8() {
        let text = format!("{}лz", "a".repeat(4095));
        let chunks = chunk_text(&text, 4096, ChunkMode::Boundary);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4095);
        assert_eq!(chunks[1], "лz");
    }

    #[test]
    fn hard_chunking_cuts_at_fixed_offsets() {
        let chunks = chunk_text("abcdefghij", 4, ChunkMode::Hard);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn hard_chunking_respects_utf8() {
        let chunks = chunk_text("ааа", 3, ChunkMode::Hard);
        // each Cyrillic char is 2 bytes; a 3-byte window fits only one
        assert_eq!(chunks, vec!["а", "а", "а"]);
    }

    #[test]
    fn zero_limit_yields_nothing() {
        assert!(chunk_text("abc", 0, ChunkMode::Boundary).is_empty());
    }

    #[test]
    fn chunks_stay_within_limit() {
        let text = "word ".repeat(5_000);
        for chunk in chunk_text(&text, 4000, ChunkMode::Boundary) {
            assert!(chunk.len() <= 4000);
        }
    }

    #[test]
    fn aligned_table_conversion() {
        let input = "| Name | Age |\n|------|-----|\n| Alice | 30 |\n| Bob | 25 |";
        let out = convert_markdown_tables(input, TableMode::Aligned);
        assert!(out.contains("Name  | Age"), "{out}");
        assert!(out.contains("Alice | 30"), "{out}");
        assert!(!out.contains("|---"), "{out}");
    }

    #[test]
    fn aligned_table_preserves_surrounding_text() {
        let input = "Before\n| A | B |\n|---|---|\n| 1 | 2 |\nAfter";
        let out = convert_markdown_tables(input, TableMode::Aligned);
        assert!(out.starts_with("Before\n"), "{out}");
        assert!(out.ends_with("After"), "{out}");
    }

    #[test]
    fn list_table_conversion() {
        let input = "| Name | Age | City |\n|---|---|---|\n| Alice | 30 | NYC |";
        let out = convert_markdown_tables(input, TableMode::List);
        assert!(out.contains("**Alice**"), "{out}");
        assert!(out.contains("Age: 30"), "{out}");
        assert!(out.contains("City: NYC"), "{out}");
    }

    #[test]
    fn pipes_without_separator_pass_through() {
        let input = "| not | a table |\n| just | pipes |";
        assert_eq!(convert_markdown_tables(input, TableMode::Aligned), input);
    }

    #[test]
    fn single_pipe_prose_untouched() {
        let input = "use the | operator for bitwise OR";
        assert_eq!(convert_markdown_tables(input, TableMode::Aligned), input);
    }

    #[test]
    fn text_without_tables_is_identity() {
        let input = "plain\nmultiline\ntext";
        assert_eq!(convert_markdown_tables(input, TableMode::List), input);
    }
}
