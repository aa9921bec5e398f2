//! Deterministic Markdown synthesis.
//!
//! Rendering is a pure function of `(tree, config)`: the same tree and
//! profile always produce byte-identical output, and re-rendering a
//! structurally equivalent re-parse of the output changes nothing.

use std::collections::HashMap;

use unicode_normalization::UnicodeNormalization;

use crate::config::{ConfigProfile, LineEnding};
use crate::error::Result;
use crate::model::{DocumentBlock, DocumentTree};

/// Render a document tree to Markdown under the given profile.
pub fn render(tree: &DocumentTree, config: &ConfigProfile) -> Result<String> {
    MarkdownSynthesizer::new(config).render(tree)
}

/// Walks the document tree and emits Markdown text.
pub struct MarkdownSynthesizer<'a> {
    config: &'a ConfigProfile,
}

impl<'a> MarkdownSynthesizer<'a> {
    /// Create a synthesizer over a resolved profile.
    pub fn new(config: &'a ConfigProfile) -> Self {
        Self { config }
    }

    /// Render the tree. The output ends with exactly one newline when
    /// `output.add_final_newline` is set, and uses the configured line
    /// ending throughout.
    pub fn render(&self, tree: &DocumentTree) -> Result<String> {
        let slugs = self.heading_slugs(tree);

        let mut parts: Vec<(BlockKind, String)> = Vec::new();

        if self.config.output.include_metadata {
            parts.push((BlockKind::Preamble, tree.metadata.to_yaml_frontmatter()));
        }

        if self.config.markdown.heading.add_toc && !slugs.is_empty() {
            parts.push((BlockKind::Preamble, self.render_toc(tree, &slugs)));
        }

        let mut slug_iter = slugs.iter();
        for block in &tree.blocks {
            let kind = BlockKind::of(block);
            let text = match block {
                DocumentBlock::Heading { level, text, .. } => {
                    let slug = slug_iter.next().map(String::as_str);
                    self.render_heading(*level, text, slug)
                }
                DocumentBlock::Paragraph { text } => self.render_paragraph(text),
                DocumentBlock::ListItem {
                    text,
                    ordered,
                    nesting_depth,
                    index_in_list,
                } => self.render_list_item(text, *ordered, *nesting_depth, *index_in_list),
                DocumentBlock::Table { rows } => self.render_table(rows),
                DocumentBlock::ImageRef { alt_text, path, .. } => {
                    format!("![{}]({})", escape_markdown(alt_text), path)
                }
            };
            if !text.is_empty() {
                parts.push((kind, text));
            }
        }

        Ok(self.join_parts(parts))
    }

    /// Join rendered blocks: exactly one blank line between blocks, except
    /// none between consecutive list items of the same list.
    fn join_parts(&self, parts: Vec<(BlockKind, String)>) -> String {
        let mut output = String::new();
        let mut prev_kind: Option<BlockKind> = None;

        for (kind, text) in parts {
            if let Some(prev) = prev_kind {
                if prev == BlockKind::ListItem && kind == BlockKind::ListItem {
                    output.push('\n');
                } else {
                    output.push_str("\n\n");
                }
            }
            output.push_str(&text);
            prev_kind = Some(kind);
        }

        self.postprocess(output)
    }

    /// Collapse runaway blank lines, settle the trailing newline, and apply
    /// the configured line ending.
    fn postprocess(&self, text: String) -> String {
        let mut text = collapse_blank_lines(&text);

        while text.ends_with('\n') {
            text.pop();
        }
        if self.config.output.add_final_newline && !text.is_empty() {
            text.push('\n');
        }

        match self.config.output.line_ending {
            LineEnding::Lf => text,
            LineEnding::Crlf => text.replace('\n', "\r\n"),
        }
    }

    fn render_heading(&self, level: u8, text: &str, slug: Option<&str>) -> String {
        let level = level.min(self.config.markdown.heading.max_level).max(1);
        let mut out = "#".repeat(level as usize);
        out.push(' ');
        out.push_str(&escape_markdown(&normalize(text)));
        if self.config.markdown.heading.add_toc {
            if let Some(slug) = slug {
                out.push_str(&format!(" {{#{}}}", slug));
            }
        }
        out
    }

    fn render_paragraph(&self, text: &str) -> String {
        let escaped = escape_markdown(&normalize(text));
        let width = self.config.markdown.paragraph.max_line_length;
        if width > 0 {
            wrap_text(&escaped, width)
        } else {
            escaped
        }
    }

    fn render_list_item(
        &self,
        text: &str,
        ordered: bool,
        nesting_depth: u8,
        index_in_list: Option<u32>,
    ) -> String {
        let indent = " ".repeat(nesting_depth as usize * self.config.markdown.list.indent_size);
        let marker = if ordered {
            format!("{}.", index_in_list.unwrap_or(1))
        } else {
            self.config.markdown.list.bullet_marker.to_string()
        };
        format!(
            "{}{} {}",
            indent,
            marker,
            escape_markdown(&normalize(text))
        )
    }

    fn render_table(&self, rows: &[Vec<String>]) -> String {
        if rows.is_empty() {
            return String::new();
        }

        let columns = rows.iter().map(|r| r.len()).max().unwrap_or(0);
        if columns == 0 {
            return String::new();
        }

        // Escaped cell text, short rows padded with empty cells.
        let cells: Vec<Vec<String>> = rows
            .iter()
            .map(|row| {
                (0..columns)
                    .map(|i| {
                        row.get(i)
                            .map(|c| escape_table_cell(&normalize(c)))
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();

        let widths: Vec<usize> = if self.config.markdown.table.align_columns {
            (0..columns)
                .map(|i| {
                    cells
                        .iter()
                        .map(|row| row[i].chars().count())
                        .max()
                        .unwrap_or(0)
                        .max(3)
                })
                .collect()
        } else {
            vec![3; columns]
        };

        let mut lines = Vec::with_capacity(cells.len() + 1);
        for (row_idx, row) in cells.iter().enumerate() {
            let mut line = String::from("|");
            for (i, cell) in row.iter().enumerate() {
                if self.config.markdown.table.align_columns {
                    line.push_str(&format!(" {:<width$} |", cell, width = widths[i]));
                } else {
                    line.push_str(&format!(" {} |", cell));
                }
            }
            lines.push(line);

            if row_idx == 0 {
                let mut sep = String::from("|");
                for width in &widths {
                    sep.push_str(&format!(" {} |", "-".repeat(*width)));
                }
                lines.push(sep);
            }
        }

        lines.join("\n")
    }

    fn render_toc(&self, tree: &DocumentTree, slugs: &[String]) -> String {
        let mut lines = vec!["## Contents".to_string(), String::new()];
        for ((level, text), slug) in tree.headings().iter().zip(slugs) {
            let indent = "  ".repeat((*level as usize).saturating_sub(1));
            lines.push(format!("{}- [{}](#{})", indent, text, slug));
        }
        lines.join("\n")
    }

    /// Slugs for every heading in order, deduplicated with `-N` suffixes.
    fn heading_slugs(&self, tree: &DocumentTree) -> Vec<String> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        tree.headings()
            .iter()
            .map(|(_, text)| {
                let base = slugify(text);
                let count = seen.entry(base.clone()).or_insert(0);
                let slug = if *count == 0 {
                    base.clone()
                } else {
                    format!("{}-{}", base, count)
                };
                *count += 1;
                slug
            })
            .collect()
    }
}

/// Block kinds, tracked for blank-line placement between blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Preamble,
    Heading,
    Paragraph,
    ListItem,
    Table,
    Image,
}

impl BlockKind {
    fn of(block: &DocumentBlock) -> Self {
        match block {
            DocumentBlock::Heading { .. } => BlockKind::Heading,
            DocumentBlock::Paragraph { .. } => BlockKind::Paragraph,
            DocumentBlock::ListItem { .. } => BlockKind::ListItem,
            DocumentBlock::Table { .. } => BlockKind::Table,
            DocumentBlock::ImageRef { .. } => BlockKind::Image,
        }
    }
}

/// NFC-normalize text and unify line endings from the source.
fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n").nfc().collect()
}

/// Escape Markdown-significant characters, leaving inline code spans
/// (backtick-delimited) untouched.
fn escape_markdown(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_code = false;
    for c in text.chars() {
        match c {
            '`' => {
                in_code = !in_code;
                result.push(c);
            }
            '\\' | '*' | '_' | '[' | ']' if !in_code => {
                result.push('\\');
                result.push(c);
            }
            _ => result.push(c),
        }
    }
    result
}

/// Escape a table cell: Markdown specials plus the pipe, newlines
/// flattened to spaces.
fn escape_table_cell(text: &str) -> String {
    escape_markdown(text)
        .replace('\n', " ")
        .replace('|', "\\|")
        .trim()
        .to_string()
}

/// Greedy word wrap at `width` display characters. Words longer than the
/// width stay unsplit on their own line.
fn wrap_text(text: &str, width: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_len > 0 && current_len + 1 + word_len > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines.join("\n")
}

/// Anchor slug: lowercase, non-alphanumerics replaced with `-`, runs
/// collapsed, edges trimmed.
fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut prev_dash = false;
    for c in text.to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
            prev_dash = false;
        } else if !prev_dash && !slug.is_empty() {
            slug.push('-');
            prev_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Collapse three or more consecutive newlines down to two.
fn collapse_blank_lines(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut newlines = 0usize;
    for c in text.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines <= 2 {
                result.push(c);
            }
        } else {
            newlines = 0;
            result.push(c);
        }
    }
    result
}
