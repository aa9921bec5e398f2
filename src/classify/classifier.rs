//! Page classification: fragments into typed document blocks.

use std::sync::OnceLock;

use regex::Regex;

use crate::config::ConfigProfile;
use crate::error::{Error, Result};
use crate::model::{DocumentBlock, PageInput, TextFragment};

use super::font_stats::FontStatistics;
use super::table_detector::TableRegionDetector;

/// Fraction of the font size two fragments' centers may differ by and
/// still share a line.
const LINE_TOLERANCE_FACTOR: f32 = 0.3;

fn bullet_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*([•\-\*‣◦▪○·])\s+").expect("valid bullet pattern"))
}

fn ordered_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:(\d{1,3})|([A-Za-z]))[.)]\s+").expect("valid ordered pattern")
    })
}

/// Classifies one page of fragments into an ordered block sequence.
///
/// Classification depends only on `(page, stats, config)`; identical inputs
/// always produce an identical block sequence.
pub struct StructureClassifier<'a> {
    config: &'a ConfigProfile,
    stats: &'a FontStatistics,
}

impl<'a> StructureClassifier<'a> {
    /// Create a classifier over fixed document-wide font statistics.
    pub fn new(config: &'a ConfigProfile, stats: &'a FontStatistics) -> Self {
        Self { config, stats }
    }

    /// Classify a page into blocks in reading order.
    ///
    /// Returns a page-scoped [`Error::ClassificationFault`] on degenerate
    /// geometry; the pipeline recovers by dumping the page as paragraphs.
    pub fn classify_page(&self, page: &PageInput) -> Result<Vec<DocumentBlock>> {
        if let Some(bad) = page.fragments.iter().find(|f| !f.is_well_formed()) {
            return Err(Error::ClassificationFault {
                page: page.index,
                reason: format!(
                    "fragment {:?} has non-finite geometry or font size",
                    bad.text
                ),
            });
        }

        if page.is_empty() {
            return Ok(vec![]);
        }

        // Carve table regions out first; their fragments never reach
        // paragraph or list classification.
        let (table_items, leftover) = if self.config.conversion.table_detection {
            let detector = TableRegionDetector::new(&self.config.conversion);
            let (regions, leftover) = detector.detect(page.fragments.clone(), &page.column_hints);
            let items: Vec<Item> = regions
                .iter()
                .map(|region| Item {
                    y: region.bbox.y1,
                    kind: ItemKind::Block(region.to_block()),
                })
                .collect();
            (items, leftover)
        } else {
            (Vec::new(), page.fragments.clone())
        };

        let lines = group_into_lines(leftover);

        let mut items = table_items;
        items.extend(lines.into_iter().map(|line| Item {
            y: line.y,
            kind: ItemKind::Line(line),
        }));
        items.extend(page.images.iter().map(|anchor| Item {
            y: anchor.y,
            kind: ItemKind::Block(DocumentBlock::ImageRef {
                asset_id: anchor.asset_id.clone(),
                alt_text: if anchor.alt_text.is_empty() {
                    anchor.asset_id.clone()
                } else {
                    anchor.alt_text.clone()
                },
                path: anchor.path.clone(),
            }),
        }));

        // Top-to-bottom reading order; ties keep insertion order, so tables
        // precede loose lines at the same height.
        items.sort_by(|a, b| b.y.partial_cmp(&a.y).unwrap_or(std::cmp::Ordering::Equal));

        Ok(self.assemble(items))
    }

    /// Walk positioned items top to bottom, turning lines into headings,
    /// list runs, and paragraphs. Any non-line item is a hard boundary for
    /// paragraph merging and list runs.
    fn assemble(&self, items: Vec<Item>) -> Vec<DocumentBlock> {
        let median_gap = median_line_gap(&items);

        let mut blocks = Vec::new();
        let mut paragraph: Option<OpenParagraph> = None;
        let mut list_run: Vec<ListLine> = Vec::new();

        for item in items {
            match item.kind {
                ItemKind::Block(block) => {
                    self.flush_paragraph(&mut paragraph, &mut blocks);
                    self.flush_list_run(&mut list_run, &mut blocks);
                    blocks.push(block);
                }
                ItemKind::Line(line) => {
                    let text = line.text();
                    if text.trim().is_empty() {
                        continue;
                    }

                    if let Some(level) = self.heading_level_for(&line, &text) {
                        self.flush_paragraph(&mut paragraph, &mut blocks);
                        self.flush_list_run(&mut list_run, &mut blocks);
                        blocks.push(DocumentBlock::Heading {
                            level,
                            text: text.trim().to_string(),
                            source_font_size: line.font_size,
                        });
                        continue;
                    }

                    if let Some(marker) = match_list_marker(&text) {
                        self.flush_paragraph(&mut paragraph, &mut blocks);
                        list_run.push(ListLine {
                            indent: line.x,
                            text: marker.rest,
                            ordered: marker.ordered,
                            number: marker.number,
                        });
                        continue;
                    }

                    self.flush_list_run(&mut list_run, &mut blocks);
                    self.push_text_line(&mut paragraph, &mut blocks, line, text, median_gap);
                }
            }
        }

        self.flush_paragraph(&mut paragraph, &mut blocks);
        self.flush_list_run(&mut list_run, &mut blocks);
        blocks
    }

    /// Heading level for a line, or `None` when it stays body text. Runs
    /// longer than `max_heading_length` demote to paragraphs: long bold
    /// text is not a title.
    fn heading_level_for(&self, line: &Line, text: &str) -> Option<u8> {
        let level = self.stats.heading_level(line.font_size)?;
        if text.trim().chars().count() > self.config.conversion.max_heading_length {
            log::debug!(
                "demoting over-long heading candidate ({} chars) to paragraph",
                text.trim().chars().count()
            );
            return None;
        }
        Some(level)
    }

    /// Merge the line into the open paragraph or start a new one.
    fn push_text_line(
        &self,
        paragraph: &mut Option<OpenParagraph>,
        blocks: &mut Vec<DocumentBlock>,
        line: Line,
        text: String,
        median_gap: f32,
    ) {
        let text = text.trim().to_string();

        let should_merge = match paragraph.as_ref() {
            Some(open) => {
                let gap = open.last_y - line.y;
                let same_style = (open.font_size - line.font_size).abs() <= 1.0;
                let close_enough = gap <= self.config.conversion.line_spacing_factor * median_gap;
                self.config.conversion.merge_paragraphs && same_style && close_enough
            }
            None => false,
        };

        if should_merge {
            let open = paragraph.as_mut().expect("paragraph is open");
            open.text.push(' ');
            open.text.push_str(&text);
            open.last_y = line.y;
            return;
        }

        self.flush_paragraph(paragraph, blocks);
        *paragraph = Some(OpenParagraph {
            text,
            font_size: line.font_size,
            last_y: line.y,
        });
    }

    fn flush_paragraph(
        &self,
        paragraph: &mut Option<OpenParagraph>,
        blocks: &mut Vec<DocumentBlock>,
    ) {
        if let Some(open) = paragraph.take() {
            blocks.push(DocumentBlock::Paragraph { text: open.text });
        }
    }

    /// Close a list run: derive nesting depths from indentation relative to
    /// the shallowest marker in the run, clamp depth jumps, and number
    /// ordered items.
    fn flush_list_run(&self, run: &mut Vec<ListLine>, blocks: &mut Vec<DocumentBlock>) {
        if run.is_empty() {
            return;
        }
        let lines = std::mem::take(run);

        let min_indent = lines
            .iter()
            .map(|l| l.indent)
            .fold(f32::MAX, f32::min);
        let unit = self.config.conversion.indent_unit;

        let mut prev_depth: Option<u8> = None;
        let mut counters: Vec<u32> = Vec::new();

        for line in lines {
            let raw_depth = (((line.indent - min_indent) / unit).floor() as i32).max(0) as u8;
            // Adjacent items never skip more than one level down.
            let depth = match prev_depth {
                Some(prev) => raw_depth.min(prev + 1),
                None => raw_depth,
            };
            prev_depth = Some(depth);

            let index_in_list = if line.ordered {
                if counters.len() <= depth as usize {
                    counters.resize(depth as usize + 1, 0);
                }
                counters.truncate(depth as usize + 1);
                let index = match line.number {
                    Some(n) => n,
                    None => counters[depth as usize] + 1,
                };
                counters[depth as usize] = index;
                Some(index)
            } else {
                None
            };

            blocks.push(DocumentBlock::ListItem {
                text: line.text,
                ordered: line.ordered,
                nesting_depth: depth,
                index_in_list,
            });
        }
    }
}

/// A positioned element awaiting assembly: an already-built block (table,
/// image) or a text line.
struct Item {
    y: f32,
    kind: ItemKind,
}

enum ItemKind {
    Block(DocumentBlock),
    Line(Line),
}

/// A paragraph still accepting merge candidates.
struct OpenParagraph {
    text: String,
    font_size: f32,
    last_y: f32,
}

/// A line matched as a list item, before depth resolution.
struct ListLine {
    indent: f32,
    text: String,
    ordered: bool,
    number: Option<u32>,
}

/// A text line: x-sorted fragments sharing a vertical band.
#[derive(Debug, Clone)]
pub(crate) struct Line {
    fragments: Vec<TextFragment>,
    /// Baseline band center
    pub y: f32,
    /// Leftmost edge, used for list indentation
    pub x: f32,
    /// Dominant font size, weighted by text length
    pub font_size: f32,
}

impl Line {
    fn from_fragments(mut fragments: Vec<TextFragment>) -> Self {
        fragments.sort_by(|a, b| {
            a.x()
                .partial_cmp(&b.x())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let total_chars: usize = fragments.iter().map(|f| f.text.chars().count()).sum();
        let weighted: f32 = fragments
            .iter()
            .map(|f| f.font_size * f.text.chars().count() as f32)
            .sum();
        let font_size = if total_chars > 0 {
            weighted / total_chars as f32
        } else {
            fragments.first().map(|f| f.font_size).unwrap_or(12.0)
        };

        let y = fragments
            .iter()
            .map(|f| f.y_center())
            .fold(0.0, |acc, y| acc + y)
            / fragments.len().max(1) as f32;
        let x = fragments
            .iter()
            .map(|f| f.x())
            .fold(f32::MAX, f32::min);

        Self {
            fragments,
            y,
            x,
            font_size,
        }
    }

    /// Combined text with spaces inserted at word-sized horizontal gaps.
    pub fn text(&self) -> String {
        let mut result = String::new();
        for (i, fragment) in self.fragments.iter().enumerate() {
            if i > 0 {
                let prev = &self.fragments[i - 1];
                let gap = fragment.bbox.x0 - prev.bbox.x1;
                let char_count = fragment.text.chars().count().max(1);
                let avg_char_width = if fragment.bbox.width() > 0.0 {
                    fragment.bbox.width() / char_count as f32
                } else {
                    fragment.font_size * 0.5
                };
                let needs_space = gap > avg_char_width * 0.2
                    && !result.ends_with(' ')
                    && !fragment.text.starts_with(' ');
                if needs_space {
                    result.push(' ');
                }
            }
            result.push_str(&fragment.text);
        }
        result
    }
}

/// Group fragments into lines by vertical band: sort by descending center
/// then x, and open a new line when a fragment's center leaves the current
/// band.
pub(crate) fn group_into_lines(fragments: Vec<TextFragment>) -> Vec<Line> {
    if fragments.is_empty() {
        return vec![];
    }

    let mut fragments = fragments;
    fragments.sort_by(|a, b| {
        let y_cmp = b
            .y_center()
            .partial_cmp(&a.y_center())
            .unwrap_or(std::cmp::Ordering::Equal);
        y_cmp.then_with(|| {
            a.x()
                .partial_cmp(&b.x())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
    });

    let mut lines: Vec<Line> = Vec::new();
    let mut current: Vec<TextFragment> = Vec::new();
    let mut current_y: Option<f32> = None;

    for fragment in fragments {
        let tolerance = fragment.font_size * LINE_TOLERANCE_FACTOR;
        match current_y {
            Some(y) if (fragment.y_center() - y).abs() <= tolerance => {
                current.push(fragment);
            }
            _ => {
                if !current.is_empty() {
                    lines.push(Line::from_fragments(std::mem::take(&mut current)));
                }
                current_y = Some(fragment.y_center());
                current.push(fragment);
            }
        }
    }
    if !current.is_empty() {
        lines.push(Line::from_fragments(current));
    }

    lines
}

/// Median vertical gap between consecutive lines, for paragraph-break
/// decisions. Non-line items are ignored.
fn median_line_gap(items: &[Item]) -> f32 {
    let mut gaps: Vec<f32> = Vec::new();
    let mut prev: Option<f32> = None;
    for item in items {
        if let ItemKind::Line(_) = item.kind {
            if let Some(p) = prev {
                let gap = p - item.y;
                if gap > 0.1 {
                    gaps.push(gap);
                }
            }
            prev = Some(item.y);
        }
    }
    if gaps.is_empty() {
        return 12.0;
    }
    gaps.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    // Lower median: a lone oversized paragraph break must not drag the
    // estimate up to its own size.
    gaps[(gaps.len() - 1) / 2]
}

/// A matched list marker and the text after it.
struct MarkerMatch {
    rest: String,
    ordered: bool,
    number: Option<u32>,
}

/// Match a bullet or ordered marker at the start of a line. The marker must
/// be followed by whitespace.
fn match_list_marker(text: &str) -> Option<MarkerMatch> {
    if let Some(caps) = bullet_pattern().captures(text) {
        let whole = caps.get(0).expect("full match");
        return Some(MarkerMatch {
            rest: text[whole.end()..].trim().to_string(),
            ordered: false,
            number: None,
        });
    }

    if let Some(caps) = ordered_pattern().captures(text) {
        let whole = caps.get(0).expect("full match");
        let number = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
        return Some(MarkerMatch {
            rest: text[whole.end()..].trim().to_string(),
            ordered: true,
            number,
        });
    }

    None
}

/// Dump a page's fragments as a single unstructured paragraph, used when
/// classification faults. Nothing is silently dropped: the text survives
/// even if the structure could not be inferred.
pub fn fallback_page_dump(page: &PageInput) -> Vec<DocumentBlock> {
    let mut fragments: Vec<&TextFragment> = page.fragments.iter().collect();
    fragments.sort_by_key(|f| f.reading_order);

    let text = fragments
        .iter()
        .map(|f| f.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if text.is_empty() {
        vec![]
    } else {
        vec![DocumentBlock::Paragraph { text }]
    }
}
