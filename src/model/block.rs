//! Output-side types: classified blocks and the document tree.

use serde::{Deserialize, Serialize};

use super::DocMetadata;

/// One classified structural unit in the output tree.
///
/// The enum is closed on purpose: the synthesizer matches exhaustively over
/// it, so adding a variant forces every renderer to handle it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentBlock {
    /// A heading with an inferred level.
    Heading {
        /// Heading level, always in 1..=6
        level: u8,
        /// Heading text
        text: String,
        /// Font size the level was derived from
        source_font_size: f32,
    },

    /// A paragraph of body text.
    Paragraph {
        /// Paragraph text
        text: String,
    },

    /// A single list item.
    ListItem {
        /// Item text with the marker stripped
        text: String,
        /// Whether the item belongs to an ordered (numbered) list
        ordered: bool,
        /// Indentation level relative to the shallowest item in the run
        nesting_depth: u8,
        /// Item number within its run, for ordered lists
        index_in_list: Option<u32>,
    },

    /// A table as rows of plain-text cells.
    Table {
        /// Row-major cell text; every emitted table has >= 2 rows and
        /// >= 2 columns
        rows: Vec<Vec<String>>,
    },

    /// A reference to an externally extracted image.
    ImageRef {
        /// Externally assigned asset identifier
        asset_id: String,
        /// Alternative text
        alt_text: String,
        /// Relative path to the saved image file
        path: String,
    },
}

impl DocumentBlock {
    /// Check if this block is a heading.
    pub fn is_heading(&self) -> bool {
        matches!(self, DocumentBlock::Heading { .. })
    }

    /// Check if this block is a list item.
    pub fn is_list_item(&self) -> bool {
        matches!(self, DocumentBlock::ListItem { .. })
    }

    /// Check if this block is a table.
    pub fn is_table(&self) -> bool {
        matches!(self, DocumentBlock::Table { .. })
    }

    /// Plain text content, used by fallback dumps and tests.
    pub fn plain_text(&self) -> String {
        match self {
            DocumentBlock::Heading { text, .. } => text.clone(),
            DocumentBlock::Paragraph { text } => text.clone(),
            DocumentBlock::ListItem { text, .. } => text.clone(),
            DocumentBlock::Table { rows } => rows
                .iter()
                .map(|r| r.join("\t"))
                .collect::<Vec<_>>()
                .join("\n"),
            DocumentBlock::ImageRef { alt_text, .. } => alt_text.clone(),
        }
    }
}

/// The classified document: a flat, ordered sequence of blocks in page
/// order, then reading order within a page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentTree {
    /// Document metadata carried through from the source
    pub metadata: DocMetadata,

    /// Blocks in final output order
    pub blocks: Vec<DocumentBlock>,
}

impl DocumentTree {
    /// Create an empty tree with the given metadata.
    pub fn new(metadata: DocMetadata) -> Self {
        Self {
            metadata,
            blocks: Vec::new(),
        }
    }

    /// Append a block.
    pub fn push(&mut self, block: DocumentBlock) {
        self.blocks.push(block);
    }

    /// Append all blocks of a classified page.
    pub fn extend(&mut self, blocks: Vec<DocumentBlock>) {
        self.blocks.extend(blocks);
    }

    /// Whether the tree holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Count blocks matching a predicate.
    pub fn count_matching(&self, pred: impl Fn(&DocumentBlock) -> bool) -> u32 {
        self.blocks.iter().filter(|b| pred(b)).count() as u32
    }

    /// All headings in order, as `(level, text)` pairs.
    pub fn headings(&self) -> Vec<(u8, &str)> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                DocumentBlock::Heading { level, text, .. } => Some((*level, text.as_str())),
                _ => None,
            })
            .collect()
    }
}
