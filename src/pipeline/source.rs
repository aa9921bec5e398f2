//! The reading-collaborator boundary.
//!
//! Byte-level PDF parsing, glyph decoding, and image extraction live
//! outside this crate. A [`PageSource`] hands the pipeline normalized
//! pages; [`DocumentDump`] is the serialized form of that stream, as
//! produced by the external extraction tool.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{DocMetadata, PageInput};

/// Supplies document metadata and per-page fragment streams.
///
/// Implementations may read lazily; `read_page` is called once per page
/// during the pre-scan and the cached pages are reused for classification.
pub trait PageSource {
    /// Document-level metadata (title, author, page count).
    fn metadata(&self) -> DocMetadata;

    /// Number of pages in the document.
    fn page_count(&self) -> u32;

    /// Deliver one page. Failures surface as
    /// [`Error::UnreadableSource`](crate::Error::UnreadableSource).
    fn read_page(&mut self, index: u32) -> Result<PageInput>;
}

/// Caller-driven cancellation flag, checked between pages (never
/// mid-page). Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// An in-memory page source over already-materialized pages.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    metadata: DocMetadata,
    pages: Vec<PageInput>,
}

impl MemorySource {
    /// Create a source from metadata and pages. The metadata's page count
    /// is corrected to the actual number of pages.
    pub fn new(mut metadata: DocMetadata, pages: Vec<PageInput>) -> Self {
        metadata.page_count = pages.len() as u32;
        Self { metadata, pages }
    }
}

impl PageSource for MemorySource {
    fn metadata(&self) -> DocMetadata {
        self.metadata.clone()
    }

    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn read_page(&mut self, index: u32) -> Result<PageInput> {
        self.pages
            .get(index as usize)
            .cloned()
            .ok_or_else(|| Error::UnreadableSource(format!("page {} out of range", index)))
    }
}

/// The on-disk interchange format produced by the external extraction
/// tool: document metadata plus every page's fragments, images, and
/// geometric hints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentDump {
    /// Document metadata
    #[serde(default)]
    pub metadata: DocMetadata,

    /// Pages in order
    pub pages: Vec<PageInput>,
}

impl DocumentDump {
    /// Parse a dump from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Convert into an in-memory page source.
    pub fn into_source(self) -> MemorySource {
        MemorySource::new(self.metadata, self.pages)
    }
}
