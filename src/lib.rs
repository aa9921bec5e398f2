//! # pagemark
//!
//! Structural inference engine for paginated documents: turns an unordered
//! bag of positioned text fragments (with font metadata) into a typed
//! document tree, and renders that tree as stable, deterministic Markdown.
//!
//! Byte-level PDF parsing is deliberately out of scope: an external
//! extraction tool supplies normalized fragments through the
//! [`PageSource`] trait (or its serialized form, [`DocumentDump`]).
//!
//! ## Quick start
//!
//! ```no_run
//! use pagemark::{ConfigProfile, ConversionPipeline, DocumentDump};
//!
//! fn main() -> pagemark::Result<()> {
//!     let dump = DocumentDump::from_json(&std::fs::read_to_string("doc.json")?)?;
//!     let pipeline = ConversionPipeline::new(ConfigProfile::default())?;
//!
//!     let result = pipeline.convert(&mut dump.into_source());
//!     if let Some(markdown) = result.output_text {
//!         println!("{}", markdown);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Design
//!
//! - **Two-pass classification**: a read-only scan fixes the document's
//!   body font size before any page is classified, so heading levels stay
//!   consistent across pages.
//! - **Pure core**: classification and rendering depend only on their
//!   inputs; identical `(fragments, config)` always produce identical
//!   Markdown.
//! - **Visible degradation**: regions that fail table criteria render as
//!   paragraphs, faulted pages fall back to a text dump. Content is never
//!   silently dropped.

pub mod classify;
pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod render;

// Re-export commonly used types
pub use classify::{FontStatistics, StructureClassifier, TableRegion, TableRegionDetector};
pub use config::{
    ConfigProfile, ConversionOptions, Encoding, HeadingOptions, ImageOptions, LineEnding,
    ListOptions, MarkdownOptions, OutputOptions, ParagraphOptions, TableOptions,
};
pub use error::{Error, Result};
pub use model::{
    BoundingBox, DocMetadata, DocumentBlock, DocumentTree, ImageAnchor, PageInput, TextFragment,
};
pub use pipeline::{
    CancelToken, ConversionPipeline, ConversionResult, ConversionStats, DocumentDump,
    MemorySource, PageSource,
};

/// Convert a fragment dump to Markdown with the default profile.
///
/// # Example
///
/// ```no_run
/// let json = std::fs::read_to_string("doc.json").unwrap();
/// let markdown = pagemark::convert_json(&json).unwrap();
/// ```
pub fn convert_json(json: &str) -> Result<String> {
    convert_json_with_config(json, ConfigProfile::default())
}

/// Convert a fragment dump to Markdown under a specific profile.
pub fn convert_json_with_config(json: &str, config: ConfigProfile) -> Result<String> {
    let dump = DocumentDump::from_json(json)?;
    let pipeline = ConversionPipeline::new(config)?;
    let result = pipeline.convert(&mut dump.into_source());
    match result {
        ConversionResult {
            output_text: Some(text),
            success: true,
            ..
        } => Ok(text),
        ConversionResult { error: Some(e), .. } => Err(e),
        _ => Err(Error::Render("conversion produced no output".into())),
    }
}

/// Builder for configuring and running conversions.
///
/// # Example
///
/// ```no_run
/// use pagemark::Pagemark;
///
/// let result = Pagemark::new()
///     .merge_paragraphs(true)
///     .with_toc()
///     .convert_file("doc.json")?;
/// # Ok::<(), pagemark::Error>(())
/// ```
pub struct Pagemark {
    config: ConfigProfile,
    cancel: Option<CancelToken>,
}

impl Pagemark {
    /// Create a builder with the default profile.
    pub fn new() -> Self {
        Self {
            config: ConfigProfile::default(),
            cancel: None,
        }
    }

    /// Start from a named preset.
    pub fn with_preset(name: &str) -> Result<Self> {
        Ok(Self {
            config: ConfigProfile::preset(name)?,
            cancel: None,
        })
    }

    /// Replace the whole profile.
    pub fn with_config(mut self, config: ConfigProfile) -> Self {
        self.config = config;
        self
    }

    /// Merge adjacent same-style lines into single paragraphs.
    pub fn merge_paragraphs(mut self, merge: bool) -> Self {
        self.config.conversion.merge_paragraphs = merge;
        self
    }

    /// Disable table detection.
    pub fn without_tables(mut self) -> Self {
        self.config.conversion.table_detection = false;
        self
    }

    /// Emit a table of contents and heading anchors.
    pub fn with_toc(mut self) -> Self {
        self.config.markdown.heading.add_toc = true;
        self
    }

    /// Emit a YAML metadata preamble.
    pub fn with_metadata(mut self) -> Self {
        self.config.output.include_metadata = true;
        self
    }

    /// Wrap paragraphs at the given width.
    pub fn wrap_at(mut self, width: usize) -> Self {
        self.config.markdown.paragraph.max_line_length = width;
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Convert any page source.
    pub fn convert(self, source: &mut dyn PageSource) -> Result<ConversionResult> {
        let mut pipeline = ConversionPipeline::new(self.config)?;
        if let Some(token) = self.cancel {
            pipeline = pipeline.with_cancel_token(token);
        }
        Ok(pipeline.convert(source))
    }

    /// Convert a fragment-dump file.
    pub fn convert_file<P: AsRef<std::path::Path>>(self, path: P) -> Result<ConversionResult> {
        let text = std::fs::read_to_string(path)?;
        let dump = DocumentDump::from_json(&text)?;
        self.convert(&mut dump.into_source())
    }
}

impl Default for Pagemark {
    fn default() -> Self {
        Self::new()
    }
}
