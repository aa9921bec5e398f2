//! The conversion pipeline: pages in, Markdown out.
//!
//! Two explicit passes per document. Pass 1 reads every page and feeds the
//! document-wide font histogram; pass 2 classifies each page against the
//! fixed body-size statistics and accumulates one tree, which is rendered
//! once at the end. Keeping the passes staged (rather than lazily caching
//! statistics) is what makes heading levels consistent across pages.

mod source;

pub use source::{CancelToken, DocumentDump, MemorySource, PageSource};

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::classify::{fallback_page_dump, FontStatistics, StructureClassifier};
use crate::config::ConfigProfile;
use crate::error::{Error, Result};
use crate::model::{DocumentBlock, DocumentTree, PageInput};
use crate::render;

/// Per-document conversion statistics.
#[derive(Debug, Clone, Default)]
pub struct ConversionStats {
    /// Pages processed
    pub page_count: u32,
    /// Headings emitted
    pub heading_count: u32,
    /// Paragraphs emitted
    pub paragraph_count: u32,
    /// List items emitted
    pub list_count: u32,
    /// Tables emitted
    pub table_count: u32,
    /// Image references emitted
    pub image_count: u32,
    /// Wall-clock time for the conversion
    pub elapsed: Duration,
    /// Non-fatal warnings (empty pages, degraded pages)
    pub warnings: Vec<String>,
}

impl ConversionStats {
    fn count_tree(&mut self, tree: &DocumentTree) {
        self.heading_count = tree.count_matching(DocumentBlock::is_heading);
        self.paragraph_count =
            tree.count_matching(|b| matches!(b, DocumentBlock::Paragraph { .. }));
        self.list_count = tree.count_matching(DocumentBlock::is_list_item);
        self.table_count = tree.count_matching(DocumentBlock::is_table);
        self.image_count = tree.count_matching(|b| matches!(b, DocumentBlock::ImageRef { .. }));
    }
}

/// Outcome of one document conversion.
///
/// Created once per document and handed back to the caller; the pipeline
/// retains nothing.
#[derive(Debug)]
pub struct ConversionResult {
    /// Whether the conversion completed
    pub success: bool,

    /// The rendered Markdown. Present on success, and on cancellation for
    /// the pages classified so far.
    pub output_text: Option<String>,

    /// The fatal error, when `success` is false
    pub error: Option<Error>,

    /// Asset identifier to saved-image-path mapping for the file-writing
    /// collaborator
    pub assets: BTreeMap<String, String>,

    /// Conversion statistics
    pub stats: ConversionStats,
}

impl ConversionResult {
    fn failure(error: Error, stats: ConversionStats) -> Self {
        Self {
            success: false,
            output_text: None,
            error: Some(error),
            assets: BTreeMap::new(),
            stats,
        }
    }
}

/// Orchestrates classification and rendering for whole documents.
///
/// The pipeline is single-threaded and holds no cross-document state;
/// batch processing across documents is the caller's concern.
pub struct ConversionPipeline {
    config: ConfigProfile,
    cancel: CancelToken,
}

impl ConversionPipeline {
    /// Create a pipeline, validating the profile up front. An invalid
    /// profile fails here, before any page is touched.
    pub fn new(config: ConfigProfile) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancelToken::new(),
        })
    }

    /// Attach a cancellation token. The pipeline checks it between pages.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// The resolved profile this pipeline runs under.
    pub fn config(&self) -> &ConfigProfile {
        &self.config
    }

    /// Convert one document. Fatal errors land in the result's `error`
    /// field; page-scoped faults degrade the affected page and are
    /// recorded as warnings.
    pub fn convert(&self, source: &mut dyn PageSource) -> ConversionResult {
        let started = Instant::now();
        let mut stats = ConversionStats::default();

        let mut result = match self.convert_inner(source, &mut stats) {
            Ok(result) => result,
            Err(error) => ConversionResult::failure(error, stats),
        };
        result.stats.elapsed = started.elapsed();
        result
    }

    fn convert_inner(
        &self,
        source: &mut dyn PageSource,
        stats: &mut ConversionStats,
    ) -> Result<ConversionResult> {
        let page_count = source.page_count();
        if page_count == 0 {
            return Err(Error::EmptyDocument);
        }

        // Pass 1: read pages and collect the font-size histogram.
        let mut pages: Vec<PageInput> = Vec::with_capacity(page_count as usize);
        let mut font_stats = FontStatistics::default();
        for index in 0..page_count {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let page = source
                .read_page(index)
                .map_err(|e| match e {
                    e @ Error::UnreadableSource(_) => e,
                    other => Error::UnreadableSource(other.to_string()),
                })?;
            font_stats.observe_page(&page);
            pages.push(page);
        }

        if pages.iter().all(|p| p.is_empty()) {
            return Err(Error::EmptyDocument);
        }

        font_stats.analyze(self.config.conversion.title_font_threshold);
        log::debug!(
            "document body size {:.1}pt over {} fragments",
            font_stats.body_size(),
            font_stats.sample_count()
        );

        // Pass 2: classify each page against the fixed statistics.
        let mut metadata = source.metadata();
        metadata.page_count = page_count;
        let mut tree = DocumentTree::new(metadata);
        let classifier = StructureClassifier::new(&self.config, &font_stats);

        for page in &pages {
            if self.cancel.is_cancelled() {
                return self.cancelled_result(tree, stats, pages.len() as u32);
            }

            if page.is_empty() {
                let warning = format!("page {} is empty", page.index + 1);
                log::warn!("{}", warning);
                stats.warnings.push(warning);
                continue;
            }

            match classifier.classify_page(page) {
                Ok(blocks) => tree.extend(blocks),
                Err(fault @ Error::ClassificationFault { .. }) => {
                    let warning = format!("{}; page degraded to a paragraph dump", fault);
                    log::warn!("{}", warning);
                    stats.warnings.push(warning);
                    tree.extend(fallback_page_dump(page));
                }
                Err(fatal) => return Err(fatal),
            }
        }

        tree.metadata.generated = Some(Utc::now());
        let output = render::render(&tree, &self.config)?;

        stats.page_count = pages.len() as u32;
        stats.count_tree(&tree);

        Ok(ConversionResult {
            success: true,
            output_text: Some(output),
            error: None,
            assets: collect_assets(&pages),
            stats: std::mem::take(stats),
        })
    }

    /// Partial result for a cancellation observed between pages: the pages
    /// classified so far are still rendered and returned.
    fn cancelled_result(
        &self,
        mut tree: DocumentTree,
        stats: &mut ConversionStats,
        pages_read: u32,
    ) -> Result<ConversionResult> {
        tree.metadata.generated = Some(Utc::now());
        let output = render::render(&tree, &self.config).ok();

        stats.page_count = pages_read;
        stats.count_tree(&tree);

        Ok(ConversionResult {
            success: false,
            output_text: output,
            error: Some(Error::Cancelled),
            assets: BTreeMap::new(),
            stats: std::mem::take(stats),
        })
    }
}

/// Asset-id to path mapping across all pages, for the file-writing
/// collaborator.
fn collect_assets(pages: &[PageInput]) -> BTreeMap<String, String> {
    pages
        .iter()
        .flat_map(|p| p.images.iter())
        .map(|img| (img.asset_id.clone(), img.path.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, DocMetadata, ImageAnchor, TextFragment};

    fn frag(text: &str, size: f32, x: f32, y: f32, page: u32) -> TextFragment {
        TextFragment::new(
            text,
            size,
            "Helvetica",
            BoundingBox::new(x, y, x + text.len() as f32 * size * 0.5, y + size),
            page,
            0,
        )
    }

    fn one_page_source(fragments: Vec<TextFragment>) -> MemorySource {
        let mut page = PageInput::new(0, 612.0, 792.0);
        page.fragments = fragments;
        MemorySource::new(DocMetadata::default(), vec![page])
    }

    #[test]
    fn test_basic_conversion() {
        let mut source = one_page_source(vec![
            frag("TITLE", 24.0, 72.0, 700.0, 0),
            frag("Intro text.", 12.0, 72.0, 680.0, 0),
            frag("Second line.", 12.0, 72.0, 664.0, 0),
            frag("Third line.", 12.0, 72.0, 648.0, 0),
        ]);

        let pipeline = ConversionPipeline::new(ConfigProfile::default()).unwrap();
        let result = pipeline.convert(&mut source);

        assert!(result.success, "error: {:?}", result.error);
        let output = result.output_text.unwrap();
        assert!(output.starts_with("# TITLE\n\nIntro text.\n"));
        assert_eq!(result.stats.page_count, 1);
        assert_eq!(result.stats.heading_count, 1);
        assert_eq!(result.stats.paragraph_count, 3);
    }

    #[test]
    fn test_empty_document_is_fatal() {
        let mut source = MemorySource::new(DocMetadata::default(), vec![]);
        let pipeline = ConversionPipeline::new(ConfigProfile::default()).unwrap();
        let result = pipeline.convert(&mut source);

        assert!(!result.success);
        assert!(matches!(result.error, Some(Error::EmptyDocument)));
    }

    #[test]
    fn test_all_pages_blank_is_fatal() {
        let mut source = MemorySource::new(
            DocMetadata::default(),
            vec![PageInput::new(0, 612.0, 792.0), PageInput::new(1, 612.0, 792.0)],
        );
        let pipeline = ConversionPipeline::new(ConfigProfile::default()).unwrap();
        let result = pipeline.convert(&mut source);

        assert!(matches!(result.error, Some(Error::EmptyDocument)));
    }

    #[test]
    fn test_empty_page_warns_and_continues() {
        let mut text_page = PageInput::new(1, 612.0, 792.0);
        text_page.fragments = vec![
            frag("body", 12.0, 72.0, 700.0, 1),
            frag("more", 12.0, 72.0, 684.0, 1),
        ];
        let mut source = MemorySource::new(
            DocMetadata::default(),
            vec![PageInput::new(0, 612.0, 792.0), text_page],
        );

        let pipeline = ConversionPipeline::new(ConfigProfile::default()).unwrap();
        let result = pipeline.convert(&mut source);

        assert!(result.success);
        assert_eq!(result.stats.warnings.len(), 1);
        assert!(result.stats.warnings[0].contains("page 1 is empty"));
        assert_eq!(result.stats.paragraph_count, 2);
    }

    #[test]
    fn test_faulted_page_degrades_to_dump() {
        let mut bad_page = PageInput::new(0, 612.0, 792.0);
        let mut broken = frag("salvaged text", 12.0, 72.0, 700.0, 0);
        broken.bbox.y0 = f32::NAN;
        bad_page.fragments = vec![broken];

        let mut good_page = PageInput::new(1, 612.0, 792.0);
        good_page.fragments = vec![
            frag("intact", 12.0, 72.0, 700.0, 1),
            frag("content", 12.0, 72.0, 684.0, 1),
        ];

        let mut source =
            MemorySource::new(DocMetadata::default(), vec![bad_page, good_page]);
        let pipeline = ConversionPipeline::new(ConfigProfile::default()).unwrap();
        let result = pipeline.convert(&mut source);

        assert!(result.success);
        assert_eq!(result.stats.warnings.len(), 1);
        let output = result.output_text.unwrap();
        // The faulted page's text survives as a paragraph dump
        assert!(output.contains("salvaged text"));
        assert!(output.contains("intact"));
    }

    #[test]
    fn test_invalid_config_rejected_before_pages() {
        let mut config = ConfigProfile::default();
        config.conversion.title_font_threshold = -1.0;
        assert!(matches!(
            ConversionPipeline::new(config),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_cancellation_before_first_page() {
        let mut source = one_page_source(vec![frag("x", 12.0, 72.0, 700.0, 0)]);
        let token = CancelToken::new();
        token.cancel();

        let pipeline = ConversionPipeline::new(ConfigProfile::default())
            .unwrap()
            .with_cancel_token(token);
        let result = pipeline.convert(&mut source);

        assert!(!result.success);
        assert!(matches!(result.error, Some(Error::Cancelled)));
    }

    #[test]
    fn test_assets_collected() {
        let mut page = PageInput::new(0, 612.0, 792.0);
        page.fragments = vec![frag("text", 12.0, 72.0, 700.0, 0)];
        page.images.push(ImageAnchor {
            asset_id: "img-1".into(),
            alt_text: String::new(),
            path: "images/img-1.png".into(),
            page_index: 0,
            y: 400.0,
        });
        let mut source = MemorySource::new(DocMetadata::default(), vec![page]);

        let pipeline = ConversionPipeline::new(ConfigProfile::default()).unwrap();
        let result = pipeline.convert(&mut source);

        assert!(result.success);
        assert_eq!(
            result.assets.get("img-1").map(String::as_str),
            Some("images/img-1.png")
        );
        assert_eq!(result.stats.image_count, 1);
    }

    #[test]
    fn test_heading_levels_consistent_across_pages() {
        // The same 18pt size must map to the same level on every page,
        // because statistics are document-wide.
        let mut page_a = PageInput::new(0, 612.0, 792.0);
        page_a.fragments = vec![
            frag("Chapter One", 18.0, 72.0, 700.0, 0),
            frag("body body body", 12.0, 72.0, 680.0, 0),
            frag("body body", 12.0, 72.0, 664.0, 0),
        ];
        let mut page_b = PageInput::new(1, 612.0, 792.0);
        page_b.fragments = vec![
            frag("Big Title", 24.0, 72.0, 700.0, 1),
            frag("Chapter Two", 18.0, 72.0, 660.0, 1),
            frag("body body body", 12.0, 72.0, 640.0, 1),
        ];

        let mut source = MemorySource::new(DocMetadata::default(), vec![page_a, page_b]);
        let pipeline = ConversionPipeline::new(ConfigProfile::default()).unwrap();
        let result = pipeline.convert(&mut source);

        let output = result.output_text.unwrap();
        assert!(output.contains("## Chapter One"));
        assert!(output.contains("# Big Title"));
        assert!(output.contains("## Chapter Two"));
    }

    #[test]
    fn test_elapsed_recorded() {
        let mut source = one_page_source(vec![frag("x", 12.0, 72.0, 700.0, 0)]);
        let pipeline = ConversionPipeline::new(ConfigProfile::default()).unwrap();
        let result = pipeline.convert(&mut source);
        assert!(result.stats.elapsed > Duration::ZERO);
    }
}
