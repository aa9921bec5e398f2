//! Integration tests for the conversion pipeline.

use pagemark::{
    BoundingBox, CancelToken, ConfigProfile, ConversionPipeline, DocMetadata, DocumentBlock,
    DocumentTree, Error, ImageAnchor, MemorySource, PageInput, PageSource, TextFragment,
};

fn frag(text: &str, size: f32, x: f32, y: f32, page: u32, order: u32) -> TextFragment {
    TextFragment::new(
        text,
        size,
        "Helvetica",
        BoundingBox::new(x, y, x + text.len() as f32 * size * 0.5, y + size),
        page,
        order,
    )
}

fn document_source() -> MemorySource {
    // Page 1: title, intro paragraph, bullet list
    let mut page1 = PageInput::new(0, 612.0, 792.0);
    page1.fragments = vec![
        frag("User Guide", 24.0, 72.0, 720.0, 0, 0),
        frag("Welcome to the guide.", 12.0, 72.0, 690.0, 0, 1),
        frag("- install the tool", 12.0, 72.0, 660.0, 0, 2),
        frag("- run the converter", 12.0, 72.0, 644.0, 0, 3),
        frag("  - check the output", 12.0, 92.0, 628.0, 0, 4),
    ];

    // Page 2: section heading, 3x3 table, trailing paragraph, image
    let mut page2 = PageInput::new(1, 612.0, 792.0);
    page2.fragments = vec![frag("Reference", 18.0, 72.0, 720.0, 1, 0)];
    for (r, y) in [(0u32, 650.0), (1, 634.0), (2, 618.0)] {
        for (c, x) in [(0u32, 72.0), (1, 200.0), (2, 330.0)] {
            page2.fragments.push(frag(
                &format!("cell{}{}", r, c),
                12.0,
                x,
                y,
                1,
                1 + r * 3 + c,
            ));
        }
    }
    page2
        .fragments
        .push(frag("Closing remarks.", 12.0, 72.0, 560.0, 1, 10));
    page2.images.push(ImageAnchor {
        asset_id: "img-001".into(),
        alt_text: "Diagram".into(),
        path: "images/img-001.png".into(),
        page_index: 1,
        y: 590.0,
    });

    MemorySource::new(
        DocMetadata {
            title: Some("User Guide".into()),
            source_file: Some("guide.pdf".into()),
            ..Default::default()
        },
        vec![page1, page2],
    )
}

#[test]
fn converts_a_full_document_in_order() {
    let pipeline = ConversionPipeline::new(ConfigProfile::default()).unwrap();
    let result = pipeline.convert(&mut document_source());

    assert!(result.success, "error: {:?}", result.error);
    let output = result.output_text.unwrap();

    let title = output.find("# User Guide").unwrap();
    let intro = output.find("Welcome to the guide.").unwrap();
    let list = output.find("- install the tool").unwrap();
    let sub = output.find("  - check the output").unwrap();
    let section = output.find("## Reference").unwrap();
    let table = output.find("| cell00 | cell01 | cell02 |").unwrap();
    let image = output.find("![Diagram](images/img-001.png)").unwrap();
    let closing = output.find("Closing remarks.").unwrap();

    assert!(title < intro);
    assert!(intro < list);
    assert!(list < sub);
    assert!(sub < section);
    assert!(section < table);
    assert!(table < image);
    assert!(image < closing);

    // 3x3 table renders a 3-column dash separator after its header row
    let separator_line = output
        .lines()
        .find(|l| l.starts_with("|") && l.contains("---"))
        .unwrap();
    assert_eq!(separator_line.matches('|').count(), 4);

    assert_eq!(result.stats.page_count, 2);
    assert_eq!(result.stats.heading_count, 2);
    assert_eq!(result.stats.list_count, 3);
    assert_eq!(result.stats.table_count, 1);
    assert_eq!(result.stats.image_count, 1);
}

#[test]
fn conversion_is_deterministic() {
    let pipeline = ConversionPipeline::new(ConfigProfile::default()).unwrap();

    let first = pipeline.convert(&mut document_source()).output_text.unwrap();
    let second = pipeline.convert(&mut document_source()).output_text.unwrap();

    assert_eq!(first, second);
}

#[test]
fn list_depths_never_skip_levels() {
    let mut page = PageInput::new(0, 612.0, 792.0);
    // Indents jump 0 -> 60pt -> 20pt -> 80pt: raw depths would skip levels
    page.fragments = vec![
        frag("- alpha", 12.0, 72.0, 700.0, 0, 0),
        frag("- beta", 12.0, 132.0, 684.0, 0, 1),
        frag("- gamma", 12.0, 92.0, 668.0, 0, 2),
        frag("- delta", 12.0, 152.0, 652.0, 0, 3),
    ];
    let mut source = MemorySource::new(DocMetadata::default(), vec![page]);

    let pipeline = ConversionPipeline::new(ConfigProfile::default()).unwrap();
    let output = pipeline.convert(&mut source).output_text.unwrap();

    let depths: Vec<usize> = output
        .lines()
        .filter(|l| l.trim_start().starts_with('-'))
        .map(|l| (l.len() - l.trim_start().len()) / 2)
        .collect();
    assert_eq!(depths.len(), 4);
    for pair in depths.windows(2) {
        assert!(
            pair[1] <= pair[0] + 1,
            "adjacent list depths skipped a level: {:?}",
            depths
        );
    }
}

#[test]
fn sparse_grid_degrades_to_paragraphs_without_losing_text() {
    // Hinted 4-column grid, but no row ever occupies two columns: no
    // tabular run forms and everything stays prose
    let mut page = PageInput::new(0, 612.0, 792.0);
    page.fragments = vec![
        frag("lonely", 12.0, 72.0, 700.0, 0, 0),
        frag("words", 12.0, 300.0, 684.0, 0, 1),
        frag("scattered", 12.0, 72.0, 668.0, 0, 2),
        frag("about", 12.0, 300.0, 652.0, 0, 3),
    ];
    page.column_hints = vec![72.0, 150.0, 300.0, 450.0];
    let mut source = MemorySource::new(DocMetadata::default(), vec![page]);

    let pipeline = ConversionPipeline::new(ConfigProfile::default()).unwrap();
    let result = pipeline.convert(&mut source);

    let output = result.output_text.unwrap();
    assert_eq!(result.stats.table_count, 0);
    // Every word survives as plain text
    for word in ["lonely", "words", "scattered", "about"] {
        assert!(output.contains(word), "{} was dropped", word);
    }
}

#[test]
fn rendered_output_reparses_to_identical_bytes() {
    // Scenario: heading + paragraph + list. Re-parse the output as plain
    // Markdown into a structurally equivalent tree, re-render, and expect
    // byte-identical text.
    let mut page = PageInput::new(0, 612.0, 792.0);
    page.fragments = vec![
        frag("TITLE", 24.0, 72.0, 720.0, 0, 0),
        frag("Intro text.", 12.0, 72.0, 690.0, 0, 1),
        frag("- item one", 12.0, 72.0, 660.0, 0, 2),
        frag("- sub item", 12.0, 92.0, 644.0, 0, 3),
    ];
    let mut source = MemorySource::new(DocMetadata::default(), vec![page]);

    let config = ConfigProfile::default();
    let pipeline = ConversionPipeline::new(config.clone()).unwrap();
    let rendered = pipeline.convert(&mut source).output_text.unwrap();

    let reparsed = reparse_markdown(&rendered);
    let rerendered = pagemark::render::render(&reparsed, &config).unwrap();

    assert_eq!(rendered, rerendered);
}

/// Minimal plain-Markdown re-parse covering headings, list items, and
/// paragraphs, for the idempotence check.
fn reparse_markdown(text: &str) -> DocumentTree {
    let mut tree = DocumentTree::new(DocMetadata::default());
    for line in text.lines() {
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("# ") {
            tree.push(DocumentBlock::Heading {
                level: 1,
                text: rest.to_string(),
                source_font_size: 0.0,
            });
        } else if let Some(stripped) = line.trim_start().strip_prefix("- ") {
            let indent = line.len() - line.trim_start().len();
            tree.push(DocumentBlock::ListItem {
                text: stripped.to_string(),
                ordered: false,
                nesting_depth: (indent / 2) as u8,
                index_in_list: None,
            });
        } else {
            tree.push(DocumentBlock::Paragraph {
                text: line.to_string(),
            });
        }
    }
    tree
}

#[test]
fn unreadable_source_is_fatal() {
    struct FailingSource;

    impl PageSource for FailingSource {
        fn metadata(&self) -> DocMetadata {
            DocMetadata::default()
        }
        fn page_count(&self) -> u32 {
            3
        }
        fn read_page(&mut self, index: u32) -> pagemark::Result<PageInput> {
            Err(Error::UnreadableSource(format!(
                "stream for page {} is corrupt",
                index
            )))
        }
    }

    let pipeline = ConversionPipeline::new(ConfigProfile::default()).unwrap();
    let result = pipeline.convert(&mut FailingSource);

    assert!(!result.success);
    assert!(matches!(result.error, Some(Error::UnreadableSource(_))));
    assert!(result.output_text.is_none());
}

#[test]
fn cancellation_between_pages_returns_partial_result() {
    // The source trips the cancel token while delivering the last page,
    // so classification never starts and the pipeline stops at the
    // next between-pages check.
    struct CancellingSource {
        inner: MemorySource,
        token: CancelToken,
    }

    impl PageSource for CancellingSource {
        fn metadata(&self) -> DocMetadata {
            self.inner.metadata()
        }
        fn page_count(&self) -> u32 {
            self.inner.page_count()
        }
        fn read_page(&mut self, index: u32) -> pagemark::Result<PageInput> {
            if index + 1 == self.inner.page_count() {
                self.token.cancel();
            }
            self.inner.read_page(index)
        }
    }

    let token = CancelToken::new();
    let mut source = CancellingSource {
        inner: document_source(),
        token: token.clone(),
    };

    let pipeline = ConversionPipeline::new(ConfigProfile::default())
        .unwrap()
        .with_cancel_token(token);
    let result = pipeline.convert(&mut source);

    assert!(!result.success);
    assert!(matches!(result.error, Some(Error::Cancelled)));
}

#[test]
fn table_detection_can_be_disabled() {
    let mut config = ConfigProfile::default();
    config.conversion.table_detection = false;

    let pipeline = ConversionPipeline::new(config).unwrap();
    let result = pipeline.convert(&mut document_source());

    assert!(result.success);
    assert_eq!(result.stats.table_count, 0);
    // Cell text still present, just not as a table
    assert!(result.output_text.unwrap().contains("cell00"));
}

#[test]
fn crlf_profile_produces_no_bare_newlines() {
    let mut config = ConfigProfile::default();
    config.output.line_ending = pagemark::LineEnding::Crlf;

    let pipeline = ConversionPipeline::new(config).unwrap();
    let output = pipeline.convert(&mut document_source()).output_text.unwrap();

    assert!(output.ends_with("\r\n"));
    assert_eq!(output.matches('\n').count(), output.matches("\r\n").count());
}

#[test]
fn metadata_preamble_carries_source_info() {
    let mut config = ConfigProfile::default();
    config.output.include_metadata = true;

    let pipeline = ConversionPipeline::new(config).unwrap();
    let output = pipeline.convert(&mut document_source()).output_text.unwrap();

    assert!(output.starts_with("---\n"));
    assert!(output.contains("title: \"User Guide\""));
    assert!(output.contains("source: \"guide.pdf\""));
    assert!(output.contains("generated: "));
    assert!(output.contains("pages: 2"));
}
