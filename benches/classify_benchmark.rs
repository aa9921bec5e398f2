use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pagemark::{
    BoundingBox, ConfigProfile, ConversionPipeline, DocMetadata, MemorySource, PageInput,
    TextFragment,
};

/// Build a synthetic document: every page has a heading, body lines, a
/// bullet list, and a 4x3 aligned grid.
fn synthetic_source(pages: u32, body_lines: u32) -> MemorySource {
    let mut page_inputs = Vec::with_capacity(pages as usize);

    for p in 0..pages {
        let mut page = PageInput::new(p, 612.0, 792.0);
        let mut order = 0u32;
        let mut push = |page: &mut PageInput, text: String, size: f32, x: f32, y: f32| {
            page.fragments.push(TextFragment::new(
                text.clone(),
                size,
                "Helvetica",
                BoundingBox::new(x, y, x + text.len() as f32 * size * 0.5, y + size),
                p,
                order,
            ));
            order += 1;
        };

        let mut y = 740.0;
        push(&mut page, format!("Section {}", p + 1), 20.0, 72.0, y);
        y -= 30.0;

        for i in 0..body_lines {
            push(
                &mut page,
                format!("Body line {} with enough words to look real.", i),
                12.0,
                72.0,
                y,
            );
            y -= 16.0;
        }

        for i in 0..4 {
            push(&mut page, format!("- list entry {}", i), 12.0, 72.0, y);
            y -= 16.0;
        }

        for r in 0..4 {
            for (c, x) in [(0, 72.0), (1, 220.0), (2, 380.0)] {
                push(&mut page, format!("r{}c{}", r, c), 12.0, x, y);
            }
            y -= 16.0;
        }

        page_inputs.push(page);
    }

    MemorySource::new(DocMetadata::default(), page_inputs)
}

fn bench_convert(c: &mut Criterion) {
    let pipeline = ConversionPipeline::new(ConfigProfile::default()).unwrap();

    c.bench_function("convert_10_pages", |b| {
        b.iter(|| {
            let mut source = synthetic_source(10, 25);
            black_box(pipeline.convert(&mut source))
        })
    });

    c.bench_function("convert_dense_page", |b| {
        b.iter(|| {
            let mut source = synthetic_source(1, 200);
            black_box(pipeline.convert(&mut source))
        })
    });
}

fn bench_merge_profile(c: &mut Criterion) {
    let mut config = ConfigProfile::default();
    config.conversion.merge_paragraphs = true;
    config.markdown.paragraph.max_line_length = 80;
    let pipeline = ConversionPipeline::new(config).unwrap();

    c.bench_function("convert_10_pages_merged_wrapped", |b| {
        b.iter(|| {
            let mut source = synthetic_source(10, 25);
            black_box(pipeline.convert(&mut source))
        })
    });
}

criterion_group!(benches, bench_convert, bench_merge_profile);
criterion_main!(benches);
