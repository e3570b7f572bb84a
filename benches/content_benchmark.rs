//! Benchmarks for content stream processing.
//!
//! Run with: cargo bench
//!
//! Documents are generated in memory with a few lines of red Helvetica text per page.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// Creates a document with the given number of pages.
fn create_test_pdf(page_count: usize) -> Document {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::with_capacity(page_count);
    for page in 0..page_count {
        let mut operations = vec![Operation::new("rg", vec![1.into(), 0.into(), 0.into()])];
        for line in 0..40 {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), 10.into()]));
            operations.push(Operation::new("Td", vec![72.into(), (740 - line * 16).into()]));
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(format!(
                    "Page {} line {} - benchmark content for text extraction.",
                    page + 1,
                    line + 1
                ))],
            ));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations }.encode().unwrap_or_default();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font } },
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => page_count as i64,
            "Kids" => kids,
        }),
    );
    let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog);
    doc
}

fn to_bytes(doc: &mut Document) -> Vec<u8> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Benchmark PDF format detection.
fn bench_format_detection(c: &mut Criterion) {
    let pdf_data = to_bytes(&mut create_test_pdf(1));

    c.bench_function("detect_valid_pdf", |b| {
        b.iter(|| pdfrecipe::detect_format_from_bytes(black_box(&pdf_data)).unwrap());
    });
}

/// Benchmark text extraction at various sizes.
fn bench_text_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_extraction");

    for page_count in [1, 5, 10].iter() {
        let doc = create_test_pdf(*page_count);
        let unsorted = pdfrecipe::TextStripper::new(pdfrecipe::TextOptions::default());
        let sorted = pdfrecipe::TextStripper::new(pdfrecipe::TextOptions::default().sorted());

        group.bench_function(format!("{}_pages", page_count), |b| {
            b.iter(|| unsorted.get_text(black_box(&doc)).unwrap());
        });
        group.bench_function(format!("{}_pages_sorted", page_count), |b| {
            b.iter(|| sorted.get_text(black_box(&doc)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark rewriting every page with black text.
fn bench_black_text(c: &mut Criterion) {
    let doc = create_test_pdf(5);

    c.bench_function("black_text_5_pages", |b| {
        b.iter(|| {
            let mut copy = doc.clone();
            pdfrecipe::make_text_black(black_box(&mut copy)).unwrap();
        });
    });
}

criterion_group!(
    benches,
    bench_format_detection,
    bench_text_extraction,
    bench_black_text,
);
criterion_main!(benches);
