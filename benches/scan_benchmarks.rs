//! Benchmarks for tag scanning and location.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use marko_assist::{Assistant, HyperclickInspector};
use marko_buffer::Position;
use marko_core::{Config, Document, TagMatcher, TokenScanner, tag_at};
use marko_syntax::MarkoScopeClassifier;

/// Generates a template of nested sections, `blocks` of them.
fn generate_template(blocks: usize) -> String {
    (0..blocks)
        .map(|i| {
            format!(
                "<section id=\"block-{i}\" class=\"card\">\n  <h2>Title {i}</h2>\n  <app-card size=\"large\" on-click(\"open\")/>\n  <ul>\n    <li>${{state.items[{i}]}}</li>\n  </ul>\n</section>\n"
            )
        })
        .collect()
}

/// Benchmarks tokenizing a whole template.
fn bench_tokenize(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenize");

    for size in [10, 100, 1000].iter() {
        let text = generate_template(*size);

        group.bench_with_input(BenchmarkId::new("marko", size), &text, |b, text| {
            b.iter(|| black_box(Document::marko(black_box(text.as_str()))))
        });
    }

    group.finish();
}

/// Benchmarks a full forward scan over every tag.
fn bench_scan_tags(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_tags");

    for size in [10, 100, 1000].iter() {
        let doc = Document::marko(&generate_template(*size));

        group.bench_with_input(BenchmarkId::new("forward", size), &doc, |b, doc| {
            b.iter(|| {
                let scanner = TokenScanner::new(doc, &MarkoScopeClassifier);
                let mut count = 0usize;
                scanner.scan_tags(Position::new(0, 0), |_, _| count += 1);
                black_box(count)
            })
        });
    }

    group.finish();
}

/// Benchmarks locating a tag and its partner far from the cursor.
fn bench_locate(c: &mut Criterion) {
    let mut group = c.benchmark_group("locate");
    let doc = Document::marko(&generate_template(1000));
    let middle = Position::new(doc.end_position().row / 2, 3);

    group.bench_function("tag_at", |b| {
        b.iter(|| {
            let scanner = TokenScanner::new(&doc, &MarkoScopeClassifier);
            black_box(tag_at(&scanner, black_box(middle)))
        })
    });

    group.bench_function("partner_first_section", |b| {
        let matcher = TagMatcher::new(Config::default().tag_matching);
        b.iter(|| {
            let span = matcher.locate(&doc, Position::new(0, 2)).ok().flatten();
            black_box(span.and_then(|span| matcher.partner_of(&doc, &span)))
        })
    });

    group.finish();
}

/// Benchmarks cursor inspection for completion and navigation.
fn bench_inspect(c: &mut Criterion) {
    let mut group = c.benchmark_group("inspect");
    let doc = Document::marko(&generate_template(100));
    let assistant = Assistant::new(Config::default(), None);

    group.bench_function("autocomplete_attribute", |b| {
        b.iter(|| black_box(assistant.inspect(&doc, black_box(Position::new(2, 18)))))
    });

    group.bench_function("hyperclick_literal", |b| {
        let inspector = HyperclickInspector::new(&doc, &MarkoScopeClassifier);
        b.iter(|| black_box(inspector.inspect(black_box(Position::new(2, 34)))))
    });

    group.finish();
}

criterion_group!(benches, bench_tokenize, bench_scan_tags, bench_locate, bench_inspect);
criterion_main!(benches);
