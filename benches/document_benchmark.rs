use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use docvault::{generate_master_key, path, payload, Document};
use serde_json::json;

/// A document with `entries` page records and a log of the same length.
fn document(entries: usize) -> Document {
    let mut doc = Document::new();
    for i in 0..entries {
        path::set(
            &mut doc,
            &format!("pages.page-{i}"),
            json!({ "title": format!("Page {i}"), "body": "x".repeat(64) }),
        )
        .unwrap();
        path::set(&mut doc, &format!("logs.{i}"), json!({ "id": i, "agent": "bench" })).unwrap();
    }
    doc
}

fn benchmark_whole_document_encryption(c: &mut Criterion) {
    let mut group = c.benchmark_group("payload_encrypt");
    let master = generate_master_key().unwrap();

    for entries in [10, 100, 1_000] {
        let doc = document(entries);
        let size = serde_json::to_vec(&doc).unwrap().len();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(entries), &doc, |b, doc| {
            b.iter(|| payload::encrypt(black_box(doc), &master).unwrap());
        });
    }
    group.finish();
}

fn benchmark_path_writes(c: &mut Criterion) {
    let mut group = c.benchmark_group("path_set");

    for depth in [1, 4, 16] {
        let path: Vec<String> = (0..depth).map(|i| format!("level{i}")).collect();
        let path = path.join(".");

        group.bench_with_input(BenchmarkId::from_parameter(depth), &path, |b, path| {
            let mut doc = Document::new();
            b.iter(|| path::set(&mut doc, black_box(path), json!(1)).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_whole_document_encryption, benchmark_path_writes);
criterion_main!(benches);
