//! Embedding store search benchmarks
//!
//! Measures performance of:
//! - Unfiltered brute-force search in memory and in SQLite
//! - Search with a metadata filter
//! - Result counts

use chainkit_core::{
    key, Embedding, EmbeddingSearchRequest, EmbeddingStore, InMemoryEmbeddingStore, Metadata,
    SqliteEmbeddingStore, TextSegment,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tempfile::TempDir;

const DIMENSION: usize = 384;
const LANGUAGES: &[&str] = &["rust", "python", "javascript", "go", "typescript"];

/// Deterministic pseudo-random vector
fn vector(seed: usize) -> Vec<f32> {
    let mut state = (seed as u64)
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    (0..DIMENSION)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as f32 / u32::MAX as f32) - 0.25
        })
        .collect()
}

fn corpus(count: usize) -> (Vec<Embedding>, Vec<TextSegment>) {
    let embeddings = (0..count).map(|i| Embedding::new(vector(i))).collect();
    let segments = (0..count)
        .map(|i| {
            TextSegment::with_metadata(
                format!("Document {}", i),
                Metadata::new()
                    .put("language", LANGUAGES[i % LANGUAGES.len()])
                    .put("year", 2015 + (i % 10) as i32),
            )
        })
        .collect();
    (embeddings, segments)
}

fn bench_in_memory_search(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("in_memory_search");

    for size in [100, 1_000, 10_000] {
        let store = InMemoryEmbeddingStore::new();
        let (embeddings, segments) = corpus(size);
        runtime
            .block_on(store.add_all(embeddings, Some(segments)))
            .unwrap();

        let request = EmbeddingSearchRequest::builder(vector(usize::MAX / 2))
            .max_results(10)
            .build()
            .unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), &request, |b, request| {
            b.iter(|| runtime.block_on(store.search(black_box(request))).unwrap());
        });
    }

    group.finish();
}

fn bench_filtered_search(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEmbeddingStore::new();
    let (embeddings, segments) = corpus(5_000);
    runtime
        .block_on(store.add_all(embeddings, Some(segments)))
        .unwrap();

    c.bench_function("search_with_filter", |b| {
        let request = EmbeddingSearchRequest::builder(vector(7))
            .max_results(10)
            .filter(key("language").eq("rust").and(key("year").gte(2020)))
            .build()
            .unwrap();
        b.iter(|| runtime.block_on(store.search(black_box(&request))).unwrap());
    });

    c.bench_function("search_without_filter", |b| {
        let request = EmbeddingSearchRequest::builder(vector(7))
            .max_results(10)
            .build()
            .unwrap();
        b.iter(|| runtime.block_on(store.search(black_box(&request))).unwrap());
    });
}

fn bench_sqlite_search(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let temp = TempDir::new().unwrap();
    let store = SqliteEmbeddingStore::open(&temp.path().join("bench.sqlite")).unwrap();
    let (embeddings, segments) = corpus(1_000);
    runtime
        .block_on(store.add_all(embeddings, Some(segments)))
        .unwrap();

    let mut group = c.benchmark_group("sqlite_search");
    for max_results in [1, 10, 100] {
        let request = EmbeddingSearchRequest::builder(vector(3))
            .max_results(max_results)
            .build()
            .unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(max_results),
            &request,
            |b, request| {
                b.iter(|| runtime.block_on(store.search(black_box(request))).unwrap());
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_in_memory_search,
    bench_filtered_search,
    bench_sqlite_search
);
criterion_main!(benches);
