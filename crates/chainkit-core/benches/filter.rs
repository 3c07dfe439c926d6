//! Filter parsing and evaluation benchmarks

use chainkit_core::{key, parse_filter, Metadata};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const EXPRESSION: &str =
    "name = 'Klaus' AND (age >= 42 OR city IN ('Munich', 'Berlin', 'Hamburg')) AND NOT status = 'archived'";

fn sample_metadata() -> Metadata {
    Metadata::new()
        .put("name", "Klaus")
        .put("age", 38)
        .put("city", "Berlin")
        .put("status", "active")
        .put("score", 0.87)
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_filter", |b| {
        b.iter(|| parse_filter(black_box(EXPRESSION)).unwrap());
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let metadata = sample_metadata();
    let parsed = parse_filter(EXPRESSION).unwrap();

    c.bench_function("evaluate_parsed_filter", |b| {
        b.iter(|| parsed.test(black_box(&metadata)).unwrap());
    });

    let built = key("age")
        .gt(30)
        .and(key("score").gte(0.5f32))
        .or(key("name").is_in(["Alice", "Bob"]));

    c.bench_function("evaluate_mixed_width_numbers", |b| {
        b.iter(|| built.test(black_box(&metadata)).unwrap());
    });

    let missing = key("missing").ne("x");
    c.bench_function("evaluate_missing_key", |b| {
        b.iter(|| missing.test(black_box(&metadata)).unwrap());
    });
}

criterion_group!(benches, bench_parse, bench_evaluate);
criterion_main!(benches);
