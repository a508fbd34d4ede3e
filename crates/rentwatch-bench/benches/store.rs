//! Store benchmarks: filter evaluation and batch diffing.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rentwatch_bench::fixtures::{generate_listings, populated_store, Scale};
use rentwatch_core::{Filter, ReadQuery};

fn bench_filter_range(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter/range");

    let store = populated_store(Scale::Medium);

    group.bench_function("gte_lte", |b| {
        let query = ReadQuery::new().with_filter(Filter::new().gte("rent", 1000).lte("rent", 2000));

        b.iter(|| {
            black_box(store.read(&query));
        });
    });

    group.bench_function("parsed", |b| {
        let filter = Filter::parse(r#"{"rent": {"gte": 1000, "lte": 2000}, "rooms": {"in": [2, 3]}}"#)
            .unwrap();

        b.iter(|| {
            black_box(store.count(Some(&filter)));
        });
    });

    group.finish();
}

fn bench_filter_string(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter/string");

    let store = populated_store(Scale::Medium);

    group.bench_function("contains", |b| {
        let filter = Filter::new().contains("address", "Oak");

        b.iter(|| {
            black_box(store.count(Some(&filter)));
        });
    });

    group.bench_function("startswith", |b| {
        let filter = Filter::new().starts_with("listing_url", "https://listings.example/99");

        b.iter(|| {
            black_box(store.count(Some(&filter)));
        });
    });

    group.finish();
}

fn bench_find_new_listings(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff/find_new_listings");

    let store = populated_store(Scale::Medium);
    let count = Scale::Medium.count();
    let batch_size = 1_000;

    // Share of the incoming batch already in the store.
    for known_pct in [0usize, 50, 100] {
        let batch = generate_listings(batch_size, count - batch_size * known_pct / 100);

        group.bench_with_input(BenchmarkId::from_parameter(known_pct), &batch, |b, batch| {
            b.iter(|| {
                black_box(store.find_new_listings(batch));
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_filter_range, bench_filter_string, bench_find_new_listings);
criterion_main!(benches);
