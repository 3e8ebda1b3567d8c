use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use suggest_core::{build_suggest_data, get_suggestions, Item};

fn synthetic_items(count: usize) -> Vec<Arc<Item>> {
    let adjectives = ["blue", "black", "red", "green", "vintage", "classic"];
    let nouns = ["jeans", "jacket", "shirt", "shoes", "bag", "watch"];
    (0..count)
        .map(|i| {
            let adjective = adjectives[i % adjectives.len()];
            let noun = nouns[(i / adjectives.len()) % nouns.len()];
            let weight = (i % 97) + 1;
            let line = format!(
                "{adjective} {noun} {i}\t{weight}\t{{\"classes\": [\"catalog\"], \"group\": \"{noun}{i}\"}}"
            );
            Arc::new(Item::from_line(&line).unwrap())
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let items = synthetic_items(2_000);
    c.bench_function("build_2k_items", |b| {
        b.iter(|| build_suggest_data(&items, 10, 1e-5, false))
    });
}

fn bench_query(c: &mut Criterion) {
    let items = synthetic_items(2_000);
    let data = build_suggest_data(&items, 10, 1e-5, false);
    c.bench_function("query_short_prefix", |b| {
        b.iter(|| get_suggestions(&data, "bl", "bl", &[], &[]))
    });
    c.bench_function("query_with_filters", |b| {
        let include = vec!["catalog".to_string()];
        let exclude = vec!["closed".to_string()];
        b.iter(|| get_suggestions(&data, "blue jea", "blue jea", &include, &exclude))
    });
}

criterion_group!(benches, bench_build, bench_query);
criterion_main!(benches);
