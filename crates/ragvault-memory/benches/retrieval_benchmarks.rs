use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use ragvault_core::Chunk;
use ragvault_memory::{rank_chunks, ScoringMode};

const DIM: usize = 384;

fn corpus(size: usize) -> Vec<Arc<Chunk>> {
    (0..size)
        .map(|i| {
            let embedding = (0..DIM)
                .map(|d| ((i * 31 + d * 17) % 97) as f32 / 97.0 - 0.5)
                .collect();
            let text = format!(
                "chunk {i} describes section {} of the maintenance manual and torque values",
                i % 40
            );
            Arc::new(Chunk::new(format!("doc-{i}"), text, embedding))
        })
        .collect()
}

fn bench_search(c: &mut Criterion) {
    let query: Vec<f32> = (0..DIM).map(|d| (d % 13) as f32 / 13.0).collect();
    let mut group = c.benchmark_group("rank_chunks");

    for size in [1_000usize, 5_000] {
        let chunks = corpus(size);
        for (name, mode) in [
            ("semantic", ScoringMode::Semantic),
            ("lexical", ScoringMode::Lexical),
            ("hybrid", ScoringMode::Hybrid),
        ] {
            group.bench_with_input(BenchmarkId::new(name, size), &chunks, |b, chunks| {
                b.iter(|| {
                    rank_chunks(
                        black_box(chunks),
                        black_box(&query),
                        black_box("torque manual"),
                        5,
                        mode,
                    )
                });
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
