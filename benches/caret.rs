//! Benchmarks for caret offset arithmetic.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use codepane::surface::caret::{RunPosition, offset_at, position_at};

fn run_lengths(count: usize) -> Vec<usize> {
    (0..count).map(|i| (i % 7) + usize::from(i % 11 == 0)).collect()
}

fn bench_caret(c: &mut Criterion) {
    let mut group = c.benchmark_group("caret");
    for count in [64, 1_024, 16_384] {
        let lengths = run_lengths(count);
        let total: usize = lengths.iter().sum();
        group.bench_with_input(BenchmarkId::new("position_at", count), &lengths, |b, lengths| {
            b.iter(|| position_at(lengths, black_box(total * 3 / 4)));
        });
        group.bench_with_input(BenchmarkId::new("offset_at", count), &lengths, |b, lengths| {
            b.iter(|| offset_at(lengths, black_box(RunPosition::new(count - 1, 3))));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_caret);
criterion_main!(benches);
