//! Benchmark: invalidation and recompute cost

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use reflow_core::{Cell, Graph, Memo};

fn chain(graph: &Graph, length: usize) -> (Cell<i64>, Memo<i64>) {
    let source = graph.cell("source", 0_i64).unwrap();
    let s = source.clone();
    let mut last = graph.memo("m0", move || Ok(s.get() + 1)).unwrap();
    for i in 1..length {
        let prev = last.clone();
        last = graph.memo(format!("m{i}"), move || Ok(prev.get()? + 1)).unwrap();
    }
    (source, last)
}

fn fan_out(graph: &Graph, width: usize) -> (Cell<i64>, Memo<i64>) {
    let source = graph.cell("source", 0_i64).unwrap();
    let branches: Vec<Memo<i64>> = (0..width)
        .map(|i| {
            let s = source.clone();
            graph
                .memo(format!("branch{i}"), move || Ok(s.get() * i as i64))
                .unwrap()
        })
        .collect();
    let sink = graph
        .memo("sink", move || {
            let mut total = 0;
            for branch in &branches {
                total += branch.get()?;
            }
            Ok(total)
        })
        .unwrap();
    (source, sink)
}

fn benchmark_cached_read(c: &mut Criterion) {
    let graph = Graph::new();
    let (_source, last) = chain(&graph, 64);
    last.get().unwrap();

    c.bench_function("cached_read", |b| b.iter(|| black_box(last.get().unwrap())));
}

fn benchmark_chain_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_update");
    for length in [8, 64, 256] {
        let graph = Graph::new();
        let (source, last) = chain(&graph, length);
        last.get().unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(length), &length, |b, _| {
            let mut value = 0;
            b.iter(|| {
                value += 1;
                source.set(value);
                black_box(last.get().unwrap())
            });
        });
    }
    group.finish();
}

fn benchmark_fan_out_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out_update");
    for width in [8, 64, 256] {
        let graph = Graph::new();
        let (source, sink) = fan_out(&graph, width);
        sink.get().unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            let mut value = 0;
            b.iter(|| {
                value += 1;
                source.set(value);
                black_box(sink.get().unwrap())
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_cached_read,
    benchmark_chain_update,
    benchmark_fan_out_update
);
criterion_main!(benches);
