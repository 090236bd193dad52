//! Benchmarks for the reconciliation pass.
//!
//! Run with:
//! `cargo bench -p scrollport-core --bench reconcile_bench`

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use scrollport_core::{RowWindow, SelectionRange, VecRowSource, WindowTarget};
use std::hint::black_box;

const ROWS: usize = 100_000;

fn bench_scroll_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconcile/scroll");
    let cleared = SelectionRange::cleared();

    for visible in [25usize, 80, 200] {
        group.throughput(Throughput::Elements(visible as u64));

        group.bench_with_input(BenchmarkId::new("one_row", visible), &visible, |b, &v| {
            let mut source = VecRowSource::numbered(ROWS);
            let mut window = RowWindow::new();
            let mut top = 0usize;
            b.iter(|| {
                top = (top + 1) % (ROWS - v);
                let report = window
                    .reconcile(&mut source, WindowTarget::new(top, v), &cleared)
                    .unwrap();
                black_box(report);
            });
        });

        group.bench_with_input(BenchmarkId::new("page_jump", visible), &visible, |b, &v| {
            let mut source = VecRowSource::numbered(ROWS);
            let mut window = RowWindow::new();
            let mut top = 0usize;
            b.iter(|| {
                top = (top + v * 7) % (ROWS - v);
                let report = window
                    .reconcile(&mut source, WindowTarget::new(top, v), &cleared)
                    .unwrap();
                black_box(report);
            });
        });

        group.bench_with_input(BenchmarkId::new("steady_state", visible), &visible, |b, &v| {
            let mut source = VecRowSource::numbered(ROWS);
            let mut window = RowWindow::new();
            let target = WindowTarget::new(ROWS / 2, v);
            window.reconcile(&mut source, target, &cleared).unwrap();
            b.iter(|| {
                let report = window.reconcile(&mut source, target, &cleared).unwrap();
                black_box(report);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_scroll_steps);
criterion_main!(benches);
