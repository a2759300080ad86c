use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use ts_binning::{HierarchicalBinning, TableDefaults, weighted_equal_bins};
use ts_events::EventSample;

fn make_sample(n: usize) -> EventSample {
    // Deterministic pseudo-random kinematics.
    let frac = |i: usize, a: f64| ((i as f64 * a).sin() * 43758.5453).fract().abs();
    let x: Vec<f64> = (0..n).map(|i| 10f64.powf(-4.0 + 4.0 * frac(i, 12.9898))).collect();
    let q2: Vec<f64> = (0..n).map(|i| 1.0 + 99.0 * frac(i, 78.233)).collect();
    let z: Vec<f64> = (0..n).map(|i| frac(i, 39.425)).collect();
    let mh: Vec<f64> = (0..n).map(|i| 0.3 + 2.0 * frac(i, 93.989)).collect();
    let w: Vec<f64> = (0..n).map(|i| 0.5 + frac(i, 11.135)).collect();
    EventSample::from_columns(
        vec![("X".into(), x), ("Q2".into(), q2), ("Z".into(), z), ("Mh".into(), mh)],
        Some(w),
    )
    .unwrap()
}

fn bench_weighted_equal_bins(c: &mut Criterion) {
    let mut group = c.benchmark_group("weighted_equal_bins");
    for n in [1_000usize, 100_000] {
        let s = make_sample(n);
        let x = s.column("X").unwrap();
        group.bench_with_input(BenchmarkId::new("x_10_bins", n), &n, |b, _| {
            b.iter(|| black_box(weighted_equal_bins(x, s.weights(), 10).unwrap()))
        });
    }
    group.finish();
}

fn bench_hierarchical(c: &mut Criterion) {
    let mut group = c.benchmark_group("hierarchical");
    group.sample_size(10);
    let binning = HierarchicalBinning::default();
    let defaults = TableDefaults::default();
    for n in [10_000usize, 200_000] {
        let s = make_sample(n);
        group.bench_with_input(BenchmarkId::new("x_q2_z_mh_10", n), &n, |b, _| {
            b.iter(|| black_box(binning.build(&s, &defaults).unwrap().table.len()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_weighted_equal_bins, bench_hierarchical);
criterion_main!(benches);
