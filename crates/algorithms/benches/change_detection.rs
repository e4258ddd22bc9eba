//! Benchmarks for the change detection stages

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use geodiff_algorithms::imagery::{absolute_difference, normalize_difference, threshold_mask, DegeneratePolicy};
use geodiff_algorithms::morphology::{clean_mask, CleanParams};
use geodiff_algorithms::pipeline::{detect_changes, ChangeDetectionParams};
use geodiff_algorithms::vector::polygonize;
use geodiff_core::{GeoTransform, Raster};

fn create_pair(size: usize) -> (Raster<f64>, Raster<f64>) {
    let mut before = Raster::new(size, size);
    before.set_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0));
    let mut after = before.clone();
    for row in 0..size {
        for col in 0..size {
            let v = ((row * 7 + col * 13) % 256) as f64;
            before.set(row, col, v).unwrap();
            // Blocky changes plus low-amplitude texture
            let bump = if (row / 64 + col / 48) % 5 == 0 { 120.0 } else { 0.0 };
            after.set(row, col, v + bump + ((row * col) % 7) as f64).unwrap();
        }
    }
    (before, after)
}

fn bench_difference(c: &mut Criterion) {
    let mut group = c.benchmark_group("change/difference");
    for size in [256, 512, 1024, 2048] {
        let (before, after) = create_pair(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| absolute_difference(black_box(&before), black_box(&after)).unwrap())
        });
    }
    group.finish();
}

fn bench_threshold(c: &mut Criterion) {
    let mut group = c.benchmark_group("change/otsu");
    for size in [256, 512, 1024, 2048] {
        let (before, after) = create_pair(size);
        let diff = absolute_difference(&before, &after).unwrap();
        let intensity = normalize_difference(&diff, DegeneratePolicy::ZeroFill).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| threshold_mask(black_box(&intensity)))
        });
    }
    group.finish();
}

fn bench_clean_and_polygonize(c: &mut Criterion) {
    let mut group = c.benchmark_group("change/clean_polygonize");
    let params = CleanParams::default();
    for size in [256, 512, 1024] {
        let (before, after) = create_pair(size);
        let diff = absolute_difference(&before, &after).unwrap();
        let intensity = normalize_difference(&diff, DegeneratePolicy::ZeroFill).unwrap();
        let (mask, _) = threshold_mask(&intensity);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let mut m = mask.clone();
                clean_mask(&mut m, &params);
                polygonize(black_box(&m), params.connectivity).unwrap()
            })
        });
    }
    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("change/detect");
    group.sample_size(10);
    let params = ChangeDetectionParams::default();
    for size in [512, 1024] {
        let (before, after) = create_pair(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| detect_changes(black_box(&before), black_box(&after), &params).unwrap())
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_difference,
    bench_threshold,
    bench_clean_and_polygonize,
    bench_pipeline,
);
criterion_main!(benches);
