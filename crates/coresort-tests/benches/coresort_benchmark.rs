use coresort::{Region, SortImage};
use coresort_runtime::{indirect_sort, run_indirect_sort, FixedCoreId, SortOptions};
use coresort_tests::{identity, lcg_values};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use std::hint::black_box;

// ─── Slice form ──────────────────────────────────────────────────────────────

fn slice_sort_500_bench(c: &mut Criterion) {
    let values = lcg_values(500, 42, 10_000);
    c.bench_function("indirect sort 500 slice", |b| {
        b.iter_batched(
            || identity(values.len()),
            |mut indices| indirect_sort(black_box(&mut indices), black_box(&values)),
            BatchSize::SmallInput,
        )
    });
}

// ─── Region-resident form ────────────────────────────────────────────────────

fn region_sort_500_bench(c: &mut Criterion) {
    let image = SortImage::new().with_core(lcg_values(500, 42, 10_000));
    let region: Region = match image.build() {
        Ok(region) => region,
        Err(e) => panic!("benchmark image: {e:#}"),
    };
    c.bench_function("indirect sort 500 in region", |b| {
        b.iter_batched_ref(
            || region.clone(),
            |region| {
                run_indirect_sort(region, &mut FixedCoreId(black_box(0)), &SortOptions::default())
            },
            BatchSize::LargeInput,
        )
    });
}

fn region_sort_8_cores_bench(c: &mut Criterion) {
    let image = (0..8).fold(SortImage::new(), |image, seed| {
        image.with_core(lcg_values(64, seed, 1_000))
    });
    let region: Region = match image.build() {
        Ok(region) => region,
        Err(e) => panic!("benchmark image: {e:#}"),
    };
    c.bench_function("indirect sort 8 cores x 64 in region", |b| {
        b.iter_batched_ref(
            || region.clone(),
            |region| coresort::run_all_cores(region, 8, &SortOptions::default()),
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    slice_sort_500_bench,
    region_sort_500_bench,
    region_sort_8_cores_bench
);
criterion_main!(benches);
