//! Basic benchmarks for the `spill_vec` crate.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::iter;
use std::time::Instant;

use alloc_tracker::Allocator;
use criterion::{Criterion, criterion_group, criterion_main};
use spill_vec::SpillVec;

criterion_group!(benches, entrypoint);
criterion_main!(benches);

#[global_allocator]
static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();

type TestItem = u64;
const INLINE_CAPACITY: usize = 16;

fn entrypoint(c: &mut Criterion) {
    let allocs = alloc_tracker::Session::new();

    let mut group = c.benchmark_group("spill_basic");

    let allocs_op = allocs.operation("fill_inline");
    group.bench_function("fill_inline", |b| {
        // The whole point of the container: this operation performs zero
        // allocations, as the session report shows.
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let mut vec: SpillVec<TestItem, INLINE_CAPACITY> = SpillVec::new();

                for value in 0..INLINE_CAPACITY as TestItem {
                    vec.push(black_box(value)).unwrap();
                }

                drop(black_box(vec));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("fill_with_spill");
    group.bench_function("fill_with_spill", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let mut vec: SpillVec<TestItem, INLINE_CAPACITY> = SpillVec::new();

                for value in 0..(INLINE_CAPACITY as TestItem) * 4 {
                    vec.push(black_box(value)).unwrap();
                }

                drop(black_box(vec));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("reserve_exact_1k");
    group.bench_function("reserve_exact_1k", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let mut vec: SpillVec<TestItem, INLINE_CAPACITY> = SpillVec::new();
                vec.reserve(black_box(1000)).unwrap();
                drop(black_box(vec));
            }

            start.elapsed()
        });
    });

    group.finish();

    let mut group = c.benchmark_group("spill_handoff");

    let allocs_op = allocs.operation("transfer_spilled");
    group.bench_function("transfer_spilled", |b| {
        // Stealing a spilled block is constant time regardless of length.
        b.iter_custom(|iters| {
            let mut sources = iter::repeat_with(|| {
                let mut vec: SpillVec<TestItem, INLINE_CAPACITY> = SpillVec::new();
                for value in 0..1000 {
                    vec.push(value).unwrap();
                }
                vec
            })
            .take(usize::try_from(iters).unwrap())
            .collect::<Vec<_>>();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for source in &mut sources {
                let mut target: SpillVec<TestItem, INLINE_CAPACITY> = SpillVec::new();
                target.transfer_from(black_box(source)).unwrap();
                drop(black_box(target));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("detach_attach_round_trip");
    group.bench_function("detach_attach_round_trip", |b| {
        b.iter_custom(|iters| {
            let mut sources = iter::repeat_with(|| {
                let mut vec: SpillVec<TestItem, INLINE_CAPACITY> = SpillVec::new();
                for value in 0..1000 {
                    vec.push(value).unwrap();
                }
                // Tight already, so detaching below does not reallocate.
                vec.shrink_to_fit().unwrap();
                vec
            })
            .take(usize::try_from(iters).unwrap())
            .collect::<Vec<_>>();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for source in &mut sources {
                let block = source
                    .detach_memory()
                    .unwrap()
                    .expect("source had spilled");

                let mut target: SpillVec<TestItem, INLINE_CAPACITY> = SpillVec::new();
                target.attach_memory(black_box(block));
                drop(black_box(target));
            }

            start.elapsed()
        });
    });

    group.finish();

    allocs.print_to_stdout();
}
