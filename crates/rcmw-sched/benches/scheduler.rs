// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Bench code readability over pedantic
#![allow(clippy::missing_panics_doc)] // Benches panic on failure
#![allow(clippy::semicolon_if_nothing_returned)] // Benchmark code formatting

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rcmw_sched::scheduler::{ReadyGroup, TaskRegistry};
use rcmw_sched::{yield_now, yield_with_state, ConcurrentDirectory, Routine, RoutineState, Scheduler};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// ============================================================================
// ConcurrentDirectory Benchmarks
// ============================================================================

/// Benchmark: lookup of a present key in a populated directory
fn bench_directory_get(c: &mut Criterion) {
    let dir: ConcurrentDirectory<u64> = ConcurrentDirectory::new();
    for key in 0..1024 {
        dir.set(key, key);
    }
    c.bench_function("directory_get_hit", |b| {
        let mut key = 0u64;
        b.iter(|| {
            key = (key + 1) & 1023;
            black_box(dir.get(black_box(key)))
        })
    });
}

/// Benchmark: overwrite of an existing key (value swap + deferred free)
fn bench_directory_update(c: &mut Criterion) {
    let dir: ConcurrentDirectory<u64> = ConcurrentDirectory::new();
    for key in 0..1024 {
        dir.set(key, key);
    }
    c.bench_function("directory_set_update", |b| {
        let mut key = 0u64;
        b.iter(|| {
            key = (key + 1) & 1023;
            dir.set(black_box(key), key);
        })
    });
}

// ============================================================================
// Context switch Benchmarks
// ============================================================================

/// Benchmark: resume + yield round trip of one routine
fn bench_resume_yield(c: &mut Criterion) {
    let routine = Routine::new(1, "bench", || loop {
        yield_now();
    });
    c.bench_function("routine_resume_yield", |b| {
        b.iter(|| {
            routine.acquire();
            black_box(routine.resume());
            routine.release();
        })
    });
}

/// Benchmark: next_routine scan over a group with waiting routines ahead
fn bench_next_routine(c: &mut Criterion) {
    let group = ReadyGroup::new("bench");
    for id in 0..32u64 {
        let routine = Routine::new(id, format!("r{}", id), || loop {
            yield_with_state(RoutineState::DataWait);
        });
        routine.set_priority((id % 20) as u32);
        if id != 0 {
            routine.hang_up();
        }
        group.insert(routine);
    }
    c.bench_function("ready_group_next_routine", |b| {
        b.iter(|| {
            let routine = group.next_routine().expect("ready routine");
            routine.release();
        })
    });
}

// ============================================================================
// Scheduler Benchmarks
// ============================================================================

/// Benchmark: notify -> processor wakeup -> routine run
fn bench_notify_round_trip(c: &mut Criterion) {
    let scheduler = Scheduler::with_default_topology(1).expect("scheduler");
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    scheduler.create_task(
        move || loop {
            counter.fetch_add(1, Ordering::Release);
            yield_with_state(RoutineState::DataWait);
        },
        "bench_notify",
        None,
    );
    let id = TaskRegistry::task_id("bench_notify");

    c.bench_function("scheduler_notify_round_trip", |b| {
        b.iter_batched(
            || hits.load(Ordering::Acquire),
            |before| {
                scheduler.notify_task(id);
                while hits.load(Ordering::Acquire) == before {
                    std::hint::spin_loop();
                }
            },
            BatchSize::SmallInput,
        )
    });
    scheduler.shutdown();
}

criterion_group!(
    benches,
    bench_directory_get,
    bench_directory_update,
    bench_resume_yield,
    bench_next_routine,
    bench_notify_round_trip
);
criterion_main!(benches);
