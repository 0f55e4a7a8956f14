// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic
#![allow(clippy::missing_panics_doc)] // Tests panic on failure
#![allow(clippy::items_after_statements)] // Test helpers
#![allow(clippy::redundant_closure_for_method_calls)] // Test code clarity

//! Scheduler lifecycle integration tests
//!
//! Create / duplicate / notify / remove / shutdown through the public API.

use parking_lot::Mutex;
use rcmw_sched::config::{ClassicTask, SchedGroup, SchedulerConf};
use rcmw_sched::scheduler::TaskRegistry;
use rcmw_sched::{yield_with_state, RoutineState, Scheduler};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    cond()
}

/// Body that counts every resume and parks in DATA_WAIT.
fn counting_body(hits: &Arc<AtomicUsize>) -> impl FnMut() + Send + 'static {
    let hits = Arc::clone(hits);
    move || loop {
        hits.fetch_add(1, Ordering::SeqCst);
        yield_with_state(RoutineState::DataWait);
    }
}

#[test]
fn test_create_notify_remove_scenario() {
    let scheduler = Scheduler::with_default_topology(2).expect("scheduler");
    let hits = Arc::new(AtomicUsize::new(0));

    assert!(scheduler.create_task(counting_body(&hits), "A", None));
    assert!(!scheduler.create_task(counting_body(&hits), "A", None));

    // First dispatch runs the body once, then it parks
    assert!(wait_until(Duration::from_secs(5), || hits.load(Ordering::SeqCst) == 1));
    let id = TaskRegistry::task_id("A");
    assert!(wait_until(Duration::from_secs(5), || {
        scheduler
            .routine(id)
            .is_some_and(|r| r.state() == RoutineState::DataWait)
    }));

    assert!(scheduler.notify_task(id));
    assert!(wait_until(Duration::from_millis(500), || hits.load(Ordering::SeqCst) == 2));

    assert!(scheduler.remove_task("A"));
    assert!(!scheduler.remove_task("A"));
    assert!(!scheduler.remove_task("unknown"));
    assert!(!scheduler.notify_task(id));

    scheduler.shutdown();
}

#[test]
fn test_duplicate_create_is_rejected_concurrently() {
    let scheduler = Scheduler::with_default_topology(2).expect("scheduler");
    let hits = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let scheduler = Arc::clone(&scheduler);
            let barrier = Arc::clone(&barrier);
            let body = counting_body(&hits);
            thread::spawn(move || {
                barrier.wait();
                scheduler.create_task(body, "contended", None)
            })
        })
        .collect();

    let created = handles
        .into_iter()
        .map(|h| h.join().expect("creator panicked"))
        .filter(|&ok| ok)
        .count();
    assert_eq!(created, 1);
    assert_eq!(scheduler.task_count(), 1);
    scheduler.shutdown();
}

#[test]
fn test_priority_ordering_single_processor() {
    let mut conf = SchedulerConf::default_topology(1);
    conf.classic_conf.groups[0].tasks = vec![
        ClassicTask {
            name: "low".into(),
            prio: 1,
            group_name: String::new(),
        },
        ClassicTask {
            name: "high".into(),
            prio: 10,
            group_name: String::new(),
        },
        ClassicTask {
            name: "gate".into(),
            prio: 0,
            group_name: String::new(),
        },
    ];
    let scheduler = Scheduler::new(conf).expect("scheduler");

    // Hold the only processor until both contenders are queued
    let started = Arc::new(AtomicBool::new(false));
    let open = Arc::new(AtomicBool::new(false));
    {
        let started = Arc::clone(&started);
        let open = Arc::clone(&open);
        assert!(scheduler.create_task(
            move || {
                started.store(true, Ordering::SeqCst);
                while !open.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(1));
                }
            },
            "gate",
            None,
        ));
    }
    assert!(wait_until(Duration::from_secs(5), || started.load(Ordering::SeqCst)));

    let order = Arc::new(Mutex::new(Vec::new()));
    for name in ["low", "high"] {
        let order = Arc::clone(&order);
        assert!(scheduler.create_task(
            move || {
                order.lock().push(name);
                loop {
                    yield_with_state(RoutineState::DataWait);
                }
            },
            name,
            None,
        ));
    }

    open.store(true, Ordering::SeqCst);
    assert!(wait_until(Duration::from_secs(5), || order.lock().len() == 2));
    assert_eq!(*order.lock(), vec!["high", "low"]);
    scheduler.shutdown();
}

#[test]
fn test_remove_waits_for_running_body() {
    let scheduler = Scheduler::with_default_topology(1).expect("scheduler");
    let entered = Arc::new(AtomicBool::new(false));
    let yielded = Arc::new(AtomicBool::new(false));
    let runs = Arc::new(AtomicUsize::new(0));
    {
        let entered = Arc::clone(&entered);
        let yielded = Arc::clone(&yielded);
        let runs = Arc::clone(&runs);
        assert!(scheduler.create_task(
            move || loop {
                runs.fetch_add(1, Ordering::SeqCst);
                entered.store(true, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(50));
                yielded.store(true, Ordering::SeqCst);
                yield_with_state(RoutineState::Ready);
            },
            "busy",
            None,
        ));
    }
    assert!(wait_until(Duration::from_secs(5), || entered.load(Ordering::SeqCst)));

    assert!(scheduler.remove_task("busy"));
    assert!(yielded.load(Ordering::SeqCst));

    // Removed routines never run again
    let after = runs.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(30));
    assert_eq!(runs.load(Ordering::SeqCst), after);
    assert_eq!(scheduler.task_count(), 0);
    scheduler.shutdown();
}

#[test]
fn test_sleeping_routine_wakes_without_notify() {
    let scheduler = Scheduler::with_default_topology(1).expect("scheduler");
    let hits = Arc::new(AtomicUsize::new(0));
    {
        let hits = Arc::clone(&hits);
        assert!(scheduler.create_task(
            move || loop {
                hits.fetch_add(1, Ordering::SeqCst);
                rcmw_sched::sleep(Duration::from_millis(5));
            },
            "ticker",
            None,
        ));
    }
    assert!(wait_until(Duration::from_secs(5), || hits.load(Ordering::SeqCst) >= 3));
    scheduler.shutdown();
}

#[test]
fn test_shutdown_is_idempotent_and_complete() {
    let scheduler = Scheduler::with_default_topology(2).expect("scheduler");
    let hits = Arc::new(AtomicUsize::new(0));
    for i in 0..5 {
        assert!(scheduler.create_task(counting_body(&hits), &format!("t{}", i), None));
    }
    assert!(wait_until(Duration::from_secs(5), || hits.load(Ordering::SeqCst) == 5));

    scheduler.shutdown();
    assert!(scheduler.is_stopped());
    assert_eq!(scheduler.task_count(), 0);
    assert_eq!(scheduler.processor_count(), 0);
    for group in scheduler.runtime().group_names() {
        let group = scheduler.runtime().group(group).expect("group");
        assert!(group.is_empty());
        assert!(group.is_stopped());
    }

    scheduler.shutdown();
    assert!(!scheduler.create_task(counting_body(&hits), "late", None));
    assert!(scheduler.notify_task(TaskRegistry::task_id("t0")));
}

#[test]
fn test_create_racing_shutdown_leaves_nothing_behind() {
    const CREATORS: usize = 4;

    for round in 0..50 {
        let scheduler = Scheduler::with_default_topology(1).expect("scheduler");
        let hits = Arc::new(AtomicUsize::new(0));
        let start = Arc::new(Barrier::new(CREATORS + 1));

        let creators: Vec<_> = (0..CREATORS)
            .map(|c| {
                let scheduler = Arc::clone(&scheduler);
                let hits = Arc::clone(&hits);
                let start = Arc::clone(&start);
                thread::spawn(move || {
                    start.wait();
                    let mut i = 0;
                    while !scheduler.is_stopped() {
                        let name = format!("race-{}-{}-{}", round, c, i);
                        scheduler.create_task(counting_body(&hits), &name, None);
                        i += 1;
                    }
                    // One more attempt once the stop is visible
                    let name = format!("race-{}-{}-late", round, c);
                    assert!(!scheduler.create_task(counting_body(&hits), &name, None));
                })
            })
            .collect();

        start.wait();
        thread::sleep(Duration::from_micros(fastrand::u64(0..500)));
        scheduler.shutdown();

        assert_eq!(scheduler.task_count(), 0, "round {}", round);
        for group in scheduler.runtime().group_names() {
            let group = scheduler.runtime().group(group).expect("group");
            assert!(group.is_empty(), "round {}: group {} not empty", round, group.name());
        }
        for creator in creators {
            creator.join().expect("creator panicked");
        }
        assert_eq!(scheduler.task_count(), 0, "round {}", round);
    }
}

#[test]
fn test_tasks_routed_to_configured_groups() {
    let mut conf = SchedulerConf::default_topology(1);
    conf.classic_conf.groups.push(SchedGroup {
        name: "io".into(),
        processor_num: 1,
        tasks: vec![ClassicTask {
            name: "reader".into(),
            prio: 3,
            group_name: String::new(),
        }],
        ..SchedGroup::default()
    });
    let scheduler = Scheduler::new(conf).expect("scheduler");
    assert_eq!(scheduler.processor_count(), 2);

    let hits = Arc::new(AtomicUsize::new(0));
    assert!(scheduler.create_task(counting_body(&hits), "reader", None));
    assert!(wait_until(Duration::from_secs(5), || hits.load(Ordering::SeqCst) == 1));

    let io = scheduler.runtime().group("io").expect("io group");
    assert_eq!(io.len(), 1);
    assert_eq!(
        scheduler
            .routine(TaskRegistry::task_id("reader"))
            .map(|r| r.priority()),
        Some(3)
    );
    scheduler.shutdown();
}

#[test]
fn test_status_report_names_running_routine() {
    let scheduler = Scheduler::with_default_topology(1).expect("scheduler");
    let running = Arc::new(AtomicBool::new(false));
    let release = Arc::new(AtomicBool::new(false));
    {
        let running = Arc::clone(&running);
        let release = Arc::clone(&release);
        assert!(scheduler.create_task(
            move || {
                running.store(true, Ordering::SeqCst);
                while !release.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(1));
                }
            },
            "long_job",
            None,
        ));
    }
    assert!(wait_until(Duration::from_secs(5), || running.load(Ordering::SeqCst)));
    let report = scheduler.check_sched_status();
    assert!(report.contains(":long_job:"), "report: {}", report);

    release.store(true, Ordering::SeqCst);
    scheduler.shutdown();
}
