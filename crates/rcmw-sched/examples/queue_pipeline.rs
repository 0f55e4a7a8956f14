// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Queue pipeline example
//!
//! Two data-driven routines chained through in-memory queues:
//! `producer thread -> raw queue -> scaler routine -> scaled queue -> printer routine`.
//!
//! Usage:
//!   cargo run --example queue_pipeline [conf.yaml]
//!
//! Without a configuration file the default topology is used.

use rcmw_sched::{QueueVisitor, RoutineFactory, Scheduler};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> rcmw_sched::Result<()> {
    let conf_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "conf/sched.yaml".to_string());
    let scheduler = Scheduler::from_conf_file(&conf_path, 2)?;

    let raw = Arc::new(QueueVisitor::<u64>::new());
    let scaled = Arc::new(QueueVisitor::<u64>::new());
    let total = Arc::new(AtomicU64::new(0));

    let scaler = {
        let scaled = Arc::clone(&scaled);
        RoutineFactory::from_visitor(move |sample: u64| scaled.push(sample * 10), Arc::clone(&raw))
    };
    let printer = {
        let total = Arc::clone(&total);
        RoutineFactory::from_visitor(
            move |sample: u64| {
                total.fetch_add(sample, Ordering::Relaxed);
                println!("[printer] {}", sample);
            },
            Arc::clone(&scaled),
        )
    };

    scheduler.create_task_from_factory(&scaler, "scaler");
    scheduler.create_task_from_factory(&printer, "printer");

    for sample in 1..=10 {
        raw.push(sample);
        thread::sleep(Duration::from_millis(5));
    }
    thread::sleep(Duration::from_millis(50));
    scheduler.check_sched_status();

    println!("total = {}", total.load(Ordering::Relaxed));
    scheduler.shutdown();
    Ok(())
}
