// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![cfg(feature = "conf-loaders")]
#![allow(clippy::missing_panics_doc)] // Tests panic on failure

//! Scheduler construction from YAML configuration files.

use rcmw_sched::config::DEFAULT_GROUP_NAME;
use rcmw_sched::scheduler::TaskRegistry;
use rcmw_sched::{yield_with_state, RoutineState, Scheduler};
use std::io::Write;
use tempfile::NamedTempFile;

const CONF: &str = r#"
scheduler_conf:
  policy: classic
  classic_conf:
    groups:
      - name: control
        processor_num: 2
        tasks:
          - name: planner
            prio: 7
      - name: io
        processor_num: 1
"#;

fn write_conf(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(content.as_bytes()).expect("write conf");
    file
}

#[test]
fn test_missing_file_uses_default_topology() {
    let scheduler =
        Scheduler::from_conf_file("/nonexistent/rcmw/sched.yaml", 3).expect("scheduler");
    assert_eq!(scheduler.task_pool_size(), 3);
    assert_eq!(scheduler.processor_count(), 3);
    assert!(scheduler.runtime().group(DEFAULT_GROUP_NAME).is_some());
    scheduler.shutdown();
}

#[test]
fn test_invalid_file_uses_default_topology() {
    let file = write_conf("scheduler_conf: [not, a, map");
    let scheduler = Scheduler::from_conf_file(file.path(), 1).expect("scheduler");
    assert_eq!(scheduler.processor_count(), 1);
    assert!(scheduler.runtime().group(DEFAULT_GROUP_NAME).is_some());
    scheduler.shutdown();
}

#[test]
fn test_loaded_groups_and_task_conf() {
    let file = write_conf(CONF);
    let scheduler = Scheduler::from_conf_file(file.path(), 1).expect("scheduler");
    assert_eq!(scheduler.task_pool_size(), 2);
    assert_eq!(scheduler.processor_count(), 3);
    assert!(scheduler.runtime().group("io").is_some());
    assert!(scheduler.runtime().group(DEFAULT_GROUP_NAME).is_none());

    assert!(scheduler.create_task(
        || loop {
            yield_with_state(RoutineState::DataWait);
        },
        "planner",
        None,
    ));
    let planner = scheduler
        .routine(TaskRegistry::task_id("planner"))
        .expect("planner");
    assert_eq!(planner.priority(), 7);
    assert_eq!(planner.group_name().as_str(), "control");
    scheduler.shutdown();
}
