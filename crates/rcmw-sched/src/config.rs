// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scheduler Configuration - Single Source of Truth
//!
//! This module centralizes the scheduler constants and the plain-data
//! configuration handed to [`Scheduler`](crate::Scheduler).
//! **NEVER hardcode these values elsewhere!**
//!
//! # Architecture
//!
//! - **Level 1 (Static)**: compile-time constants (priority levels, stack size, timeouts)
//! - **Level 2 (Dynamic)**: [`RcmwConf`] / [`SchedulerConf`], usually loaded from YAML
//!   (see [`yaml`], feature `conf-loaders`)
//!
//! # Example YAML
//!
//! ```yaml
//! scheduler_conf:
//!   policy: classic
//!   process_level_cpuset: "0-7"
//!   threads:
//!     - name: shm
//!       cpuset: "1"
//!       policy: SCHED_OTHER
//!       prio: 0
//!   classic_conf:
//!     groups:
//!       - name: control
//!         processor_num: 2
//!         affinity: range
//!         cpuset: "0-3"
//!         processor_policy: SCHED_OTHER
//!         processor_prio: 0
//!         tasks:
//!           - name: planner
//!             prio: 10
//! ```

use serde::Deserialize;
use std::time::Duration;

#[cfg(feature = "conf-loaders")]
pub mod yaml;

// =======================================================================
// Scheduling constants
// =======================================================================

/// Number of priority levels per group. Valid priorities are `0..MAX_PRIO`,
/// higher values run first.
pub const MAX_PRIO: usize = 20;

/// Group used when no configuration is available, and for tasks without a
/// configured group.
pub const DEFAULT_GROUP_NAME: &str = "default_grp";

/// Processor count of the default group when neither the configuration nor
/// the caller provides one.
pub const DEFAULT_PROC_NUM: u32 = 2;

/// Stack size of every routine (2 MiB).
pub const STACK_SIZE: usize = 2 * 1024 * 1024;

/// Upper bound a processor stays parked on its group before rescanning.
///
/// SLEEP routines are never signalled, so this bound is what discovers
/// expired wake times.
pub const GROUP_WAIT_TIMEOUT: Duration = Duration::from_millis(1);

/// Park interval of a processor that has no context bound yet.
pub const UNBOUND_PARK_TIMEOUT: Duration = Duration::from_millis(10);

/// Bucket count of the per-id lock directory.
pub const ID_LOCK_BUCKETS: usize = 128;

/// Bucket count of the task name registry.
pub const TASK_REGISTRY_BUCKETS: usize = 256;

// =======================================================================
// Plain-data configuration
// =======================================================================

/// Root configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RcmwConf {
    /// Scheduler section.
    pub scheduler_conf: SchedulerConf,
}

/// Scheduler configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchedulerConf {
    /// Policy name: `classic` (default). `choreography` is accepted and
    /// mapped to classic.
    pub policy: String,
    /// Expected routine count (informational).
    pub routine_num: u32,
    /// Processor count of the fallback default group (0 = [`DEFAULT_PROC_NUM`]).
    pub default_proc_num: u32,
    /// CPU set applied to the scheduler's creating thread, e.g. `"0-7,12"`.
    pub process_level_cpuset: String,
    /// Attributes of named inner threads (see `Scheduler::set_inner_thread_attr`).
    pub threads: Vec<InnerThread>,
    /// Classic policy groups.
    pub classic_conf: ClassicConf,
}

/// Attributes for a named non-processor thread.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InnerThread {
    pub name: String,
    pub cpuset: String,
    /// `SCHED_FIFO`, `SCHED_RR` or `SCHED_OTHER`
    pub policy: String,
    pub prio: u32,
}

/// Classic policy: a list of groups, each served by its own processors.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ClassicConf {
    pub groups: Vec<SchedGroup>,
}

/// One scheduling group.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SchedGroup {
    pub name: String,
    /// Processors (OS threads) serving this group.
    pub processor_num: u32,
    /// `range` (every processor may run on the whole cpuset) or `1to1`
    /// (processor `i` pinned to the `i`-th CPU of the set).
    pub affinity: String,
    pub cpuset: String,
    /// `SCHED_FIFO`, `SCHED_RR` or `SCHED_OTHER`
    pub processor_policy: String,
    /// Real-time priority, or nice value for `SCHED_OTHER`.
    pub processor_prio: i32,
    pub tasks: Vec<ClassicTask>,
}

/// Priority assignment for a named task.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClassicTask {
    pub name: String,
    pub prio: u32,
    /// Filled in from the enclosing group when the configuration is applied.
    pub group_name: String,
}

impl SchedulerConf {
    /// Built-in topology used when no configuration is available: a single
    /// [`DEFAULT_GROUP_NAME`] group with `proc_num` processors.
    pub fn default_topology(proc_num: u32) -> Self {
        let proc_num = if proc_num == 0 {
            DEFAULT_PROC_NUM
        } else {
            proc_num
        };
        Self {
            policy: "classic".to_string(),
            default_proc_num: proc_num,
            classic_conf: ClassicConf {
                groups: vec![SchedGroup {
                    name: DEFAULT_GROUP_NAME.to_string(),
                    processor_num: proc_num,
                    ..SchedGroup::default()
                }],
            },
            ..Self::default()
        }
    }

    /// True when the configuration declares at least one usable group.
    pub fn has_groups(&self) -> bool {
        self.classic_conf
            .groups
            .iter()
            .any(|g| !g.name.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_topology() {
        let conf = SchedulerConf::default_topology(4);
        assert_eq!(conf.classic_conf.groups.len(), 1);
        let group = &conf.classic_conf.groups[0];
        assert_eq!(group.name, DEFAULT_GROUP_NAME);
        assert_eq!(group.processor_num, 4);
        assert!(conf.has_groups());
    }

    #[test]
    fn test_default_topology_zero_procs() {
        let conf = SchedulerConf::default_topology(0);
        assert_eq!(conf.classic_conf.groups[0].processor_num, DEFAULT_PROC_NUM);
    }

    #[test]
    fn test_empty_conf_has_no_groups() {
        assert!(!SchedulerConf::default().has_groups());
    }
}
