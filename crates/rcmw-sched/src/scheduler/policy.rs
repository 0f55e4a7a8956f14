// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scheduling policy selection.

use crate::config::{ClassicConf, ClassicTask, SchedGroup, SchedulerConf, DEFAULT_GROUP_NAME};
use std::collections::HashMap;

/// Scheduling policy, selected once from the configuration.
#[derive(Debug, Clone)]
pub enum SchedPolicy {
    /// Named groups of prioritized ready queues.
    Classic(ClassicPolicy),
}

impl SchedPolicy {
    /// Select the policy named by `conf.policy`.
    ///
    /// `classic` (or empty) selects classic. `choreography` is not available
    /// and falls back to classic; so does any unknown name, with a warning.
    pub fn from_conf(conf: &SchedulerConf) -> Self {
        match conf.policy.as_str() {
            "" | "classic" => {}
            "choreography" => {
                log::info!("[scheduler] choreography policy not available, using classic");
            }
            other => {
                log::warn!("[scheduler] invalid scheduler policy {:?}, using classic", other);
            }
        }
        SchedPolicy::Classic(ClassicPolicy::new(conf.classic_conf.clone()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            SchedPolicy::Classic(_) => "classic",
        }
    }
}

/// Group layout and per-task priority assignments of the classic policy.
#[derive(Debug, Clone)]
pub struct ClassicPolicy {
    classic_conf: ClassicConf,
    cr_confs: HashMap<String, ClassicTask>,
}

impl ClassicPolicy {
    pub fn new(classic_conf: ClassicConf) -> Self {
        let mut cr_confs = HashMap::new();
        for group in &classic_conf.groups {
            for task in &group.tasks {
                let mut task = task.clone();
                task.group_name = group.name.clone();
                cr_confs.insert(task.name.clone(), task);
            }
        }
        Self {
            classic_conf,
            cr_confs,
        }
    }

    /// Configured priority and group of task `name`, if any.
    pub fn task_conf(&self, name: &str) -> Option<&ClassicTask> {
        self.cr_confs.get(name)
    }

    pub fn groups(&self) -> &[SchedGroup] {
        &self.classic_conf.groups
    }

    /// Group of tasks without a configured assignment: the first group.
    pub fn default_group(&self) -> &str {
        self.classic_conf
            .groups
            .first()
            .map_or(DEFAULT_GROUP_NAME, |g| g.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conf(policy: &str) -> SchedulerConf {
        let mut conf = SchedulerConf::default_topology(1);
        conf.policy = policy.to_string();
        conf.classic_conf.groups.push(SchedGroup {
            name: "control".into(),
            processor_num: 1,
            tasks: vec![ClassicTask {
                name: "planner".into(),
                prio: 12,
                group_name: String::new(),
            }],
            ..SchedGroup::default()
        });
        conf
    }

    #[test]
    fn test_policy_names_fall_back_to_classic() {
        for name in ["", "classic", "choreography", "bogus"] {
            assert_eq!(SchedPolicy::from_conf(&conf(name)).name(), "classic");
        }
    }

    #[test]
    fn test_task_conf_carries_group() {
        let SchedPolicy::Classic(policy) = SchedPolicy::from_conf(&conf("classic"));
        let task = policy.task_conf("planner").unwrap();
        assert_eq!(task.prio, 12);
        assert_eq!(task.group_name, "control");
        assert!(policy.task_conf("unknown").is_none());
        assert_eq!(policy.default_group(), DEFAULT_GROUP_NAME);
        assert_eq!(policy.groups().len(), 2);
    }
}
