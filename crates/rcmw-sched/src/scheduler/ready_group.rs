// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ready groups: per-priority routine queues plus the wake counter their
//! processors park on.
//!
//! # Architecture
//! - `MAX_PRIO` queues, each behind its own `RwLock`; scans take read locks,
//!   insert/remove take the write lock of a single level
//! - A saturating wake counter behind a `Mutex` + `Condvar`: `notify` adds
//!   one and wakes one processor, `wait` consumes one or times out
//!
//! The bounded wait is what turns expired SLEEP routines READY: nothing
//! signals them, the processor rescans at least every `GROUP_WAIT_TIMEOUT`.

use crate::config::{ClassicConf, SchedGroup, DEFAULT_GROUP_NAME, GROUP_WAIT_TIMEOUT, MAX_PRIO};
use crate::croutine::{Routine, RoutineState};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Spins between two progress logs while waiting for a routine to be released.
const REMOVE_LOG_INTERVAL: u64 = 1000;

/// One named group of prioritized ready queues.
pub struct ReadyGroup {
    name: String,
    queues: [RwLock<Vec<Arc<Routine>>>; MAX_PRIO],
    notify_count: Mutex<u32>,
    cv: Condvar,
    stop: AtomicBool,
}

impl ReadyGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            queues: std::array::from_fn(|_| RwLock::new(Vec::new())),
            notify_count: Mutex::new(0),
            cv: Condvar::new(),
            stop: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append `routine` to the queue of its priority (clamped to
    /// `MAX_PRIO - 1`).
    pub fn insert(&self, routine: Arc<Routine>) {
        let level = (routine.priority() as usize).min(MAX_PRIO - 1);
        self.queues[level].write().push(routine);
    }

    /// Next runnable routine, highest priority first, FIFO within a level.
    ///
    /// The returned routine is acquired; the caller must release it.
    pub fn next_routine(&self) -> Option<Arc<Routine>> {
        if self.stop.load(Ordering::Acquire) {
            return None;
        }

        for queue in self.queues.iter().rev() {
            let queue = queue.read();
            for routine in queue.iter() {
                if !routine.acquire() {
                    continue;
                }
                if routine.update_state() == RoutineState::Ready {
                    return Some(Arc::clone(routine));
                }
                routine.release();
            }
        }
        None
    }

    /// Park until notified or `GROUP_WAIT_TIMEOUT` elapses, consuming one
    /// pending notification if there is one.
    pub fn wait(&self) {
        let mut pending = self.notify_count.lock();
        let _ = self
            .cv
            .wait_while_for(&mut pending, |count| *count == 0, GROUP_WAIT_TIMEOUT);
        if *pending > 0 && !self.stop.load(Ordering::Acquire) {
            *pending -= 1;
        }
    }

    /// Count one pending notification and wake one waiter.
    pub fn notify(&self) {
        {
            let mut pending = self.notify_count.lock();
            *pending = pending.saturating_add(1);
        }
        self.cv.notify_one();
    }

    /// Stop handing out routines and release every waiter.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Release);
        *self.notify_count.lock() = u32::MAX;
        self.cv.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Stop `routine`, wait until no processor runs it and unlink it.
    ///
    /// Returns false if the routine is not queued in this group. Blocks as
    /// long as the routine keeps running: there is no timeout.
    pub fn remove_routine(&self, routine: &Routine) -> bool {
        let level = (routine.priority() as usize).min(MAX_PRIO - 1);
        let mut queue = self.queues[level].write();
        let Some(pos) = queue.iter().position(|r| r.id() == routine.id()) else {
            return false;
        };

        let target = Arc::clone(&queue[pos]);
        target.stop();
        let mut spins: u64 = 0;
        while !target.acquire() {
            if spins % REMOVE_LOG_INTERVAL == 0 {
                log::info!(
                    "[ready-group] {}: waiting for task {} to yield",
                    self.name,
                    target.name()
                );
            }
            spins += 1;
            thread::sleep(Duration::from_micros(1));
        }
        queue.remove(pos);
        target.release();
        true
    }

    /// Total queued routines.
    pub fn len(&self) -> usize {
        self.queues.iter().map(|q| q.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending_notifications(&self) -> u32 {
        *self.notify_count.lock()
    }
}

impl std::fmt::Debug for ReadyGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadyGroup")
            .field("name", &self.name)
            .field("routines", &self.len())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// Ready groups of one scheduler, fixed at construction.
#[derive(Debug)]
pub struct SchedulerRuntime {
    groups: HashMap<String, Arc<ReadyGroup>>,
    default_group: Arc<ReadyGroup>,
}

impl SchedulerRuntime {
    /// One [`ReadyGroup`] per configured group name. The first group is the
    /// default; with no groups a [`DEFAULT_GROUP_NAME`] group is created.
    pub fn new(conf: &ClassicConf) -> Self {
        let fallback = [SchedGroup {
            name: DEFAULT_GROUP_NAME.to_string(),
            ..SchedGroup::default()
        }];
        let groups_conf = if conf.groups.is_empty() {
            &fallback[..]
        } else {
            &conf.groups[..]
        };

        let mut groups: HashMap<String, Arc<ReadyGroup>> = HashMap::new();
        for group in groups_conf {
            groups
                .entry(group.name.clone())
                .or_insert_with(|| Arc::new(ReadyGroup::new(group.name.clone())));
        }
        let default_group = Arc::clone(&groups[&groups_conf[0].name]);
        Self {
            groups,
            default_group,
        }
    }

    pub fn group(&self, name: &str) -> Option<&Arc<ReadyGroup>> {
        self.groups.get(name)
    }

    /// Group `name`, or the default group if there is none by that name.
    pub fn group_or_default(&self, name: &str) -> &Arc<ReadyGroup> {
        self.groups.get(name).unwrap_or(&self.default_group)
    }

    pub fn default_group(&self) -> &Arc<ReadyGroup> {
        &self.default_group
    }

    /// Notify group `name`. Returns false for an unknown group.
    pub fn notify(&self, name: &str) -> bool {
        match self.groups.get(name) {
            Some(group) => {
                group.notify();
                true
            }
            None => false,
        }
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn shutdown(&self) {
        for group in self.groups.values() {
            group.shutdown();
        }
    }
}
