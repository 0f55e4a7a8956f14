// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Scheduler: routine lifecycle over a fixed pool of processors.
//!
//! # Architecture
//!
//! ```text
//!  create_task ──> Routine ──> dispatch_task ──> ReadyGroup[prio] ──> notify
//!                                                      │
//!  data arrival ──> notify_processor ──> recheck flag  │
//!                                        + notify ────>│
//!                                                      v
//!                                      Processor threads (next_routine,
//!                                      resume, release, wait)
//! ```
//!
//! All state lives in the [`Scheduler`] value; there is no process-global
//! instance. Notify callbacks hold only a weak reference to its task table,
//! never to the scheduler itself.

pub mod context;
pub mod pin_thread;
pub mod policy;
pub mod processor;
pub mod ready_group;
pub mod registry;

pub use context::{ClassicContext, ProcessorContext};
pub use policy::{ClassicPolicy, SchedPolicy};
pub use processor::{Processor, ProcessorSnapshot};
pub use ready_group::{ReadyGroup, SchedulerRuntime};
pub use registry::TaskRegistry;

use crate::base::ConcurrentDirectory;
use crate::config::{ClassicConf, InnerThread, SchedulerConf, MAX_PRIO};
use crate::croutine::{Routine, RoutineFactory};
use crate::data::NotifySource;
use crate::error::Result;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use processor::now_nanos;
use std::collections::HashMap;
use std::os::unix::thread::JoinHandleExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Cooperative M:N routine scheduler.
///
/// # Example
///
/// ```rust,no_run
/// use rcmw_sched::{yield_with_state, RoutineState, Scheduler};
///
/// let scheduler = Scheduler::with_default_topology(2).expect("scheduler");
/// scheduler.create_task(
///     || loop {
///         // handle available data, then park
///         yield_with_state(RoutineState::DataWait);
///     },
///     "reader",
///     None,
/// );
/// let id = rcmw_sched::scheduler::TaskRegistry::task_id("reader");
/// scheduler.notify_task(id);
/// scheduler.shutdown();
/// ```
pub struct Scheduler {
    table: Arc<TaskTable>,
    policy: SchedPolicy,
    tasks: TaskRegistry,
    /// Per-id dispatch/removal locks, created once and never dropped.
    id_map_mutex: ConcurrentDirectory<Arc<Mutex<()>>>,
    cr_wl_mtx: Mutex<()>,
    contexts: Mutex<Vec<Arc<ProcessorContext>>>,
    processors: Mutex<Vec<Processor>>,
    inner_thr_confs: DashMap<String, InnerThread>,
    process_level_cpuset: String,
    task_pool_size: u32,
}

/// Live routines and their groups: the part of a scheduler that notify
/// callbacks reach.
///
/// A callback may run on a processor thread, so it must never hold the last
/// reference to the [`Scheduler`]: dropping it there would wait for the
/// routine that thread is running.
struct TaskTable {
    runtime: Arc<SchedulerRuntime>,
    id_cr: DashMap<u64, Arc<Routine>>,
    stop: AtomicBool,
    /// Shared by dispatches, exclusive while `stop` is raised.
    lifecycle: RwLock<()>,
}

impl TaskTable {
    fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn routine(&self, id: u64) -> Option<Arc<Routine>> {
        self.id_cr.get(&id).map(|r| Arc::clone(r.value()))
    }

    fn notify(&self, id: u64) -> bool {
        if self.is_stopped() {
            return true;
        }

        let Some(routine) = self.routine(id) else {
            return false;
        };
        if routine.state().is_waiting() {
            routine.request_recheck();
        }
        self.runtime.notify(&routine.group_name());
        true
    }
}

impl Scheduler {
    /// Build a scheduler from `conf` and start its processors.
    ///
    /// A configuration without groups falls back to the default topology
    /// sized by `conf.default_proc_num`.
    pub fn new(conf: SchedulerConf) -> Result<Arc<Self>> {
        let conf = if conf.has_groups() {
            conf
        } else {
            log::warn!("[scheduler] no scheduling groups configured, using default topology");
            let mut fallback = SchedulerConf::default_topology(conf.default_proc_num);
            fallback.process_level_cpuset = conf.process_level_cpuset;
            fallback.threads = conf.threads;
            fallback
        };

        let policy = SchedPolicy::from_conf(&conf);
        let SchedPolicy::Classic(classic) = &policy;
        let runtime = Arc::new(SchedulerRuntime::new(&ClassicConf {
            groups: classic.groups().to_vec(),
        }));
        let task_pool_size = classic
            .groups()
            .first()
            .map_or(0, |g| g.processor_num);

        let scheduler = Arc::new(Self {
            table: Arc::new(TaskTable {
                runtime,
                id_cr: DashMap::new(),
                stop: AtomicBool::new(false),
                lifecycle: RwLock::new(()),
            }),
            policy,
            tasks: TaskRegistry::new(),
            id_map_mutex: ConcurrentDirectory::new(),
            cr_wl_mtx: Mutex::new(()),
            contexts: Mutex::new(Vec::new()),
            processors: Mutex::new(Vec::new()),
            inner_thr_confs: conf
                .threads
                .iter()
                .map(|t| (t.name.clone(), t.clone()))
                .collect(),
            process_level_cpuset: conf.process_level_cpuset.clone(),
            task_pool_size,
        });

        if !scheduler.process_level_cpuset.is_empty() {
            if let Err(e) = scheduler.process_level_resource_control() {
                log::warn!("[scheduler] process level cpuset not applied: {}", e);
            }
        }
        scheduler.create_processors()?;
        log::info!(
            "[scheduler] {} policy, {} processors, {} routines expected",
            scheduler.policy.name(),
            scheduler.processors.lock().len(),
            conf.routine_num
        );
        Ok(scheduler)
    }

    /// Single [`DEFAULT_GROUP_NAME`](crate::config::DEFAULT_GROUP_NAME)
    /// group with `proc_num` processors (0 = `DEFAULT_PROC_NUM`).
    pub fn with_default_topology(proc_num: u32) -> Result<Arc<Self>> {
        Self::new(SchedulerConf::default_topology(proc_num))
    }

    /// Load the configuration at `path`, falling back to the default
    /// topology with `default_proc_num` processors if it is missing or
    /// invalid.
    #[cfg(feature = "conf-loaders")]
    pub fn from_conf_file(
        path: impl AsRef<std::path::Path>,
        default_proc_num: u32,
    ) -> Result<Arc<Self>> {
        let path = path.as_ref();
        match crate::config::yaml::YamlLoader::load_from_file(path) {
            Ok(conf) => {
                log::info!("[scheduler] loaded conf {}", path.display());
                let mut conf = conf.scheduler_conf;
                if conf.default_proc_num == 0 {
                    conf.default_proc_num = default_proc_num;
                }
                Self::new(conf)
            }
            Err(e) => {
                log::warn!("[scheduler] {}, using default topology", e);
                Self::with_default_topology(default_proc_num)
            }
        }
    }

    fn create_processors(&self) -> Result<()> {
        let SchedPolicy::Classic(classic) = &self.policy;
        let mut contexts = self.contexts.lock();
        let mut processors = self.processors.lock();

        for group in classic.groups() {
            let ready_group = self.table.runtime.group_or_default(&group.name);
            let cpus = pin_thread::parse_cpuset(&group.cpuset).unwrap_or_else(|e| {
                log::warn!("[scheduler] group {}: {}", group.name, e);
                Vec::new()
            });

            for index in 0..group.processor_num as usize {
                let context = Arc::new(ProcessorContext::Classic(ClassicContext::new(
                    Arc::clone(ready_group),
                )));
                let processor = Processor::new(format!("{}-{}", group.name, index));
                processor.bind_context(Arc::clone(&context))?;

                if let Some(thread) = processor.native_handle() {
                    if let Err(e) =
                        pin_thread::set_sched_affinity(thread, &cpus, &group.affinity, index)
                    {
                        log::warn!("[scheduler] {}: {}", processor.name(), e);
                    }
                    if let Err(e) = pin_thread::set_sched_policy(
                        thread,
                        &group.processor_policy,
                        group.processor_prio,
                        processor.tid(),
                    ) {
                        log::warn!("[scheduler] {}: {}", processor.name(), e);
                    }
                }
                contexts.push(context);
                processors.push(processor);
            }
        }
        Ok(())
    }

    /// Wrap `func` in a routine named `name` and dispatch it.
    ///
    /// With a `visitor`, every data arrival notifies the routine. Returns
    /// false after shutdown or if a task of that name is already live.
    pub fn create_task<F>(
        &self,
        func: F,
        name: &str,
        visitor: Option<Arc<dyn NotifySource>>,
    ) -> bool
    where
        F: FnMut() + Send + 'static,
    {
        if self.table.is_stopped() {
            log::debug!("[scheduler] stopped, cannot create task {}", name);
            return false;
        }

        let task_id = self.tasks.register(name);
        let routine = Routine::new(task_id, name, func);
        log::info!("[scheduler] create routine: {}", name);

        if !self.dispatch_task(&routine) {
            return false;
        }

        if let Some(visitor) = visitor {
            let table = Arc::downgrade(&self.table);
            visitor.register_notify_callback(Box::new(move || {
                if let Some(table) = table.upgrade() {
                    table.notify(task_id);
                }
            }));
        }
        true
    }

    /// [`create_task`](Self::create_task) with a body and visitor from `factory`.
    pub fn create_task_from_factory(&self, factory: &RoutineFactory, name: &str) -> bool {
        self.create_task(factory.create_routine(), name, factory.data_visitor())
    }

    /// Register `routine` and enqueue it in its group.
    ///
    /// Priority and group come from the task configuration when `routine`'s
    /// name has one; otherwise the routine keeps its priority and joins the
    /// default group. Returns false if the id is already live.
    pub fn dispatch_task(&self, routine: &Arc<Routine>) -> bool {
        // Held until the routine is queued: shutdown cannot snapshot the
        // table between the stop check and the insert.
        let _live = self.table.lifecycle.read();
        if self.table.is_stopped() {
            return false;
        }

        let lock = self.id_lock(routine.id());
        let _guard = lock.lock();

        match self.table.id_cr.entry(routine.id()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                log::warn!("[scheduler] task {} already dispatched", routine.name());
                return false;
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::clone(routine));
            }
        }

        let SchedPolicy::Classic(classic) = &self.policy;
        match classic.task_conf(routine.name()) {
            Some(task) => {
                routine.set_priority(task.prio);
                routine.set_group_name(&task.group_name);
            }
            None => routine.set_group_name(classic.default_group()),
        }
        if routine.priority() as usize >= MAX_PRIO {
            log::warn!(
                "[scheduler] {} prio {} out of range, clamped to {}",
                routine.name(),
                routine.priority(),
                MAX_PRIO - 1
            );
            routine.set_priority((MAX_PRIO - 1) as u32);
        }

        let group = self.table.runtime.group_or_default(&routine.group_name());
        if group.name() != routine.group_name().as_str() {
            log::warn!(
                "[scheduler] {}: unknown group {}, using {}",
                routine.name(),
                routine.group_name(),
                group.name()
            );
            routine.set_group_name(group.name());
        }
        group.insert(Arc::clone(routine));
        group.notify();
        true
    }

    /// Remove the task named `name`. See [`remove_croutine`](Self::remove_croutine).
    pub fn remove_task(&self, name: &str) -> bool {
        if self.table.is_stopped() {
            return true;
        }
        self.remove_croutine(TaskRegistry::task_id(name))
    }

    /// Stop routine `id` and unlink it once no processor runs it.
    ///
    /// Blocks while the routine is running. Returns false for unknown ids.
    pub fn remove_croutine(&self, id: u64) -> bool {
        let lock = self.id_lock(id);
        let _guard = lock.lock();

        let Some((_, routine)) = self.table.id_cr.remove(&id) else {
            return false;
        };
        routine.stop();
        let group = self.table.runtime.group_or_default(&routine.group_name());
        group.remove_routine(&routine)
    }

    /// Signal that routine `id`'s wait condition may be satisfied.
    /// A no-op success after shutdown.
    pub fn notify_task(&self, id: u64) -> bool {
        if self.table.is_stopped() {
            return true;
        }
        self.notify_processor(id)
    }

    /// Set the recheck flag of a waiting routine `id` and wake a processor
    /// of its group. Returns false for unknown ids.
    pub fn notify_processor(&self, id: u64) -> bool {
        self.table.notify(id)
    }

    /// Stop every group, remove every routine, stop and join every processor.
    /// Idempotent.
    pub fn shutdown(&self) {
        {
            let _exclusive = self.table.lifecycle.write();
            if self.table.stop.swap(true, Ordering::AcqRel) {
                return;
            }
        }
        log::info!("[scheduler] shutting down");

        for context in self.contexts.lock().iter() {
            context.shutdown();
        }

        let ids: Vec<u64> = self.table.id_cr.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.remove_croutine(id);
        }

        let processors = std::mem::take(&mut *self.processors.lock());
        for processor in &processors {
            processor.stop();
        }
        self.contexts.lock().clear();
    }

    pub fn is_stopped(&self) -> bool {
        self.table.is_stopped()
    }

    /// Processor count of the first group.
    pub fn task_pool_size(&self) -> u32 {
        self.task_pool_size
    }

    pub fn processor_count(&self) -> usize {
        self.processors.lock().len()
    }

    /// Live routines.
    pub fn task_count(&self) -> usize {
        self.table.id_cr.len()
    }

    pub fn routine(&self, id: u64) -> Option<Arc<Routine>> {
        self.table.routine(id)
    }

    pub fn task_name_by_id(&self, id: u64) -> Option<String> {
        self.tasks.name_of(id)
    }

    pub fn runtime(&self) -> &Arc<SchedulerRuntime> {
        &self.table.runtime
    }

    pub fn policy(&self) -> &SchedPolicy {
        &self.policy
    }

    /// Apply the configured cpuset and OS policy of inner thread `name`
    /// to `thread`. Threads without configuration are left untouched.
    pub fn set_inner_thread_attr<T>(&self, name: &str, thread: &JoinHandle<T>) -> Result<()> {
        let Some(conf) = self.inner_thr_confs.get(name).map(|c| c.value().clone()) else {
            log::debug!("[scheduler] no attributes configured for thread {}", name);
            return Ok(());
        };

        let handle = thread.as_pthread_t();
        let cpus = pin_thread::parse_cpuset(&conf.cpuset)?;
        pin_thread::set_sched_affinity(handle, &cpus, "range", 0)?;
        pin_thread::set_sched_policy(handle, &conf.policy, conf.prio as i32, None)
    }

    /// Replace the inner thread attribute table.
    pub fn set_inner_thread_confs(&self, confs: HashMap<String, InnerThread>) {
        self.inner_thr_confs.clear();
        for (name, conf) in confs {
            self.inner_thr_confs.insert(name, conf);
        }
    }

    /// Pin the calling thread to the process-level cpuset.
    pub fn process_level_resource_control(&self) -> Result<()> {
        let cpus = pin_thread::parse_cpuset(&self.process_level_cpuset)?;
        pin_thread::set_current_thread_affinity(&cpus)
    }

    /// One-line report of what every processor runs, logged at info level:
    /// `tid:routine:elapsed_ms` or `tid:idle`, then `timestamp: <ns>`.
    pub fn check_sched_status(&self) -> String {
        let now = now_nanos();
        let mut report = String::new();
        for processor in self.processors.lock().iter() {
            let snap = processor.snapshot();
            let tid = snap.processor_id.load(Ordering::Relaxed);
            let start = snap.execute_start_time.load(Ordering::Relaxed);
            if start != 0 {
                let elapsed_ms = now.saturating_sub(start) / 1_000_000;
                report.push_str(&format!(
                    "{}:{}:{}, ",
                    tid,
                    snap.routine_name.lock(),
                    elapsed_ms
                ));
            } else {
                report.push_str(&format!("{}:idle, ", tid));
            }
        }
        report.push_str(&format!("timestamp: {}", now));
        log::info!("[scheduler] {}", report);
        report
    }

    fn id_lock(&self, id: u64) -> Arc<Mutex<()>> {
        if let Some(lock) = self.id_map_mutex.get(id) {
            return lock;
        }
        let _guard = self.cr_wl_mtx.lock();
        if let Some(lock) = self.id_map_mutex.get(id) {
            return lock;
        }
        let lock = Arc::new(Mutex::new(()));
        self.id_map_mutex.set(id, Arc::clone(&lock));
        lock
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("policy", &self.policy.name())
            .field("tasks", &self.table.id_cr.len())
            .field("processors", &self.processors.lock().len())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
