// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Processor: one OS thread draining one [`ProcessorContext`].

use super::context::ProcessorContext;
use super::pin_thread::{current_tid, ThreadHandle};
use crate::config::UNBOUND_PARK_TIMEOUT;
use crate::error::{Error, Result};
use parking_lot::{Condvar, Mutex};
use std::os::unix::thread::JoinHandleExt;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{SystemTime, UNIX_EPOCH};

/// Live view of what a processor is doing, for status reports.
#[derive(Debug, Default)]
pub struct ProcessorSnapshot {
    /// Resume time of the running routine (ns since the UNIX epoch), 0 when idle.
    pub execute_start_time: AtomicU64,
    /// Kernel tid of the processor thread.
    pub processor_id: AtomicI32,
    pub routine_name: Mutex<String>,
}

struct Shared {
    running: AtomicBool,
    context: OnceLock<Arc<ProcessorContext>>,
    park: Mutex<()>,
    park_cv: Condvar,
    tid: AtomicI32,
    snapshot: Arc<ProcessorSnapshot>,
}

/// An OS thread executing routines.
pub struct Processor {
    name: String,
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

pub(crate) fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64)
}

impl Processor {
    /// Processor with thread name `name`. No thread runs until
    /// [`bind_context`](Self::bind_context).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(Shared {
                running: AtomicBool::new(true),
                context: OnceLock::new(),
                park: Mutex::new(()),
                park_cv: Condvar::new(),
                tid: AtomicI32::new(-1),
                snapshot: Arc::new(ProcessorSnapshot::default()),
            }),
            thread: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bind `context` and start the thread.
    ///
    /// Returns `Ok(false)` if a context was already bound.
    pub fn bind_context(&self, context: Arc<ProcessorContext>) -> Result<bool> {
        if self.shared.context.set(context).is_err() {
            return Ok(false);
        }

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || shared.run())
            .map_err(|e| {
                Error::ThreadSpawnFailed(format!("processor {}: {}", self.name, e))
            })?;
        *self.thread.lock() = Some(handle);
        Ok(true)
    }

    /// Stop the loop and join the thread. Idempotent.
    pub fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(context) = self.shared.context.get() {
            context.shutdown();
        }
        self.shared.park_cv.notify_all();

        let Some(handle) = self.thread.lock().take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            log::warn!("[processor] {} stopped from its own thread, not joining", self.name);
            return;
        }
        if handle.join().is_err() {
            log::error!("[processor] {} thread panicked", self.name);
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Kernel tid of the processor thread, waiting for the thread to publish
    /// it. `None` if no thread was started.
    pub fn tid(&self) -> Option<i32> {
        if self.thread.lock().is_none() {
            return None;
        }
        loop {
            let tid = self.shared.tid.load(Ordering::Acquire);
            if tid != -1 {
                return Some(tid);
            }
            thread::yield_now();
        }
    }

    /// Native handle of the processor thread, for affinity and policy calls.
    pub fn native_handle(&self) -> Option<ThreadHandle> {
        self.thread.lock().as_ref().map(|h| h.as_pthread_t())
    }

    pub fn snapshot(&self) -> Arc<ProcessorSnapshot> {
        Arc::clone(&self.shared.snapshot)
    }
}

impl Shared {
    fn run(&self) {
        let tid = current_tid();
        self.snapshot.processor_id.store(tid, Ordering::Relaxed);
        self.tid.store(tid, Ordering::Release);
        if let Some(context) = self.context.get() {
            log::debug!("[processor] tid {} serving group {}", tid, context.group_name());
        }

        while self.running.load(Ordering::Acquire) {
            let Some(context) = self.context.get() else {
                let mut parked = self.park.lock();
                let _ = self.park_cv.wait_for(&mut parked, UNBOUND_PARK_TIMEOUT);
                continue;
            };

            match context.next_routine() {
                Some(routine) => {
                    {
                        let mut name = self.snapshot.routine_name.lock();
                        name.clear();
                        name.push_str(routine.name());
                    }
                    self.snapshot
                        .execute_start_time
                        .store(now_nanos(), Ordering::Relaxed);
                    routine.resume();
                    routine.release();
                }
                None => {
                    self.snapshot.execute_start_time.store(0, Ordering::Relaxed);
                    context.wait();
                }
            }
        }
        self.snapshot.execute_start_time.store(0, Ordering::Relaxed);
        log::debug!("[processor] tid {} exiting", tid);
    }
}

impl Drop for Processor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .field("tid", &self.shared.tid.load(Ordering::Relaxed))
            .finish()
    }
}
