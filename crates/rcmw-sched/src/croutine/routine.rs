// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stackful routine and its state machine.
//!
//! A [`Routine`] owns a private stack and a body closure. Processors pick a
//! routine, [`Routine::acquire`] it, [`Routine::resume`] it (switching onto
//! its stack until the body yields) and [`Routine::release`] it.
//!
//! # State machine
//!
//! ```text
//!            yield(DATA_WAIT/IO_WAIT)          notify + update_state
//!   READY ---------------------------> WAIT ------------------------> READY
//!   READY ---------------------------> SLEEP ---- wake time passed --> READY
//!   READY ---- body returns / stop ---> FINISHED (terminal)
//! ```
//!
//! Bodies never run preemptively: the only switch points are the yield
//! functions of this module ([`yield_now`], [`yield_with_state`], [`sleep`]).

use super::context::{make_context, swap_context, RoutineContext};
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::cell::{Cell, UnsafeCell};
use std::ffi::c_void;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Boxed routine body.
pub type RoutineFunc = Box<dyn FnMut() + Send>;

/// Routine execution state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutineState {
    Ready = 0,
    Finished = 1,
    Sleep = 2,
    IoWait = 3,
    DataWait = 4,
}

impl RoutineState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RoutineState::Ready,
            1 => RoutineState::Finished,
            2 => RoutineState::Sleep,
            3 => RoutineState::IoWait,
            _ => RoutineState::DataWait,
        }
    }

    /// DATA_WAIT or IO_WAIT.
    pub fn is_waiting(self) -> bool {
        matches!(self, RoutineState::DataWait | RoutineState::IoWait)
    }
}

impl fmt::Display for RoutineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoutineState::Ready => "READY",
            RoutineState::Finished => "FINISHED",
            RoutineState::Sleep => "SLEEP",
            RoutineState::IoWait => "IO_WAIT",
            RoutineState::DataWait => "DATA_WAIT",
        };
        f.write_str(s)
    }
}

// Only the running routine and the main stack pointer are thread-local.
// Accesses go through the #[inline(never)] helpers below so no TLS address
// is cached across a stack switch (a routine may resume on another thread).
thread_local! {
    static CURRENT_ROUTINE: Cell<*const Routine> = const { Cell::new(ptr::null()) };
    static MAIN_STACK: Cell<*mut u8> = const { Cell::new(ptr::null_mut()) };
    static THREAD_TOKEN: u8 = const { 0 };
}

#[inline(never)]
fn main_stack_slot() -> *mut *mut u8 {
    MAIN_STACK.with(Cell::as_ptr)
}

#[inline(never)]
fn current_ptr() -> *const Routine {
    CURRENT_ROUTINE.with(Cell::get)
}

#[inline(never)]
fn set_current_ptr(routine: *const Routine) {
    CURRENT_ROUTINE.with(|c| c.set(routine));
}

/// Non-zero identity of the calling OS thread, valid while it lives.
#[inline(never)]
fn thread_token() -> usize {
    THREAD_TOKEN.with(|t| t as *const u8 as usize)
}

/// A stackful unit of execution.
///
/// Dropping a routine whose body is suspended mid-way frees its stack
/// without unwinding it: locals of the suspended body are leaked.
pub struct Routine {
    id: u64,
    name: String,
    group_name: ArcSwap<String>,
    priority: AtomicU32,
    state: AtomicU8,
    /// Thread token of the holder, 0 when free.
    owner: AtomicUsize,
    /// Recheck pending: set by notify, consumed by `update_state`.
    updated: AtomicBool,
    force_stop: AtomicBool,
    wake_time: Mutex<Instant>,
    func: UnsafeCell<RoutineFunc>,
    context: UnsafeCell<RoutineContext>,
}

// SAFETY: `func` and `context` are only touched by the thread that holds the
// acquire flag (checked in `resume`), or by the routine's own body while that
// thread has switched into it. Everything else is atomics or locks.
unsafe impl Send for Routine {}
unsafe impl Sync for Routine {}

extern "C" fn routine_entry(arg: *mut c_void) {
    // SAFETY: `arg` is the Arc payload of the routine owning this stack. The
    // routine outlives every resume since `resume` borrows it.
    let routine = unsafe { &*(arg as *const Routine) };
    routine.run_body();
    routine.set_state(RoutineState::Finished);
    // There is no frame to return into; park on the main stack forever.
    loop {
        yield_now();
    }
}

impl Routine {
    /// Create a READY routine with its own [`STACK_SIZE`](crate::config::STACK_SIZE) stack.
    pub fn new<F>(id: u64, name: impl Into<String>, func: F) -> Arc<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let routine = Arc::new(Self {
            id,
            name: name.into(),
            group_name: ArcSwap::from_pointee(String::new()),
            priority: AtomicU32::new(0),
            state: AtomicU8::new(RoutineState::Ready as u8),
            owner: AtomicUsize::new(0),
            updated: AtomicBool::new(false),
            force_stop: AtomicBool::new(false),
            wake_time: Mutex::new(Instant::now()),
            func: UnsafeCell::new(Box::new(func)),
            context: UnsafeCell::new(RoutineContext::new()),
        });
        let arg = Arc::as_ptr(&routine) as *mut c_void;
        // SAFETY: the Arc was just created, nothing else can observe the context.
        make_context(routine_entry, arg, unsafe { &mut *routine.context.get() });
        routine
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group_name(&self) -> Arc<String> {
        self.group_name.load_full()
    }

    pub fn set_group_name(&self, name: &str) {
        self.group_name.store(Arc::new(name.to_string()));
    }

    pub fn priority(&self) -> u32 {
        self.priority.load(Ordering::Relaxed)
    }

    pub fn set_priority(&self, priority: u32) {
        self.priority.store(priority, Ordering::Relaxed);
    }

    pub fn state(&self) -> RoutineState {
        RoutineState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, state: RoutineState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Try to take exclusive execution rights. Returns false if held.
    pub fn acquire(&self) -> bool {
        self.owner
            .compare_exchange(0, thread_token(), Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    pub fn release(&self) {
        self.owner.store(0, Ordering::Release);
    }

    /// True while some thread holds the acquire flag.
    pub fn is_acquired(&self) -> bool {
        self.owner.load(Ordering::Acquire) != 0
    }

    /// Promote the state to READY if its wait condition is met:
    /// SLEEP past its wake time, or DATA_WAIT/IO_WAIT with a pending recheck.
    /// The recheck flag is consumed only by that promotion.
    pub fn update_state(&self) -> RoutineState {
        let state = self.state();
        match state {
            RoutineState::Sleep if Instant::now() >= *self.wake_time.lock() => {
                self.set_state(RoutineState::Ready);
                RoutineState::Ready
            }
            RoutineState::DataWait | RoutineState::IoWait
                if self.updated.swap(false, Ordering::AcqRel) =>
            {
                self.set_state(RoutineState::Ready);
                RoutineState::Ready
            }
            _ => state,
        }
    }

    /// Switch into the routine until it yields, then return its state.
    ///
    /// The calling thread must hold the acquire flag. A force-stopped routine
    /// reports FINISHED without running; a routine that is not READY is left
    /// alone.
    pub fn resume(&self) -> RoutineState {
        if self.force_stop.load(Ordering::Acquire) {
            self.set_state(RoutineState::Finished);
            return RoutineState::Finished;
        }

        let state = self.state();
        if state != RoutineState::Ready {
            log::error!("[routine] invalid state {} for resume of {}", state, self.name);
            return state;
        }

        if self.owner.load(Ordering::Acquire) != thread_token() {
            log::error!("[routine] {} resumed without holding it", self.name);
            return state;
        }

        set_current_ptr(self as *const Routine);
        // SAFETY: we hold the acquire flag so no other thread switches into
        // this context, and the routine is borrowed for the whole switch.
        unsafe {
            swap_context(main_stack_slot(), self.stack_slot());
        }
        set_current_ptr(ptr::null());
        self.state()
    }

    /// Request termination: the next `resume` reports FINISHED instead of
    /// running the body.
    pub fn stop(&self) {
        self.force_stop.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.force_stop.load(Ordering::Acquire)
    }

    /// Move a non-finished routine back to READY.
    pub fn wake(&self) {
        if self.state() != RoutineState::Finished {
            self.set_state(RoutineState::Ready);
        }
    }

    /// Park the routine until data arrives.
    pub fn hang_up(&self) {
        self.set_state(RoutineState::DataWait);
    }

    /// Mark the wait condition as possibly satisfied.
    pub fn request_recheck(&self) {
        self.updated.store(true, Ordering::Release);
    }

    pub fn recheck_pending(&self) -> bool {
        self.updated.load(Ordering::Acquire)
    }

    fn stack_slot(&self) -> *mut *mut u8 {
        // SAFETY: only the address of the field is taken.
        unsafe { ptr::addr_of_mut!((*self.context.get()).sp) }
    }

    fn run_body(&self) {
        // SAFETY: reached only from `routine_entry`, on this routine's stack,
        // while the resuming thread holds the acquire flag.
        let func = unsafe { &mut *self.func.get() };
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(func)) {
            log::error!(
                "[routine] {} panicked: {}",
                self.name,
                panic_message(payload.as_ref())
            );
        }
    }
}

impl fmt::Debug for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Routine")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("group", &self.group_name())
            .field("priority", &self.priority())
            .field("state", &self.state())
            .field("acquired", &self.is_acquired())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "<non-string panic payload>"
    }
}

fn with_current<R>(f: impl FnOnce(&Routine) -> R) -> Option<R> {
    let current = current_ptr();
    if current.is_null() {
        return None;
    }
    // SAFETY: non-null only while `resume` of this routine is on the stack
    // of the thread currently executing it.
    Some(f(unsafe { &*current }))
}

#[inline(never)]
fn switch_to_main(routine: &Routine) {
    // SAFETY: we are running on `routine`'s stack, entered from the main
    // stack of this thread via `resume`.
    unsafe {
        swap_context(routine.stack_slot(), main_stack_slot());
    }
}

/// Yield back to the processor without changing the state.
pub fn yield_now() {
    let current = current_ptr();
    if current.is_null() {
        log::warn!("[routine] yield called outside of a routine");
        return;
    }
    // SAFETY: see `with_current`.
    switch_to_main(unsafe { &*current });
}

/// Set the current routine's state, then yield.
pub fn yield_with_state(state: RoutineState) {
    if with_current(|r| r.set_state(state)).is_none() {
        log::warn!("[routine] yield called outside of a routine");
        return;
    }
    yield_now();
}

/// Suspend the current routine for at least `duration`.
pub fn sleep(duration: Duration) {
    if with_current(|r| *r.wake_time.lock() = Instant::now() + duration).is_none() {
        log::warn!("[routine] sleep called outside of a routine");
        return;
    }
    yield_with_state(RoutineState::Sleep);
}

/// Set the current routine's state without yielding.
pub fn set_current_state(state: RoutineState) {
    if with_current(|r| r.set_state(state)).is_none() {
        log::warn!("[routine] set_current_state called outside of a routine");
    }
}

/// Id of the routine running on this thread, if any.
pub fn current_id() -> Option<u64> {
    with_current(Routine::id)
}

/// Name of the routine running on this thread, if any.
pub fn current_name() -> Option<String> {
    with_current(|r| r.name.clone())
}
