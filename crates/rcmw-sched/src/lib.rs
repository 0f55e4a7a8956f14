// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # rcmw-sched - Cooperative routine scheduler for pub/sub middleware
//!
//! A user-space M:N scheduler: many stackful routines (data-driven
//! callbacks) multiplexed onto a small, fixed pool of OS threads.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rcmw_sched::{QueueVisitor, RoutineFactory, Scheduler};
//! use std::sync::Arc;
//!
//! fn main() -> rcmw_sched::Result<()> {
//!     let scheduler = Scheduler::with_default_topology(2)?;
//!
//!     // A routine woken by every message pushed into the queue
//!     let queue = Arc::new(QueueVisitor::<u64>::new());
//!     let factory = RoutineFactory::from_visitor(
//!         |sample: u64| println!("got {}", sample),
//!         Arc::clone(&queue),
//!     );
//!     scheduler.create_task_from_factory(&factory, "printer");
//!
//!     queue.push(42);
//!     scheduler.shutdown();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                            Scheduler                                |
//! |   create / dispatch / remove / notify / shutdown, task registry     |
//! +---------------------------------------------------------------------+
//! |          ReadyGroup (MAX_PRIO queues)  <-  Processor threads         |
//! +---------------------------------------------------------------------+
//! |        Routine (state machine, acquire flag, recheck flag)          |
//! +---------------------------------------------------------------------+
//! |        Context switch (naked asm, x86_64 / aarch64)                 |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Modules Overview
//!
//! - [`scheduler`] - Scheduler, processors, ready groups, thread pinning
//! - [`croutine`] - Routines, yield functions, routine factories
//! - [`data`] - Data-layer contracts (notify sources, visitors)
//! - [`base`] - Lock-free directory
//! - [`config`] - Constants and plain-data configuration (YAML loader
//!   behind feature `conf-loaders`)

/// Lock-free building blocks (concurrent directory).
pub mod base;
/// Scheduler constants and configuration.
pub mod config;
/// Stackful routines and context switching.
pub mod croutine;
/// Data-layer contracts feeding the scheduler.
pub mod data;
/// Error types.
pub mod error;
/// Scheduler, processors and ready groups.
pub mod scheduler;

pub use base::ConcurrentDirectory;
pub use croutine::{
    current_id, current_name, set_current_state, sleep, yield_now, yield_with_state, Routine,
    RoutineFactory, RoutineState,
};
pub use data::{DataVisitor, NotifySource, QueueVisitor};
pub use error::{Error, Result};
pub use scheduler::{pin_thread, Scheduler};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
