// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Processor-side view of a scheduling policy.

use super::ready_group::ReadyGroup;
use crate::croutine::Routine;
use std::sync::Arc;

/// What a processor drains. One variant per [`SchedPolicy`](super::SchedPolicy).
#[derive(Debug)]
pub enum ProcessorContext {
    Classic(ClassicContext),
}

impl ProcessorContext {
    /// Next acquired READY routine, if any.
    pub fn next_routine(&self) -> Option<Arc<Routine>> {
        match self {
            ProcessorContext::Classic(ctx) => ctx.group.next_routine(),
        }
    }

    /// Park until notified or the group wait timeout elapses.
    pub fn wait(&self) {
        match self {
            ProcessorContext::Classic(ctx) => ctx.group.wait(),
        }
    }

    pub fn shutdown(&self) {
        match self {
            ProcessorContext::Classic(ctx) => ctx.group.shutdown(),
        }
    }

    pub fn group_name(&self) -> &str {
        match self {
            ProcessorContext::Classic(ctx) => ctx.group.name(),
        }
    }
}

/// Classic policy context: the ready group this processor serves.
#[derive(Debug, Clone)]
pub struct ClassicContext {
    group: Arc<ReadyGroup>,
}

impl ClassicContext {
    pub fn new(group: Arc<ReadyGroup>) -> Self {
        Self { group }
    }
}
