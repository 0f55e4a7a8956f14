// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Data-layer contracts feeding the scheduler.
//!
//! The transport side implements [`NotifySource`] (and usually
//! [`DataVisitor`]); the scheduler registers a callback that turns every
//! arrival into a `notify_processor` of the routine reading that source.

use crossbeam::queue::SegQueue;
use parking_lot::RwLock;
use std::fmt;

/// Callback fired on new data.
pub type NotifyCallback = Box<dyn Fn() + Send + Sync>;

/// Something that can announce the arrival of new data.
pub trait NotifySource: Send + Sync {
    /// Install the arrival callback, replacing any previous one.
    fn register_notify_callback(&self, callback: NotifyCallback);
}

/// A data source a routine body can poll.
///
/// Multi-channel readers expose a tuple `M` and return `Some` only once
/// every channel has data.
pub trait DataVisitor<M>: NotifySource {
    fn try_fetch(&self) -> Option<M>;
}

/// In-memory [`DataVisitor`] backed by a lock-free queue.
pub struct QueueVisitor<M> {
    queue: SegQueue<M>,
    callback: RwLock<Option<NotifyCallback>>,
}

impl<M> QueueVisitor<M> {
    pub fn new() -> Self {
        Self {
            queue: SegQueue::new(),
            callback: RwLock::new(None),
        }
    }

    /// Enqueue a message and fire the notify callback.
    pub fn push(&self, msg: M) {
        self.queue.push(msg);
        if let Some(callback) = self.callback.read().as_ref() {
            callback();
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl<M> Default for QueueVisitor<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> fmt::Debug for QueueVisitor<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueVisitor")
            .field("pending", &self.queue.len())
            .field("has_callback", &self.callback.read().is_some())
            .finish()
    }
}

impl<M: Send> NotifySource for QueueVisitor<M> {
    fn register_notify_callback(&self, callback: NotifyCallback) {
        *self.callback.write() = Some(callback);
    }
}

impl<M: Send> DataVisitor<M> for QueueVisitor<M> {
    fn try_fetch(&self) -> Option<M> {
        self.queue.pop()
    }
}
