// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Lock-free fixed-bucket directory keyed by `u64`.
//!
//! Each bucket owns a singly-linked chain of entries sorted by key. Readers
//! walk a chain without locking; writers use a find-or-insert CAS loop:
//!
//! ```text
//! bucket[key & (B-1)]
//!   head -> [k=1 | v] -> [k=129 | v] -> [k=257 | v] -> null
//!                          ^
//!            set(129, v')  CAS value pointer (update)
//!            set(200, v')  CAS link of [k=129].next (insert)
//! ```
//!
//! Entries are never unlinked, so a chain only grows. Replaced values are
//! retired through `crossbeam::epoch`, which keeps [`get_with`] borrows valid
//! while another thread overwrites the same key.
//!
//! [`get_with`]: ConcurrentDirectory::get_with

use crate::config::ID_LOCK_BUCKETS;
use crossbeam::epoch::{self, Atomic, Guard, Owned, Shared};
use std::sync::atomic::Ordering;

struct Entry<V> {
    key: u64,
    value: Atomic<V>,
    next: Atomic<Entry<V>>,
}

struct Bucket<V> {
    head: Atomic<Entry<V>>,
}

impl<V> Bucket<V> {
    /// Walks the chain to the first entry whose key is `>= key`.
    ///
    /// Returns the link that points at that entry (the bucket head or the
    /// predecessor's `next`) and the entry itself, null at the end of chain.
    fn find<'g>(
        &'g self,
        key: u64,
        guard: &'g Guard,
    ) -> (&'g Atomic<Entry<V>>, Shared<'g, Entry<V>>) {
        let mut link = &self.head;
        let mut cur = link.load(Ordering::Acquire, guard);
        // SAFETY: entries are only freed when the directory is dropped.
        while let Some(entry) = unsafe { cur.as_ref() } {
            if entry.key >= key {
                break;
            }
            link = &entry.next;
            cur = link.load(Ordering::Acquire, guard);
        }
        (link, cur)
    }
}

/// Fixed-size lock-free hash directory.
///
/// `B` must be a power of two (checked at compile time).
///
/// # Example
/// ```
/// use rcmw_sched::base::ConcurrentDirectory;
///
/// let dir: ConcurrentDirectory<String> = ConcurrentDirectory::new();
/// dir.set(42, "planner".to_string());
/// assert!(dir.has(42));
/// assert_eq!(dir.get(42).as_deref(), Some("planner"));
/// ```
pub struct ConcurrentDirectory<V, const B: usize = ID_LOCK_BUCKETS> {
    buckets: Box<[Bucket<V>]>,
}

impl<V, const B: usize> ConcurrentDirectory<V, B> {
    const MASK: u64 = {
        assert!(B.is_power_of_two(), "bucket count must be a power of two");
        (B - 1) as u64
    };

    /// Create an empty directory.
    pub fn new() -> Self {
        let buckets = (0..B)
            .map(|_| Bucket {
                head: Atomic::null(),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { buckets }
    }

    /// Number of buckets.
    pub const fn capacity(&self) -> usize {
        B
    }

    #[inline]
    fn bucket(&self, key: u64) -> &Bucket<V> {
        &self.buckets[(key & Self::MASK) as usize]
    }

    fn lookup<'g>(&'g self, key: u64, guard: &'g Guard) -> Option<&'g Entry<V>> {
        let (_, cur) = self.bucket(key).find(key, guard);
        // SAFETY: see `Bucket::find`.
        unsafe { cur.as_ref() }.filter(|entry| entry.key == key)
    }
}

impl<V: Send + Sync, const B: usize> ConcurrentDirectory<V, B> {
    /// True iff `key` has an entry. Never blocks, never allocates.
    pub fn has(&self, key: u64) -> bool {
        let guard = &epoch::pin();
        self.lookup(key, guard).is_some()
    }

    /// Borrow the value stored under `key` for the duration of `f`.
    pub fn get_with<R>(&self, key: u64, f: impl FnOnce(&V) -> R) -> Option<R> {
        let guard = &epoch::pin();
        let entry = self.lookup(key, guard)?;
        let value = entry.value.load(Ordering::Acquire, guard);
        // SAFETY: a replaced value is destroyed only after every guard that
        // could have loaded it is unpinned.
        unsafe { value.as_ref() }.map(f)
    }

    /// Clone of the value stored under `key`.
    pub fn get(&self, key: u64) -> Option<V>
    where
        V: Clone,
    {
        self.get_with(key, V::clone)
    }

    /// Insert `value` under `key`, or replace the current value.
    ///
    /// Concurrent `set` calls on one key leave exactly one of the written
    /// values in place; a key is never linked twice.
    pub fn set(&self, key: u64, value: V) {
        let guard = &epoch::pin();
        let bucket = self.bucket(key);
        let mut new_value = Owned::new(value);

        loop {
            let (link, cur) = bucket.find(key, guard);
            // SAFETY: see `Bucket::find`.
            match unsafe { cur.as_ref() } {
                Some(entry) if entry.key == key => {
                    let old = entry.value.load(Ordering::Acquire, guard);
                    match entry.value.compare_exchange(
                        old,
                        new_value,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                        guard,
                    ) {
                        Ok(_) => {
                            if !old.is_null() {
                                // SAFETY: `old` is no longer reachable from the directory.
                                unsafe { guard.defer_destroy(old) };
                            }
                            return;
                        }
                        // A racing writer replaced the value first; take ours back and retry.
                        Err(err) => new_value = err.new,
                    }
                }
                _ => {
                    let node = Owned::new(Entry {
                        key,
                        value: Atomic::from(new_value),
                        next: Atomic::from(cur),
                    });
                    match link.compare_exchange(
                        cur,
                        node,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                        guard,
                    ) {
                        Ok(_) => return,
                        Err(err) => {
                            let node = err.new.into_box();
                            // SAFETY: the node was never published; we own its value.
                            new_value = unsafe { node.value.into_owned() };
                        }
                    }
                }
            }
        }
    }

    /// Number of keys (walks every chain).
    pub fn len(&self) -> usize {
        let guard = &epoch::pin();
        let mut count = 0;
        for bucket in self.buckets.iter() {
            let mut cur = bucket.head.load(Ordering::Acquire, guard);
            // SAFETY: see `Bucket::find`.
            while let Some(entry) = unsafe { cur.as_ref() } {
                count += 1;
                cur = entry.next.load(Ordering::Acquire, guard);
            }
        }
        count
    }

    /// True when no key has been set.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V, const B: usize> Default for ConcurrentDirectory<V, B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, const B: usize> std::fmt::Debug for ConcurrentDirectory<V, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentDirectory")
            .field("buckets", &B)
            .finish_non_exhaustive()
    }
}

impl<V, const B: usize> Drop for ConcurrentDirectory<V, B> {
    fn drop(&mut self) {
        // SAFETY: `&mut self` guarantees no other thread still walks the chains.
        let guard = unsafe { epoch::unprotected() };
        for bucket in self.buckets.iter() {
            let mut cur = bucket.head.load(Ordering::Relaxed, guard);
            while !cur.is_null() {
                // SAFETY: every node and live value is owned by exactly one chain.
                let entry = unsafe { cur.into_owned() }.into_box();
                let value = entry.value.load(Ordering::Relaxed, guard);
                if !value.is_null() {
                    drop(unsafe { value.into_owned() });
                }
                cur = entry.next.load(Ordering::Relaxed, guard);
            }
        }
    }
}
