// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

#![allow(clippy::uninlined_format_args)] // Test code readability over pedantic
#![allow(clippy::missing_panics_doc)] // Tests panic on failure

//! ConcurrentDirectory stress tests with randomized keys.

use rcmw_sched::ConcurrentDirectory;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn test_random_writers_and_readers() {
    const WRITERS: u64 = 4;
    const OPS: usize = 5_000;

    let dir: Arc<ConcurrentDirectory<u64, 16>> = Arc::new(ConcurrentDirectory::new());
    let done = Arc::new(AtomicBool::new(false));

    // Readers: every value ever stored for a key encodes that key
    let readers: Vec<_> = (0..2)
        .map(|_| {
            let dir = Arc::clone(&dir);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    let key = fastrand::u64(0..WRITERS * 1_000);
                    if let Some(value) = dir.get(key) {
                        assert_eq!(value >> 32, key);
                    }
                }
            })
        })
        .collect();

    // Writers own disjoint key ranges so the last write per key is known
    let writers: Vec<_> = (0..WRITERS)
        .map(|w| {
            let dir = Arc::clone(&dir);
            thread::spawn(move || {
                let mut rng = fastrand::Rng::with_seed(w);
                let mut last = HashMap::new();
                for seq in 0..OPS as u64 {
                    let key = w * 1_000 + rng.u64(0..1_000);
                    let value = (key << 32) | seq;
                    dir.set(key, value);
                    last.insert(key, value);
                }
                last
            })
        })
        .collect();

    let mut expected = HashMap::new();
    for writer in writers {
        expected.extend(writer.join().expect("writer panicked"));
    }
    done.store(true, Ordering::Relaxed);
    for reader in readers {
        reader.join().expect("reader panicked");
    }

    assert_eq!(dir.len(), expected.len());
    for (key, value) in expected {
        assert!(dir.has(key));
        assert_eq!(dir.get(key), Some(value), "key {}", key);
    }
}

#[test]
fn test_racing_inserts_same_keys() {
    let dir: Arc<ConcurrentDirectory<String, 8>> = Arc::new(ConcurrentDirectory::new());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let dir = Arc::clone(&dir);
            thread::spawn(move || {
                for key in 0..64u64 {
                    dir.set(key, format!("{}-{}", key, t));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("inserter panicked");
    }

    assert_eq!(dir.len(), 64);
    for key in 0..64u64 {
        let value = dir.get(key).expect("missing key");
        assert!(value.starts_with(&format!("{}-", key)));
    }
}
