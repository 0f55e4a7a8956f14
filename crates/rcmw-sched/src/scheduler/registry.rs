// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Task name registry: stable 64-bit ids derived from task names.

use crate::base::ConcurrentDirectory;
use crate::config::TASK_REGISTRY_BUCKETS;
use std::hash::{DefaultHasher, Hash, Hasher};

/// id -> name table. Ids are a hash of the name, so the same name always
/// maps to the same id within a process.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    names: ConcurrentDirectory<String, TASK_REGISTRY_BUCKETS>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `name`, without registering it.
    pub fn task_id(name: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        hasher.finish()
    }

    /// Register `name` and return its id.
    pub fn register(&self, name: &str) -> u64 {
        let id = Self::task_id(name);
        if !self.names.has(id) {
            self.names.set(id, name.to_string());
        }
        id
    }

    pub fn name_of(&self, id: u64) -> Option<String> {
        self.names.get(id)
    }
}
