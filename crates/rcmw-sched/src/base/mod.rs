// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Lock-free building blocks shared by the scheduler.

pub mod directory;

pub use directory::ConcurrentDirectory;
