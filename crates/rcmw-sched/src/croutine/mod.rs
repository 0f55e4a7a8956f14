// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stackful routines: context switching, the routine state machine and
//! routine factories.

mod arch;
pub mod context;
pub mod factory;
pub mod routine;

pub use factory::RoutineFactory;
pub use routine::{
    current_id, current_name, set_current_state, sleep, yield_now, yield_with_state, Routine,
    RoutineFunc, RoutineState,
};
