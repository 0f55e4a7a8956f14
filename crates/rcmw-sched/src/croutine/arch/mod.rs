// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Architecture-specific stack switch.
//!
//! Each backend exports:
//! - `REGISTERS_SIZE`: bytes of register image `ctx_swap` keeps below the
//!   argument / return-address slots
//! - `RETURN_SLOT_OFFSET`: distance from the aligned stack top to the slot
//!   holding the return address (the argument sits 8 bytes below it)
//! - `init_frame(sp)`: seed the FP control state of a fresh frame
//! - `ctx_swap(src_sp, dest_sp)`

#[cfg(target_arch = "x86_64")]
mod x86_64;
#[cfg(target_arch = "x86_64")]
pub use self::x86_64::{ctx_swap, init_frame, REGISTERS_SIZE, RETURN_SLOT_OFFSET};

#[cfg(target_arch = "aarch64")]
mod aarch64;
#[cfg(target_arch = "aarch64")]
pub use self::aarch64::{ctx_swap, init_frame, REGISTERS_SIZE, RETURN_SLOT_OFFSET};

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
compile_error!("routine context switching is only implemented for x86_64 and aarch64");
