// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! aarch64 implementation of the routine stack switch (AAPCS64).

use std::arch::naked_asm;

/// d8-d15, x19-x29 and fpcr.
pub const REGISTERS_SIZE: usize = 160;

/// On aarch64 the return-address slot is the last word below the top; the
/// switch pops it into `lr` and leaves `sp = top` (16-byte aligned).
pub const RETURN_SLOT_OFFSET: usize = 8;

/// A zeroed frame already holds the default fpcr (round to nearest, no
/// traps).
///
/// # Safety
/// Nothing to uphold; kept unsafe to match the x86_64 backend.
pub unsafe fn init_frame(_sp: *mut u8) {}

/// Switch stacks.
///
/// Frame layout, from the saved stack pointer upward:
///
/// ```text
/// +0x00 d8  d9  d10 d11 d12 d13 d14 d15
/// +0x40 x19 x20 x21 x22 x23 x24 x25 x26 x27 x28
/// +0x90 x29 (fp)
/// +0x98 fpcr
/// +0xa0 x0       <- entry argument for a fresh context
/// +0xa8 x30 (lr) <- return address
/// ```
///
/// # Safety
/// `*dest_sp` must come from a previous `ctx_swap` or from `make_context`,
/// and the stack it points into must still be alive.
#[unsafe(naked)]
pub unsafe extern "C" fn ctx_swap(_src_sp: *mut *mut u8, _dest_sp: *mut *mut u8) {
    naked_asm!(
        "sub sp, sp, #0xb0",
        "stp d8, d9, [sp, #0x00]",
        "stp d10, d11, [sp, #0x10]",
        "stp d12, d13, [sp, #0x20]",
        "stp d14, d15, [sp, #0x30]",
        "stp x19, x20, [sp, #0x40]",
        "stp x21, x22, [sp, #0x50]",
        "stp x23, x24, [sp, #0x60]",
        "stp x25, x26, [sp, #0x70]",
        "stp x27, x28, [sp, #0x80]",
        "str x29, [sp, #0x90]",
        "mrs x9, fpcr",
        "str x9, [sp, #0x98]",
        "str x0, [sp, #0xa0]",
        "str x30, [sp, #0xa8]",
        // Publish our stack pointer, adopt the destination's
        "mov x9, sp",
        "str x9, [x0]",
        "ldr x9, [x1]",
        "mov sp, x9",
        "ldp d8, d9, [sp, #0x00]",
        "ldp d10, d11, [sp, #0x10]",
        "ldp d12, d13, [sp, #0x20]",
        "ldp d14, d15, [sp, #0x30]",
        "ldp x19, x20, [sp, #0x40]",
        "ldp x21, x22, [sp, #0x50]",
        "ldp x23, x24, [sp, #0x60]",
        "ldp x25, x26, [sp, #0x70]",
        "ldp x27, x28, [sp, #0x80]",
        "ldr x29, [sp, #0x90]",
        "ldr x9, [sp, #0x98]",
        "msr fpcr, x9",
        "ldr x0, [sp, #0xa0]",
        "ldr x30, [sp, #0xa8]",
        "add sp, sp, #0xb0",
        "ret",
    );
}
