// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! x86_64 implementation of the routine stack switch (System V ABI).

use std::arch::naked_asm;

/// FP control words, rbp, rbx, r15, r14, r13, r12 and the rdi slot that
/// carries the entry argument on the first switch.
pub const REGISTERS_SIZE: usize = 64;

/// The return address sits 16 bytes below the aligned top, so `ret` leaves
/// `rsp = top - 8`, the 16n+8 alignment a called function expects.
pub const RETURN_SLOT_OFFSET: usize = 16;

/// All exceptions masked, round to nearest.
const MXCSR_DEFAULT: u32 = 0x1f80;
/// Extended precision, all exceptions masked, round to nearest.
const X87_CW_DEFAULT: u16 = 0x037f;

/// Write the power-on FP control state into a fresh frame at `sp`.
///
/// # Safety
/// `sp` must point at a writable, 8-byte aligned frame of `REGISTERS_SIZE`
/// bytes.
pub unsafe fn init_frame(sp: *mut u8) {
    (sp as *mut u32).write(MXCSR_DEFAULT);
    (sp.add(4) as *mut u16).write(X87_CW_DEFAULT);
}

/// Switch stacks.
///
/// Pushes the callee-saved registers (and `rdi`) onto the current stack,
/// then the MXCSR and x87 control word, which System V also treats as
/// callee-saved. Stores `rsp` into `*src_sp`, loads `rsp` from `*dest_sp`,
/// restores the same frame and returns into the destination.
///
/// Frame layout, from the saved stack pointer upward:
///
/// ```text
/// +0x00 mxcsr (4 bytes), x87 control word (2 bytes), padding
/// +0x08 rbp
/// +0x10 rbx
/// +0x18 r15
/// +0x20 r14
/// +0x28 r13
/// +0x30 r12
/// +0x38 rdi      <- entry argument for a fresh context
/// +0x40 return address
/// ```
///
/// # Safety
/// `*dest_sp` must come from a previous `ctx_swap` or from `make_context`,
/// and the stack it points into must still be alive.
#[unsafe(naked)]
pub unsafe extern "C" fn ctx_swap(_src_sp: *mut *mut u8, _dest_sp: *mut *mut u8) {
    naked_asm!(
        "push rdi",
        "push r12",
        "push r13",
        "push r14",
        "push r15",
        "push rbx",
        "push rbp",
        "sub rsp, 8",
        "stmxcsr dword ptr [rsp]",
        "fnstcw word ptr [rsp + 4]",
        "mov [rdi], rsp",
        "mov rsp, [rsi]",
        "ldmxcsr dword ptr [rsp]",
        "fldcw word ptr [rsp + 4]",
        "add rsp, 8",
        "pop rbp",
        "pop rbx",
        "pop r15",
        "pop r14",
        "pop r13",
        "pop r12",
        "pop rdi",
        "ret",
    );
}
