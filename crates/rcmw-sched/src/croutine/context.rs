// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Routine execution context: a private stack plus the saved stack pointer.

use super::arch;
use crate::config::STACK_SIZE;
use std::ffi::c_void;
use std::ptr;

/// Entry point of a fresh context. Must never return.
pub type RoutineEntry = extern "C" fn(*mut c_void);

/// Stack and saved stack pointer of one routine.
pub struct RoutineContext {
    stack: Box<[u8]>,
    pub(crate) sp: *mut u8,
}

impl RoutineContext {
    /// Allocate a zeroed [`STACK_SIZE`] stack. The context is not runnable
    /// until [`make_context`] prepared it.
    pub fn new() -> Self {
        Self {
            stack: vec![0u8; STACK_SIZE].into_boxed_slice(),
            sp: ptr::null_mut(),
        }
    }

    pub fn stack_size(&self) -> usize {
        self.stack.len()
    }

    /// True once [`make_context`] has prepared an initial frame.
    pub fn is_prepared(&self) -> bool {
        !self.sp.is_null()
    }
}

impl Default for RoutineContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Lay out an initial frame so that the first [`swap_context`] into `ctx`
/// lands in `entry(arg)` on the context's own stack.
///
/// The top of the stack is aligned down to 16 bytes. Saved registers start
/// zeroed, FP control state at its defaults; the argument goes into the first-argument register slot and
/// `entry` into the return-address slot.
pub fn make_context(entry: RoutineEntry, arg: *mut c_void, ctx: &mut RoutineContext) {
    let base = ctx.stack.as_mut_ptr();
    let len = ctx.stack.len();
    // SAFETY: every address written below lies in
    // [top - 16 - REGISTERS_SIZE, top), inside the owned stack buffer, and
    // is 8-byte aligned because top is 16-byte aligned.
    unsafe {
        let end = base.add(len) as usize;
        let top = base.add((end & !15) - base as usize);
        let sp = top.sub(16 + arch::REGISTERS_SIZE);
        ptr::write_bytes(sp, 0, 16 + arch::REGISTERS_SIZE);
        arch::init_frame(sp);

        let ret_slot = top.sub(arch::RETURN_SLOT_OFFSET) as *mut usize;
        ret_slot.write(entry as usize);
        ret_slot.sub(1).write(arg as usize);

        ctx.sp = sp;
    }
}

/// Save the current stack pointer into `*src_sp` and continue on the stack
/// stored in `*dest_sp`. Returns when something swaps back to `src_sp`.
///
/// # Safety
/// `*dest_sp` must hold a stack pointer produced by [`make_context`] or a
/// previous `swap_context`, whose stack is still alive and not running on
/// any other thread.
#[inline(never)]
pub unsafe fn swap_context(src_sp: *mut *mut u8, dest_sp: *mut *mut u8) {
    arch::ctx_swap(src_sp, dest_sp);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_unprepared() {
        let ctx = RoutineContext::new();
        assert_eq!(ctx.stack_size(), STACK_SIZE);
        assert!(!ctx.is_prepared());
    }

    extern "C" fn never_called(_: *mut c_void) {
        unreachable!("only the frame layout is checked");
    }

    #[test]
    fn test_make_context_frame() {
        let mut ctx = RoutineContext::new();
        let arg = 0xdead_beef_usize as *mut c_void;
        make_context(never_called, arg, &mut ctx);
        assert!(ctx.is_prepared());

        let top = ctx.sp as usize + 16 + arch::REGISTERS_SIZE;
        assert_eq!(top % 16, 0);
        let ret = unsafe { *((top - arch::RETURN_SLOT_OFFSET) as *const usize) };
        let stored_arg = unsafe { *((top - arch::RETURN_SLOT_OFFSET - 8) as *const usize) };
        assert_eq!(ret, never_called as usize);
        assert_eq!(stored_arg, 0xdead_beef);
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn test_fresh_frame_fp_control_defaults() {
        let mut ctx = RoutineContext::new();
        make_context(never_called, ptr::null_mut(), &mut ctx);
        let mxcsr = unsafe { *(ctx.sp as *const u32) };
        let x87_cw = unsafe { *(ctx.sp.add(4) as *const u16) };
        assert_eq!(mxcsr, 0x1f80);
        assert_eq!(x87_cw, 0x037f);
    }
}
