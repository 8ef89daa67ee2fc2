//! aarch64 context switching implementation (AAPCS64)
//!
//! Callee-saved set: x19-x28, frame pointer x29, link register x30, sp and
//! the low halves of v8-v15 (d8-d15).

use super::EntryFn;
use std::arch::naked_asm;

/// Saved registers for a suspended context
///
/// Offsets are fixed for the assembly below.
#[repr(C)]
#[derive(Debug, Default, Clone)]
pub struct SavedContext {
    pub sp: u64,       // 0x00
    pub pc: u64,       // 0x08
    pub x: [u64; 12],  // 0x10: x19..x30
    pub d: [u64; 8],   // 0x70: d8..d15
}

/// Initialize a fresh context
///
/// # Safety
///
/// `ctx` must point to valid SavedContext memory and `stack_top` must be
/// the high end of a mapping that outlives every switch into `ctx`.
#[inline]
pub unsafe fn init_context(
    ctx: *mut SavedContext,
    stack_top: *mut u8,
    entry_fn: EntryFn,
    entry_arg: usize,
) {
    let ctx = &mut *ctx;
    *ctx = SavedContext::default();
    ctx.sp = ((stack_top as usize) & !0xF) as u64;
    ctx.pc = coroutine_entry_trampoline as usize as u64;
    ctx.x[0] = entry_fn as usize as u64; // x19
    ctx.x[1] = entry_arg as u64; // x20
}

/// First code a fresh context executes
#[unsafe(naked)]
unsafe extern "C" fn coroutine_entry_trampoline() {
    naked_asm!(
        "mov x0, x20",
        "mov x29, xzr",
        "mov x30, xzr",
        "blr x19",
        // entry_fn never returns
        "brk #0x1",
    );
}

/// Save callee-saved registers to `old`, load them from `new`, jump.
///
/// # Safety
///
/// `new` must hold a context produced by `init_context` or by a previous
/// `context_switch` whose stack is still alive.
#[unsafe(naked)]
pub unsafe extern "C" fn context_switch(_old: *mut SavedContext, _new: *const SavedContext) {
    naked_asm!(
        // Save into old (x0)
        "mov x9, sp",
        "str x9, [x0, #0x00]",
        "adr x10, 1f",
        "str x10, [x0, #0x08]",
        "stp x19, x20, [x0, #0x10]",
        "stp x21, x22, [x0, #0x20]",
        "stp x23, x24, [x0, #0x30]",
        "stp x25, x26, [x0, #0x40]",
        "stp x27, x28, [x0, #0x50]",
        "stp x29, x30, [x0, #0x60]",
        "stp d8, d9, [x0, #0x70]",
        "stp d10, d11, [x0, #0x80]",
        "stp d12, d13, [x0, #0x90]",
        "stp d14, d15, [x0, #0xa0]",
        // Load from new (x1)
        "ldr x9, [x1, #0x00]",
        "mov sp, x9",
        "ldr x10, [x1, #0x08]",
        "ldp x19, x20, [x1, #0x10]",
        "ldp x21, x22, [x1, #0x20]",
        "ldp x23, x24, [x1, #0x30]",
        "ldp x25, x26, [x1, #0x40]",
        "ldp x27, x28, [x1, #0x50]",
        "ldp x29, x30, [x1, #0x60]",
        "ldp d8, d9, [x1, #0x70]",
        "ldp d10, d11, [x1, #0x80]",
        "ldp d12, d13, [x1, #0x90]",
        "ldp d14, d15, [x1, #0xa0]",
        "br x10",
        // Resume point for a saved context: return via restored x30
        "1:",
        "ret",
    );
}
