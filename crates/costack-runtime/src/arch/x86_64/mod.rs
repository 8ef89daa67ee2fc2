//! x86_64 context switching implementation (System V AMD64 ABI)
//!
//! Only callee-saved registers are stored: a switch is an ordinary
//! function call from the compiler's point of view, so everything else is
//! already clobbered.

use super::EntryFn;
use std::arch::naked_asm;

/// Saved registers for a suspended context
///
/// Offsets are fixed for the assembly below.
#[repr(C)]
#[derive(Debug, Default, Clone)]
pub struct SavedContext {
    pub rsp: u64, // 0x00
    pub rip: u64, // 0x08
    pub rbx: u64, // 0x10
    pub rbp: u64, // 0x18
    pub r12: u64, // 0x20
    pub r13: u64, // 0x28
    pub r14: u64, // 0x30
    pub r15: u64, // 0x38
}

/// Initialize a fresh context
///
/// The first switch into `ctx` lands in `coroutine_entry_trampoline`,
/// which calls `entry_fn(entry_arg)` on the new stack.
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
    // The trampoline is entered by `jmp` and then issues a `call`, so rsp
    // must be 16-byte aligned here for the callee to see rsp+8 aligned.
    let aligned_sp = (stack_top as usize) & !0xF;

    let ctx = &mut *ctx;
    ctx.rsp = aligned_sp as u64;
    ctx.rip = coroutine_entry_trampoline as usize as u64;
    ctx.rbx = 0;
    ctx.rbp = 0;
    ctx.r12 = entry_fn as usize as u64;
    ctx.r13 = entry_arg as u64;
    ctx.r14 = 0;
    ctx.r15 = 0;
}

/// First code a fresh context executes
#[unsafe(naked)]
unsafe extern "C" fn coroutine_entry_trampoline() {
    naked_asm!(
        "mov rdi, r13",
        "call r12",
        // entry_fn never returns
        "ud2",
    );
}

/// Save callee-saved registers to `old`, load them from `new`, jump.
///
/// Returns when some other context switches back into `old`.
///
/// # Safety
///
/// `new` must hold a context produced by `init_context` or by a previous
/// `context_switch` whose stack is still alive.
#[unsafe(naked)]
pub unsafe extern "C" fn context_switch(_old: *mut SavedContext, _new: *const SavedContext) {
    naked_asm!(
        // Save callee-saved registers to old (RDI)
        "mov [rdi + 0x00], rsp",
        "lea rax, [rip + 1f]",
        "mov [rdi + 0x08], rax",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], rbp",
        "mov [rdi + 0x20], r12",
        "mov [rdi + 0x28], r13",
        "mov [rdi + 0x30], r14",
        "mov [rdi + 0x38], r15",
        // Load callee-saved registers from new (RSI)
        "mov rsp, [rsi + 0x00]",
        "mov rax, [rsi + 0x08]",
        "mov rbx, [rsi + 0x10]",
        "mov rbp, [rsi + 0x18]",
        "mov r12, [rsi + 0x20]",
        "mov r13, [rsi + 0x28]",
        "mov r14, [rsi + 0x30]",
        "mov r15, [rsi + 0x38]",
        "jmp rax",
        // Resume point for a saved context: return to its caller
        "1:",
        "ret",
    );
}
