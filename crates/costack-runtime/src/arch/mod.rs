//! Architecture-specific context switching
//!
//! Each backend provides the same three items:
//!
//! - `SavedContext` - callee-saved registers plus stack and resume pointers
//! - `init_context` - prime a context so the first switch into it calls
//!   `entry_fn(entry_arg)` on a fresh stack
//! - `context_switch` - save the current registers into `old`, load `new`
//!
//! `entry_fn` must never return: it ends by switching away for good.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub mod x86_64;
    } else if #[cfg(target_arch = "aarch64")] {
        pub mod aarch64;
    }
}

/// Signature of the function a fresh context starts in
pub type EntryFn = extern "C" fn(usize) -> !;
