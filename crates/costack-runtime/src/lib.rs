//! # costack-runtime
//!
//! Platform-specific runtime for the costack coroutine library.
//!
//! This crate provides:
//! - Stack memory (mmap with a guard page)
//! - Context switching (architecture-specific assembly)
//! - Coroutine objects and the per-thread coroutine manager
//! - Worker thread management
//! - The batch scheduler with keyed affinity

pub mod config;
pub mod memory;
pub mod arch;
pub mod coroutine;
pub mod manager;
pub mod tls;
pub mod worker;
pub mod scheduler;

// Re-exports
pub use config::SchedulerConfig;
pub use coroutine::{Coroutine, CoroutineRef};
pub use manager::CoManager;
pub use scheduler::{Affinity, RunReport, Scheduler};
pub use worker::WorkerPool;

// Architecture detection
cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub use arch::x86_64 as current_arch;
    } else if #[cfg(target_arch = "aarch64")] {
        pub use arch::aarch64 as current_arch;
    } else {
        compile_error!("Unsupported architecture");
    }
}
