//! # costack-core
//!
//! Core types for the costack coroutine runtime.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! Stacks, context switching and threads live in `costack-runtime`.
//!
//! ## Modules
//!
//! - `id` - Coroutine identifier type
//! - `state` - Coroutine status enum
//! - `callable` - Type-erased run-once calls
//! - `error` - Error types
//! - `kprint` - Kernel-style leveled logging macros
//! - `env` - Environment variable utilities

pub mod id;
pub mod state;
pub mod callable;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use id::CoroutineId;
pub use state::CoStatus;
pub use callable::{Callable, LocalCallable};
pub use error::{ConfigError, MemoryError, SchedError, SchedResult, WorkerError};
pub use env::{env_get, env_get_bool, env_get_opt, env_is_set};

/// Sizing constants
pub mod constants {
    /// Default coroutine stack size (16 MiB, reserved lazily by the kernel)
    pub const DEFAULT_STACK_SIZE: usize = 16 * 1024 * 1024;

    /// Smallest stack the config accepts
    pub const MIN_STACK_SIZE: usize = 64 * 1024;

    /// Fallback page size when the OS cannot be asked
    pub const DEFAULT_PAGE_SIZE: usize = 4096;

    /// Default scheduler pool size (the calling thread counts as worker 0)
    pub const DEFAULT_NUM_WORKERS: usize = 3;

    /// Maximum workers (OS threads)
    pub const MAX_WORKERS: usize = 64;
}
