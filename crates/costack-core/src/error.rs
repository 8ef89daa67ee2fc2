//! Error types for the costack runtime
//!
//! Only recoverable conditions live here. Misuse of the coroutine protocol
//! (resuming a coroutine that is not suspended, yielding with nothing
//! running) is a programmer error and panics instead.

use core::fmt;

/// Result type for runtime operations
pub type SchedResult<T> = Result<T, SchedError>;

/// Errors that can occur in runtime operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedError {
    /// Stack allocation/mapping failed
    Memory(MemoryError),

    /// Worker thread error
    Worker(WorkerError),

    /// Invalid configuration
    Config(ConfigError),
}

impl fmt::Display for SchedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedError::Memory(e) => write!(f, "memory error: {}", e),
            SchedError::Worker(e) => write!(f, "worker error: {}", e),
            SchedError::Config(e) => write!(f, "config error: {}", e),
        }
    }
}

impl std::error::Error for SchedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SchedError::Memory(e) => Some(e),
            SchedError::Worker(e) => Some(e),
            SchedError::Config(e) => Some(e),
        }
    }
}

/// Stack memory errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    /// mmap failed (errno attached)
    AllocationFailed(i32),

    /// mprotect on the guard page failed (errno attached)
    ProtectionFailed(i32),

    /// Requested stack size is zero or overflows
    InvalidSize(usize),
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::AllocationFailed(errno) => {
                write!(f, "stack allocation failed (errno {})", errno)
            }
            MemoryError::ProtectionFailed(errno) => {
                write!(f, "guard page protection failed (errno {})", errno)
            }
            MemoryError::InvalidSize(size) => write!(f, "invalid stack size {}", size),
        }
    }
}

impl std::error::Error for MemoryError {}

impl From<MemoryError> for SchedError {
    fn from(e: MemoryError) -> Self {
        SchedError::Memory(e)
    }
}

/// Worker thread related errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// Failed to spawn worker thread
    SpawnFailed(usize),

    /// Worker thread panicked outside of any task
    Panicked(usize),
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::SpawnFailed(id) => write!(f, "failed to spawn worker thread {}", id),
            WorkerError::Panicked(id) => write!(f, "worker thread {} panicked", id),
        }
    }
}

impl std::error::Error for WorkerError {}

impl From<WorkerError> for SchedError {
    fn from(e: WorkerError) -> Self {
        SchedError::Worker(e)
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidValue(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for SchedError {
    fn from(e: ConfigError) -> Self {
        SchedError::Config(e)
    }
}
