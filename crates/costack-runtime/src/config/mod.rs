//! costack configuration
//!
//! Provides compile-time defaults with runtime environment overrides.
//!
//! # Configuration Priority (highest wins)
//!
//! 1. Builder calls
//! 2. Environment variables (runtime, via `from_env`)
//! 3. User's costack_config.rs (compile-time, `COSTACK_CONFIG_RS`)
//! 4. Library defaults
//!
//! # Example
//!
//! ```rust,ignore
//! use costack_runtime::config::SchedulerConfig;
//!
//! let config = SchedulerConfig::from_env()
//!     .num_workers(2)
//!     .stack_size(256 * 1024);
//! ```

pub mod defaults;

use costack_core::constants::{MAX_WORKERS, MIN_STACK_SIZE};
use costack_core::env::{env_get, env_get_bool};
use costack_core::error::ConfigError;

/// Scheduler and coroutine configuration with builder pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Worker count, including the thread that calls `run` (worker 0).
    /// Also the modulus for keyed affinity.
    pub num_workers: usize,
    /// Stack size of each coroutine, in bytes
    pub stack_size: usize,
    /// Log coroutine lifecycle and dequeue decisions at debug level
    pub debug_logging: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl SchedulerConfig {
    /// Create config from compile-time defaults with environment overrides.
    ///
    /// Environment variables (all optional):
    /// - `COSTACK_NUM_WORKERS` - Number of workers (including the caller of `run`)
    /// - `COSTACK_STACK_SIZE` - Stack size per coroutine in bytes
    /// - `COSTACK_DEBUG` - Enable debug logging (0/1)
    pub fn from_env() -> Self {
        Self {
            num_workers: env_get("COSTACK_NUM_WORKERS", defaults::NUM_WORKERS),
            stack_size: env_get("COSTACK_STACK_SIZE", defaults::STACK_SIZE),
            debug_logging: env_get_bool("COSTACK_DEBUG", defaults::DEBUG_LOGGING),
        }
    }

    /// Create config with compile-time defaults only (no env override).
    /// Useful for tests that must not depend on the environment.
    pub fn new() -> Self {
        Self {
            num_workers: defaults::NUM_WORKERS,
            stack_size: defaults::STACK_SIZE,
            debug_logging: defaults::DEBUG_LOGGING,
        }
    }

    // Builder methods

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = size;
        self
    }

    pub fn debug_logging(mut self, enable: bool) -> Self {
        self.debug_logging = enable;
        self
    }

    /// Validate configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_workers == 0 {
            return Err(ConfigError::InvalidValue("num_workers must be > 0"));
        }
        if self.num_workers > MAX_WORKERS {
            return Err(ConfigError::InvalidValue("num_workers exceeds MAX_WORKERS"));
        }
        if self.stack_size < MIN_STACK_SIZE {
            return Err(ConfigError::InvalidValue("stack_size must be >= 64KB"));
        }
        Ok(())
    }

    /// Print configuration (for debugging)
    pub fn print(&self) {
        eprintln!("costack configuration:");
        eprintln!("  num_workers:    {}", self.num_workers);
        eprintln!("  stack_size:     {}", self.stack_size);
        eprintln!("  debug_logging:  {}", self.debug_logging);
    }
}

/// Default stack size for coroutines created outside the scheduler
///
/// `COSTACK_STACK_SIZE` overrides the compile-time default; values below
/// the minimum are clamped up.
pub fn default_stack_size() -> usize {
    env_get("COSTACK_STACK_SIZE", defaults::STACK_SIZE).max(MIN_STACK_SIZE)
}

/// Whether coroutine lifecycle debug logging is on for ad-hoc coroutines
pub fn default_debug_logging() -> bool {
    env_get_bool("COSTACK_DEBUG", defaults::DEBUG_LOGGING)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_defaults() {
        let config = SchedulerConfig::new();
        assert_eq!(config.num_workers, 3);
        assert_eq!(config.stack_size, 16 * 1024 * 1024);
        assert!(!config.debug_logging);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SchedulerConfig::new()
            .num_workers(8)
            .stack_size(128 * 1024)
            .debug_logging(true);

        assert_eq!(config.num_workers, 8);
        assert_eq!(config.stack_size, 128 * 1024);
        assert!(config.debug_logging);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let config = SchedulerConfig::new().num_workers(0);
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidValue("num_workers must be > 0"))
        );

        let config = SchedulerConfig::new().num_workers(MAX_WORKERS + 1);
        assert!(config.validate().is_err());

        let config = SchedulerConfig::new().stack_size(4096);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_stack_size_has_floor() {
        assert!(default_stack_size() >= MIN_STACK_SIZE);
    }
}
