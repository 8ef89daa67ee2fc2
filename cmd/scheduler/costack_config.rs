//! costack Configuration File
//!
//! Example compile-time configuration for costack.
//! Copy this file to your project and modify as needed.
//!
//! Usage:
//!   COSTACK_CONFIG_RS=./costack_config.rs cargo build --features custom-config
//!
//! You only need to include parameters you want to change.
//! All other parameters will use library defaults.
//!
//! These values can still be overridden at runtime via environment variables:
//!   COSTACK_NUM_WORKERS=8 ./my-app

// Scheduler workers, including the thread that calls run()
pub const NUM_WORKERS: usize = 4;

// Stack reserved for each coroutine (bytes)
pub const STACK_SIZE: usize = 1024 * 1024;

// Log coroutine lifecycle and dequeue decisions
pub const DEBUG_LOGGING: bool = false;
