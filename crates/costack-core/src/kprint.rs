//! Kernel-style print macros for costack
//!
//! Thread-safe, optionally-flushing leveled output to stderr, similar to
//! Linux's printk. Every leveled line carries the calling thread's worker
//! index and running coroutine id when those are known:
//!
//! ```text
//! [INFO]  [w1 co3] task started
//! ```
//!
//! # Environment Variables
//!
//! - `COSTACK_FLUSH_EPRINT=1` - Flush stderr after each print (useful for debugging crashes)
//! - `COSTACK_LOG_LEVEL=<level>` - 0=off, 1=error, 2=warn, 3=info, 4=debug, 5=trace
//! - `COSTACK_LOG_TIME=1` - Prefix each leveled line with a wall-clock timestamp
//!
//! # Usage
//!
//! ```ignore
//! use costack_core::{kdebug, kinfo, kwarn, kerror};
//!
//! kdebug!("resuming coroutine {}", id);
//! kinfo!("worker {} started", w);
//! kwarn!("task yielded without finishing");
//! kerror!("task panicked: {}", msg);
//! ```

use std::cell::Cell;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Log levels (matches common conventions)
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    pub fn from_u8(v: u8) -> Self {
        match v {
            0 => LogLevel::Off,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    /// Parse a level name or number; unknown input yields `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Off => "",
            LogLevel::Error => "[ERROR]",
            LogLevel::Warn => "[WARN] ",
            LogLevel::Info => "[INFO] ",
            LogLevel::Debug => "[DEBUG]",
            LogLevel::Trace => "[TRACE]",
        }
    }
}

// Global configuration (initialized once)
static FLUSH_ENABLED: AtomicBool = AtomicBool::new(false);
static TIME_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);
static INITIALIZED: AtomicBool = AtomicBool::new(false);

const NO_CONTEXT: u64 = u64::MAX;

thread_local! {
    static WORKER_CTX: Cell<u64> = const { Cell::new(NO_CONTEXT) };
    static COROUTINE_CTX: Cell<u64> = const { Cell::new(NO_CONTEXT) };
}

/// Initialize logging from environment variables
///
/// Called automatically on first log, but can be called explicitly for
/// deterministic initialization.
pub fn init() {
    if INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    if let Ok(val) = std::env::var("COSTACK_FLUSH_EPRINT") {
        let flush = matches!(val.as_str(), "1" | "true" | "yes" | "on");
        FLUSH_ENABLED.store(flush, Ordering::Relaxed);
    }

    if let Ok(val) = std::env::var("COSTACK_LOG_TIME") {
        let time = matches!(val.as_str(), "1" | "true" | "yes" | "on");
        TIME_ENABLED.store(time, Ordering::Relaxed);
    }

    if let Ok(val) = std::env::var("COSTACK_LOG_LEVEL") {
        let level = LogLevel::parse(&val).unwrap_or(LogLevel::Info);
        LOG_LEVEL.store(level as u8, Ordering::Relaxed);
    }
}

#[inline]
fn ensure_init() {
    if !INITIALIZED.load(Ordering::Relaxed) {
        init();
    }
}

/// Check if flush is enabled
#[inline]
pub fn flush_enabled() -> bool {
    ensure_init();
    FLUSH_ENABLED.load(Ordering::Relaxed)
}

/// Get current log level
#[inline]
pub fn log_level() -> LogLevel {
    ensure_init();
    LogLevel::from_u8(LOG_LEVEL.load(Ordering::Relaxed))
}

/// Set log level programmatically
pub fn set_log_level(level: LogLevel) {
    ensure_init();
    LOG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Set flush mode programmatically
pub fn set_flush_enabled(enabled: bool) {
    ensure_init();
    FLUSH_ENABLED.store(enabled, Ordering::Relaxed);
}

/// Enable or disable the timestamp prefix
pub fn set_time_enabled(enabled: bool) {
    ensure_init();
    TIME_ENABLED.store(enabled, Ordering::Relaxed);
}

/// Check if a log level is enabled
#[inline]
pub fn level_enabled(level: LogLevel) -> bool {
    level != LogLevel::Off && level as u8 <= log_level() as u8
}

/// Tag this thread's log lines with a worker index
pub fn set_worker_id(id: u32) {
    WORKER_CTX.with(|c| c.set(id as u64));
}

pub fn clear_worker_id() {
    WORKER_CTX.with(|c| c.set(NO_CONTEXT));
}

/// Tag this thread's log lines with the running coroutine id
pub fn set_coroutine_id(id: u64) {
    COROUTINE_CTX.with(|c| c.set(id));
}

pub fn clear_coroutine_id() {
    COROUTINE_CTX.with(|c| c.set(NO_CONTEXT));
}

/// Render the `[wN coM]` context tag for the current thread
fn context_tag() -> Option<String> {
    let worker = WORKER_CTX.try_with(|c| c.get()).unwrap_or(NO_CONTEXT);
    let co = COROUTINE_CTX.try_with(|c| c.get()).unwrap_or(NO_CONTEXT);
    match (worker != NO_CONTEXT, co != NO_CONTEXT) {
        (false, false) => None,
        (true, false) => Some(format!("[w{}]", worker)),
        (false, true) => Some(format!("[co{}]", co)),
        (true, true) => Some(format!("[w{} co{}]", worker, co)),
    }
}

fn write_timestamp(out: &mut impl Write) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let _ = write!(out, "[{}.{:03}] ", now.as_secs(), now.subsec_millis());
}

/// Internal: Write and optionally flush
///
/// Uses a lock on stderr to ensure atomic line output.
#[doc(hidden)]
pub fn _kprint_impl(args: std::fmt::Arguments<'_>) {
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = handle.write_fmt(args);
    if flush_enabled() {
        let _ = handle.flush();
    }
}

/// Internal: Write with newline and optionally flush
#[doc(hidden)]
pub fn _kprintln_impl(args: std::fmt::Arguments<'_>) {
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = handle.write_fmt(args);
    let _ = handle.write_all(b"\n");
    if flush_enabled() {
        let _ = handle.flush();
    }
}

/// Internal: Leveled print
#[doc(hidden)]
pub fn _klog_impl(level: LogLevel, args: std::fmt::Arguments<'_>) {
    if !level_enabled(level) {
        return;
    }
    let tag = context_tag();
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    if TIME_ENABLED.load(Ordering::Relaxed) {
        write_timestamp(&mut handle);
    }
    let _ = write!(handle, "{} ", level.prefix());
    if let Some(tag) = tag {
        let _ = write!(handle, "{} ", tag);
    }
    let _ = handle.write_fmt(args);
    let _ = handle.write_all(b"\n");
    if flush_enabled() {
        let _ = handle.flush();
    }
}

// ============================================================================
// Public Macros
// ============================================================================

/// Print to stderr (no newline)
#[macro_export]
macro_rules! kprint {
    ($($arg:tt)*) => {{
        $crate::kprint::_kprint_impl(format_args!($($arg)*));
    }};
}

/// Print to stderr with newline
#[macro_export]
macro_rules! kprintln {
    () => {{
        $crate::kprint::_kprintln_impl(format_args!(""));
    }};
    ($($arg:tt)*) => {{
        $crate::kprint::_kprintln_impl(format_args!($($arg)*));
    }};
}

/// Error level log (always shown unless logging is off)
#[macro_export]
macro_rules! kerror {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl(
            $crate::kprint::LogLevel::Error,
            format_args!($($arg)*)
        );
    }};
}

/// Warning level log
#[macro_export]
macro_rules! kwarn {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl(
            $crate::kprint::LogLevel::Warn,
            format_args!($($arg)*)
        );
    }};
}

/// Info level log
#[macro_export]
macro_rules! kinfo {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl(
            $crate::kprint::LogLevel::Info,
            format_args!($($arg)*)
        );
    }};
}

/// Debug level log
#[macro_export]
macro_rules! kdebug {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl(
            $crate::kprint::LogLevel::Debug,
            format_args!($($arg)*)
        );
    }};
}

/// Trace level log (most verbose)
#[macro_export]
macro_rules! ktrace {
    ($($arg:tt)*) => {{
        $crate::kprint::_klog_impl(
            $crate::kprint::LogLevel::Trace,
            format_args!($($arg)*)
        );
    }};
}

// ============================================================================
// Tests
// ============================================================================
