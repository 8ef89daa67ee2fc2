//! Environment variable utilities
//!
//! Runtime overrides for compile-time defaults (`COSTACK_*` variables).
//!
//! ```ignore
//! use costack_core::env::{env_get, env_get_bool};
//!
//! let workers: usize = env_get("COSTACK_NUM_WORKERS", 3);
//! let debug = env_get_bool("COSTACK_DEBUG", false);
//! ```

use std::str::FromStr;

/// Get environment variable parsed as type T, or return default
///
/// Unset or unparsable values fall back to `default`.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as boolean
///
/// Accepts "1", "true", "yes", "on" (case-insensitive) as true and
/// "0", "false", "no", "off" as false. Anything else, including unset,
/// returns the default.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Get environment variable as optional value
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Check if environment variable is set (regardless of value)
#[inline]
pub fn env_is_set(key: &str) -> bool {
    std::env::var_os(key).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test owns its variable names; the harness runs tests in parallel.

    #[test]
    fn test_env_get_default() {
        let val: usize = env_get("__COSTACK_TEST_UNSET__", 42);
        assert_eq!(val, 42);
        assert!(!env_is_set("__COSTACK_TEST_UNSET__"));
        let none: Option<usize> = env_get_opt("__COSTACK_TEST_UNSET__");
        assert!(none.is_none());
    }

    #[test]
    fn test_env_get_with_set_var() {
        std::env::set_var("__COSTACK_TEST_NUM__", " 123 ");
        let val: usize = env_get("__COSTACK_TEST_NUM__", 0);
        assert_eq!(val, 123);
        std::env::remove_var("__COSTACK_TEST_NUM__");
    }

    #[test]
    fn test_env_get_invalid_parse() {
        std::env::set_var("__COSTACK_TEST_INVALID__", "sixteen megs");
        let val: usize = env_get("__COSTACK_TEST_INVALID__", 99);
        assert_eq!(val, 99);
        std::env::remove_var("__COSTACK_TEST_INVALID__");
    }

    #[test]
    fn test_env_get_bool_variants() {
        let key = "__COSTACK_TEST_BOOL__";
        for on in ["1", "true", "TRUE", "yes", "on"] {
            std::env::set_var(key, on);
            assert!(env_get_bool(key, false), "{on}");
        }
        for off in ["0", "false", "no", "off"] {
            std::env::set_var(key, off);
            assert!(!env_get_bool(key, true), "{off}");
        }
        std::env::set_var(key, "garbage");
        assert!(env_get_bool(key, true));
        assert!(!env_get_bool(key, false));
        std::env::remove_var(key);
        assert!(env_get_bool(key, true));
    }
}
