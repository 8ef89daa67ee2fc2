//! Coroutine status type

use core::fmt;

/// Lifecycle status of a coroutine
///
/// ```text
/// Suspended --resume--> Running --yield--> Suspended
///                       Running --body returns--> Dead
/// ```
///
/// `Dead` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CoStatus {
    /// Body finished (normally or by panic), deregistered from its manager
    Dead = 0,

    /// Currently executing on its owning thread
    Running = 1,

    /// Created but not started, or parked at a yield point
    Suspended = 2,
}

impl CoStatus {
    /// Only suspended coroutines may be resumed
    #[inline]
    pub const fn is_resumable(&self) -> bool {
        matches!(self, CoStatus::Suspended)
    }

    #[inline]
    pub const fn is_terminated(&self) -> bool {
        matches!(self, CoStatus::Dead)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            CoStatus::Dead => "Dead",
            CoStatus::Running => "Running",
            CoStatus::Suspended => "Suspended",
        }
    }
}

impl From<CoStatus> for u8 {
    fn from(status: CoStatus) -> u8 {
        status as u8
    }
}

impl fmt::Display for CoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_predicates() {
        assert!(CoStatus::Suspended.is_resumable());
        assert!(!CoStatus::Running.is_resumable());
        assert!(!CoStatus::Dead.is_resumable());

        assert!(CoStatus::Dead.is_terminated());
        assert!(!CoStatus::Running.is_terminated());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(CoStatus::Dead.to_string(), "Dead");
        assert_eq!(CoStatus::Running.to_string(), "Running");
        assert_eq!(CoStatus::Suspended.to_string(), "Suspended");
        assert_eq!(u8::from(CoStatus::Suspended), 2);
    }
}
