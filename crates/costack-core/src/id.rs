//! Coroutine identifier type

use core::fmt;

/// Identifier of a coroutine within its owning manager
///
/// Ids are handed out by pre-incrementing a per-manager counter, so the
/// first coroutine on a thread gets id 1. Zero is reserved as the "no
/// coroutine" sentinel. Ids are only unique within one manager (thread).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct CoroutineId(u64);

impl CoroutineId {
    /// Sentinel value indicating no coroutine
    pub const NONE: CoroutineId = CoroutineId(0);

    /// Create a new CoroutineId from a raw value
    #[inline]
    pub const fn new(id: u64) -> Self {
        CoroutineId(id)
    }

    /// Get the raw u64 value
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Check if this is the NONE sentinel
    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_some(self) -> bool {
        self.0 != 0
    }

    /// Convert to Option
    #[inline]
    pub const fn to_option(self) -> Option<CoroutineId> {
        if self.is_none() {
            None
        } else {
            Some(self)
        }
    }

    /// The id following this one
    #[inline]
    pub const fn next(self) -> CoroutineId {
        CoroutineId(self.0 + 1)
    }
}

impl From<u64> for CoroutineId {
    #[inline]
    fn from(id: u64) -> Self {
        CoroutineId(id)
    }
}

impl From<CoroutineId> for u64 {
    #[inline]
    fn from(id: CoroutineId) -> Self {
        id.0
    }
}

impl fmt::Debug for CoroutineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "CoroutineId(NONE)")
        } else {
            write!(f, "CoroutineId({})", self.0)
        }
    }
}

impl fmt::Display for CoroutineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Default for CoroutineId {
    fn default() -> Self {
        CoroutineId::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coroutine_id_basics() {
        let id = CoroutineId::new(42);
        assert_eq!(id.as_u64(), 42);
        assert!(!id.is_none());
        assert!(id.is_some());
        assert_eq!(id.next(), CoroutineId::new(43));
    }

    #[test]
    fn test_coroutine_id_none() {
        let none = CoroutineId::NONE;
        assert!(none.is_none());
        assert_eq!(none.to_option(), None);
        assert_eq!(CoroutineId::default(), none);
        assert_eq!(none.next(), CoroutineId::new(1));
    }

    #[test]
    fn test_coroutine_id_display() {
        assert_eq!(format!("{}", CoroutineId::new(7)), "7");
        assert_eq!(format!("{}", CoroutineId::NONE), "none");
        assert_eq!(format!("{:?}", CoroutineId::new(7)), "CoroutineId(7)");
    }
}
