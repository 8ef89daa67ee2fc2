//! Coroutine stack memory
//!
//! Each coroutine exclusively owns one [`Stack`]: a fixed-size anonymous
//! mapping with a no-access guard page below the usable range. Stacks are
//! never resized or shared, and are unmapped on drop.
//!
//! ```text
//! base                      base + guard                 base + len
//! |-------- guard ----------|------- usable stack -------|
//!   PROT_NONE                 grows down from top()
//! ```

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub use unix::page_size;
    } else {
        compile_error!("costack stacks are only implemented for unix targets");
    }
}

use std::ptr::NonNull;

/// An owned, guard-paged coroutine stack
pub struct Stack {
    /// Start of the whole mapping (guard page included)
    base: NonNull<u8>,

    /// Total mapping length
    len: usize,

    /// Guard size at the low end
    guard: usize,
}

impl Stack {
    /// Size of the usable region in bytes
    #[inline]
    pub fn usable_size(&self) -> usize {
        self.len - self.guard
    }

    /// Lowest usable address (just above the guard page)
    #[inline]
    pub fn bottom(&self) -> *mut u8 {
        // SAFETY: guard < len, inside the mapping
        unsafe { self.base.as_ptr().add(self.guard) }
    }

    /// Highest address, 16-byte aligned; the stack grows down from here
    #[inline]
    pub fn top(&self) -> *mut u8 {
        let end = self.base.as_ptr() as usize + self.len;
        (end & !0xF) as *mut u8
    }

    /// Check whether an address falls inside the usable region
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.bottom() as usize && addr < self.top() as usize
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("bottom", &self.bottom())
            .field("top", &self.top())
            .field("usable_size", &self.usable_size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use costack_core::error::MemoryError;

    #[test]
    fn test_stack_layout() {
        let stack = Stack::new(64 * 1024).expect("mmap");
        let page = page_size();

        assert!(stack.usable_size() >= 64 * 1024);
        assert_eq!(stack.usable_size() % page, 0);
        assert_eq!(stack.top() as usize % 16, 0);
        assert!(stack.top() > stack.bottom());
        assert!(stack.contains(stack.bottom() as usize));
        assert!(!stack.contains(stack.top() as usize));
        assert!(!stack.contains(stack.bottom() as usize - 1));
    }

    #[test]
    fn test_stack_is_writable() {
        let stack = Stack::new(64 * 1024).expect("mmap");
        unsafe {
            let lo = stack.bottom();
            let hi = stack.top().sub(1);
            lo.write(0xAB);
            hi.write(0xCD);
            assert_eq!(lo.read(), 0xAB);
            assert_eq!(hi.read(), 0xCD);
        }
    }

    #[test]
    fn test_zero_size_rejected() {
        assert_eq!(Stack::new(0).err(), Some(MemoryError::InvalidSize(0)));
        assert_eq!(
            Stack::new(usize::MAX).err(),
            Some(MemoryError::InvalidSize(usize::MAX))
        );
    }

    #[test]
    fn test_odd_size_rounds_up_to_pages() {
        let page = page_size();
        let stack = Stack::new(page * 16 + 1).expect("mmap");
        assert_eq!(stack.usable_size(), page * 17);
    }
}
