//! Unix stack implementation using mmap

use super::Stack;
use costack_core::constants::DEFAULT_PAGE_SIZE;
use costack_core::error::MemoryError;
use nix::unistd::{sysconf, SysconfVar};
use std::ptr::NonNull;
use std::sync::OnceLock;

/// System page size, queried once
pub fn page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(|| match sysconf(SysconfVar::PAGE_SIZE) {
        Ok(Some(n)) if n > 0 => n as usize,
        _ => DEFAULT_PAGE_SIZE,
    })
}

fn last_errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

impl Stack {
    /// Map a new stack with at least `size` usable bytes
    ///
    /// The size is rounded up to whole pages and one extra guard page is
    /// mapped below it with PROT_NONE, so overflow faults instead of
    /// scribbling over a neighbour. Physical pages are committed lazily.
    pub fn new(size: usize) -> Result<Stack, MemoryError> {
        let page = page_size();
        if size == 0 {
            return Err(MemoryError::InvalidSize(size));
        }
        let usable = size
            .checked_add(page - 1)
            .map(|s| s & !(page - 1))
            .ok_or(MemoryError::InvalidSize(size))?;
        let len = usable
            .checked_add(page)
            .ok_or(MemoryError::InvalidSize(size))?;

        // SAFETY: anonymous private mapping, no aliasing with existing memory
        let base = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE,
                -1,
                0,
            )
        };

        if base == libc::MAP_FAILED {
            return Err(MemoryError::AllocationFailed(last_errno()));
        }

        // Guard page at the low end (stack grows down into it)
        let ret = unsafe { libc::mprotect(base, page, libc::PROT_NONE) };
        if ret != 0 {
            let errno = last_errno();
            unsafe {
                libc::munmap(base, len);
            }
            return Err(MemoryError::ProtectionFailed(errno));
        }

        let base = NonNull::new(base as *mut u8).ok_or(MemoryError::AllocationFailed(0))?;

        Ok(Stack {
            base,
            len,
            guard: page,
        })
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        // SAFETY: base/len describe exactly the mapping created in `new`
        unsafe {
            libc::munmap(self.base.as_ptr() as *mut libc::c_void, self.len);
        }
    }
}
