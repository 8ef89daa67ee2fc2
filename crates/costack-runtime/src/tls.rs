//! Thread-local storage for the coroutine runtime
//!
//! Holds this thread's [`CoManager`] and, on scheduler threads, the
//! worker index.

use crate::manager::CoManager;
use costack_core::kprint;
use std::cell::Cell;
use std::rc::Rc;

thread_local! {
    /// This thread's manager, created on first access
    static MANAGER: Rc<CoManager> = CoManager::new();

    /// Scheduler worker index for this OS thread
    static WORKER_ID: Cell<usize> = const { Cell::new(usize::MAX) };
}

/// Run `f` with this thread's manager
///
/// Prefer this over [`manager`] in code that may run on a coroutine
/// stack: it does not leave a strong reference in the caller's frame.
#[inline]
pub fn with_manager<R>(f: impl FnOnce(&CoManager) -> R) -> R {
    MANAGER.with(|m| f(m))
}

/// Handle to this thread's manager
#[inline]
pub fn manager() -> Rc<CoManager> {
    MANAGER.with(Rc::clone)
}

/// Mark this thread as scheduler worker `id`
#[inline]
pub fn set_worker_id(id: usize) {
    WORKER_ID.with(|cell| cell.set(id));
    kprint::set_worker_id(id as u32);
}

/// Forget the worker index (thread leaving the scheduler)
#[inline]
pub fn clear_worker_id() {
    WORKER_ID.with(|cell| cell.set(usize::MAX));
    kprint::clear_worker_id();
}

/// Worker index, or None if not on a scheduler worker
#[inline]
pub fn current_worker_id() -> Option<usize> {
    let id = WORKER_ID.with(|cell| cell.get());
    if id == usize::MAX {
        None
    } else {
        Some(id)
    }
}
