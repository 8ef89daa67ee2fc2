//! # costack - stackful coroutines on OS threads
//!
//! Cooperative coroutines with their own call stacks, plus a batch
//! scheduler that spreads tasks over a fixed pool of OS threads.
//!
//! ## Features
//!
//! - **Stackful**: every coroutine owns an mmap'd stack (16 MiB of address
//!   space by default, physical pages on demand) with a guard page
//! - **Explicit switching**: `resume` runs a coroutine until it calls
//!   `yield_now` or returns; nothing is preempted
//! - **Per-thread bookkeeping**: each OS thread has its own manager, and
//!   coroutines never migrate between threads
//! - **Keyed affinity**: `schedule_keyed` pins related tasks to one worker
//!
//! ## Quick Start
//!
//! ```ignore
//! use costack::{create, resume, yield_now, CoStatus};
//!
//! let co = create(|| {
//!     println!("first half");
//!     yield_now();
//!     println!("second half");
//! })?;
//!
//! resume(&co);
//! assert_eq!(co.status(), CoStatus::Suspended);
//! resume(&co);
//! assert_eq!(co.status(), CoStatus::Dead);
//! ```
//!
//! Batch work across threads:
//!
//! ```ignore
//! use costack::{Scheduler, SchedulerConfig};
//!
//! let mut sched = Scheduler::new(SchedulerConfig::default())?;
//! for key in 0..100 {
//!     sched.schedule_keyed(key, move || work(key));
//! }
//! let report = sched.run()?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      User Code                              │
//! │       create(), resume(), yield_now(), Scheduler            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Scheduler                              │
//! │        locked pending list, affinity-aware dequeue          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!          ┌───────────────────┼───────────────────┐
//!          ▼                   ▼                   ▼
//!    ┌───────────┐      ┌───────────┐      ┌───────────┐
//!    │ Worker 0  │      │ Worker 1  │      │ Worker N  │
//!    │ (caller)  │      │ CoManager │      │ CoManager │
//!    └───────────┘      └───────────┘      └───────────┘
//!          │                   │                   │
//!          └───────────────────┼───────────────────┘
//!                              ▼
//!    ┌─────────────────────────────────────────────────────────┐
//!    │          Coroutines: guard-paged stacks + context       │
//!    │              switch (x86_64 / aarch64 asm)              │
//!    └─────────────────────────────────────────────────────────┘
//! ```

// Re-export core types
pub use costack_core::{
    Callable,
    LocalCallable,
    CoroutineId,
    CoStatus,
    SchedError,
    SchedResult,
    MemoryError,
    WorkerError,
    ConfigError,
};

// Re-export kprint macros for debug logging
pub use costack_core::{kprint, kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use costack_core::kprint::{LogLevel, init as init_logging, set_log_level, set_flush_enabled, set_time_enabled};

// Re-export env utilities
pub use costack_core::{env_get, env_get_bool, env_get_opt, env_is_set};

// Re-export runtime types
pub use costack_runtime::{
    Affinity,
    CoManager,
    Coroutine,
    CoroutineRef,
    RunReport,
    Scheduler,
    SchedulerConfig,
};

use costack_runtime::tls;
use std::rc::Rc;

/// Create a suspended coroutine on this thread's manager
///
/// The stack is allocated here; the body does not start until the first
/// [`resume`].
pub fn create<F>(f: F) -> SchedResult<CoroutineRef>
where
    F: FnOnce() + 'static,
{
    tls::with_manager(|m| m.create(f))
}

/// Create a suspended coroutine with an explicit stack size
pub fn create_with_stack_size<F>(stack_size: usize, f: F) -> SchedResult<CoroutineRef>
where
    F: FnOnce() + 'static,
{
    tls::with_manager(|m| m.create_with_stack_size(stack_size, f))
}

/// Run `co` until it yields or finishes
///
/// # Panics
///
/// If `co` is not suspended, was created on another thread, or its body
/// panicked (the panic is re-raised here once the coroutine is dead).
#[inline]
pub fn resume(co: &CoroutineRef) {
    tls::with_manager(|m| m.resume(co))
}

/// Suspend the running coroutine and return to whoever resumed it
///
/// # Panics
///
/// If called outside a coroutine.
#[inline]
pub fn yield_now() {
    tls::with_manager(|m| m.yield_now())
}

/// Lifecycle status of `co`; displays as "Suspended", "Running" or "Dead"
#[inline]
pub fn status(co: &CoroutineRef) -> CoStatus {
    co.status()
}

/// Coroutine running on this thread, if any
#[inline]
pub fn running() -> Option<CoroutineRef> {
    tls::with_manager(|m| m.running())
}

/// Id of the running coroutine, `CoroutineId::NONE` outside coroutines
#[inline]
pub fn current_id() -> CoroutineId {
    tls::with_manager(|m| m.running_id())
}

/// Check if currently executing within a coroutine
#[inline]
pub fn is_in_coroutine() -> bool {
    current_id().is_some()
}

/// Look up a live coroutine of this thread by id
pub fn lookup(id: CoroutineId) -> Option<CoroutineRef> {
    tls::with_manager(|m| m.lookup(id))
}

/// This thread's coroutine manager
pub fn manager() -> Rc<CoManager> {
    tls::manager()
}

/// Scheduler worker index of this thread, None outside `Scheduler::run`
#[inline]
pub fn worker_id() -> Option<usize> {
    tls::current_worker_id()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::{Arc, Mutex};
    use std::thread;

    // Each test runs on its own thread, so every test sees a fresh manager.

    const STACK: usize = 256 * 1024;

    #[test]
    fn test_yield_once_lifecycle() {
        let steps = Rc::new(Cell::new(0));
        let s = steps.clone();
        let a = create_with_stack_size(STACK, move || {
            s.set(1);
            yield_now();
            s.set(2);
        })
        .unwrap();
        assert_eq!(status(&a).to_string(), "Suspended");
        assert_eq!(steps.get(), 0);

        resume(&a);
        assert_eq!(a.status(), CoStatus::Suspended);
        assert_eq!(steps.get(), 1);

        resume(&a);
        assert_eq!(status(&a).to_string(), "Dead");
        assert_eq!(steps.get(), 2);

        let third = panic::catch_unwind(AssertUnwindSafe(|| resume(&a)));
        assert!(third.is_err());
        assert_eq!(a.status(), CoStatus::Dead);
    }

    #[test]
    fn test_nested_resume_returns_to_resumer() {
        let trace = Rc::new(RefCell::new(Vec::new()));

        let t = trace.clone();
        let a = create_with_stack_size(STACK, move || {
            t.borrow_mut().push("a1");
            yield_now();
            t.borrow_mut().push("a2");
        })
        .unwrap();

        let t = trace.clone();
        let a2 = a.clone();
        let b = create_with_stack_size(STACK, move || {
            t.borrow_mut().push("b1");
            resume(&a2);
            t.borrow_mut().push("b2");
            yield_now();
            resume(&a2);
            t.borrow_mut().push("b3");
        })
        .unwrap();

        resume(&b);
        assert_eq!(*trace.borrow(), vec!["b1", "a1", "b2"]);
        assert_eq!(a.status(), CoStatus::Suspended);
        assert_eq!(b.status(), CoStatus::Suspended);
        assert!(!is_in_coroutine());

        resume(&b);
        assert_eq!(*trace.borrow(), vec!["b1", "a1", "b2", "a2", "b3"]);
        assert_eq!(a.status(), CoStatus::Dead);
        assert_eq!(b.status(), CoStatus::Dead);
    }

    #[test]
    fn test_n_coroutines_deregister() {
        let cos: Vec<_> = (0..32)
            .map(|i| {
                create_with_stack_size(STACK, move || {
                    if i % 2 == 0 {
                        yield_now();
                    }
                })
                .unwrap()
            })
            .collect();
        assert_eq!(manager().len(), 32);

        for co in &cos {
            while co.status() == CoStatus::Suspended {
                resume(co);
            }
        }
        assert!(manager().is_empty());
        assert!(cos.iter().all(|co| lookup(co.id()).is_none()));
    }

    #[test]
    fn test_first_id_is_one() {
        let co = create_with_stack_size(STACK, || {}).unwrap();
        assert_eq!(co.id(), CoroutineId::new(1));
        assert_eq!(lookup(co.id()).map(|c| c.id()), Some(co.id()));
    }

    #[test]
    fn test_current_id_inside_and_outside() {
        let seen = Rc::new(Cell::new(CoroutineId::NONE));
        let s = seen.clone();
        let co = create_with_stack_size(STACK, move || s.set(current_id())).unwrap();

        assert_eq!(current_id(), CoroutineId::NONE);
        assert!(running().is_none());
        resume(&co);
        assert_eq!(seen.get(), co.id());
        assert_eq!(current_id(), CoroutineId::NONE);
    }

    #[test]
    #[should_panic(expected = "no coroutine running")]
    fn test_yield_outside_coroutine() {
        yield_now();
    }

    #[test]
    #[should_panic(expected = "does not own it")]
    fn test_foreign_manager_resume_rejected() {
        let co = create_with_stack_size(STACK, || {}).unwrap();
        let other = CoManager::with_stack_size(STACK);
        other.resume(&co);
    }

    #[test]
    fn test_body_panic_reaches_resumer() {
        let co = create_with_stack_size(STACK, || {
            yield_now();
            panic!("late failure");
        })
        .unwrap();

        resume(&co);
        let err = panic::catch_unwind(AssertUnwindSafe(|| resume(&co))).unwrap_err();
        assert_eq!(err.downcast_ref::<&str>(), Some(&"late failure"));
        assert_eq!(co.status(), CoStatus::Dead);
        assert!(manager().is_empty());
    }

    #[test]
    fn test_generator_style_exchange() {
        let slot = Rc::new(Cell::new(0u64));
        let s = slot.clone();
        let fib = create_with_stack_size(STACK, move || {
            let (mut a, mut b) = (0u64, 1u64);
            for _ in 0..10 {
                s.set(a);
                yield_now();
                (a, b) = (b, a + b);
            }
        })
        .unwrap();

        let mut out = Vec::new();
        loop {
            resume(&fib);
            if fib.status() == CoStatus::Dead {
                break;
            }
            out.push(slot.get());
        }
        assert_eq!(out, vec![0, 1, 1, 2, 3, 5, 8, 13, 21, 34]);
    }

    #[test]
    fn test_scheduler_keyed_scenario() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let config = SchedulerConfig::new().num_workers(2).stack_size(STACK);
        let mut sched = Scheduler::new(config).unwrap();

        for _ in 0..2 {
            for name in ["f", "g"] {
                let log = log.clone();
                sched.schedule_keyed(1, move || {
                    log.lock().unwrap().push((name, worker_id()));
                });
            }
        }
        let report = sched.run().unwrap();

        assert_eq!(report.completed, 4);
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 4);
        assert!(log.iter().all(|&(_, w)| w == Some(1)));
        assert_eq!(worker_id(), None);
    }

    #[test]
    fn test_scheduler_tasks_use_coroutines_per_thread() {
        let config = SchedulerConfig::new().num_workers(3).stack_size(STACK);
        let mut sched = Scheduler::new(config).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for key in 0..6 {
            let seen = seen.clone();
            sched.schedule_keyed(key, move || {
                let total = Rc::new(Cell::new(0));
                let t = total.clone();
                let inner = create(move || {
                    for i in 1..=3 {
                        t.set(t.get() + i);
                        yield_now();
                    }
                })
                .unwrap();
                while inner.status() != CoStatus::Dead {
                    resume(&inner);
                }
                seen.lock()
                    .unwrap()
                    .push((key, worker_id(), thread::current().id(), total.get()));
            });
        }
        sched.run().unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 6);
        for &(key, w, _, total) in seen.iter() {
            assert_eq!(w, Some(key % 3));
            assert_eq!(total, 6);
        }
    }
}
