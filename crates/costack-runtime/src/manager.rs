//! Per-thread coroutine manager
//!
//! One [`CoManager`] exists per OS thread, created lazily on first use
//! (see [`crate::tls::with_manager`]) and destroyed at thread exit. It owns
//! every live coroutine created on that thread, tracks which one is
//! running, and implements the resume/yield protocol.
//!
//! Exactly one coroutine per thread is ever `Running` at a time: resume
//! blocks the resumer until the target yields or dies, and nothing is
//! preempted.

use crate::config;
use crate::coroutine::{Coroutine, CoroutineRef};

use costack_core::callable::LocalCallable;
use costack_core::error::SchedResult;
use costack_core::id::CoroutineId;
use costack_core::kprint;
use costack_core::state::CoStatus;
use costack_core::{kdebug, ktrace};

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::panic;
use std::rc::{Rc, Weak};

/// Bookkeeping for all coroutines of one thread
pub struct CoManager {
    /// Live coroutines by id (exclusive ownership)
    coroutines: RefCell<BTreeMap<CoroutineId, CoroutineRef>>,

    /// Coroutine currently executing on this thread, if any
    running: RefCell<Option<CoroutineRef>>,

    /// Last id handed out; ids are pre-incremented so the first is 1
    last_id: Cell<CoroutineId>,

    /// Stack size used by `create`
    stack_size: Cell<usize>,

    debug: Cell<bool>,

    /// Handed to coroutines as their non-owning back-reference
    this: Weak<CoManager>,
}

impl CoManager {
    /// Create a manager with defaults from the environment/config
    pub fn new() -> Rc<CoManager> {
        Self::with_stack_size(config::default_stack_size())
    }

    pub fn with_stack_size(stack_size: usize) -> Rc<CoManager> {
        Rc::new_cyclic(|this| CoManager {
            coroutines: RefCell::new(BTreeMap::new()),
            running: RefCell::new(None),
            last_id: Cell::new(CoroutineId::NONE),
            stack_size: Cell::new(stack_size),
            debug: Cell::new(config::default_debug_logging()),
            this: this.clone(),
        })
    }

    /// Create a suspended coroutine running `f` with the default stack size
    pub fn create<F>(&self, f: F) -> SchedResult<CoroutineRef>
    where
        F: FnOnce() + 'static,
    {
        self.create_local(LocalCallable::new(f), self.stack_size.get())
    }

    pub fn create_with_stack_size<F>(&self, stack_size: usize, f: F) -> SchedResult<CoroutineRef>
    where
        F: FnOnce() + 'static,
    {
        self.create_local(LocalCallable::new(f), stack_size)
    }

    /// Create a suspended coroutine from a prepared body
    ///
    /// Allocates the stack up front: exhaustion surfaces here as an error,
    /// never as a crash on first resume. The coroutine is registered but
    /// not started.
    pub fn create_local(&self, body: LocalCallable, stack_size: usize) -> SchedResult<CoroutineRef> {
        let id = self.last_id.get().next();
        self.last_id.set(id);

        let co = Coroutine::new(id, body, stack_size, self.this.clone())?;
        self.coroutines.borrow_mut().insert(id, Rc::clone(&co));

        if self.debug.get() {
            kdebug!("created coroutine {} ({} byte stack)", id, co.stack_size());
        }
        Ok(co)
    }

    /// Transfer control into `co` until it yields or finishes
    ///
    /// # Panics
    ///
    /// - if `co` is not `Suspended` (already running, or dead)
    /// - if `co` belongs to another manager
    /// - re-raises a panic that escaped `co`'s body, after `co` has been
    ///   marked dead and deregistered
    pub fn resume(&self, co: &CoroutineRef) {
        assert!(
            co.belongs_to(&self.this),
            "coroutine {} resumed by a manager that does not own it",
            co.id()
        );
        let status = co.status();
        if !status.is_resumable() {
            panic!("cannot resume coroutine {}: status is {}", co.id(), status);
        }

        co.set_status(CoStatus::Running);

        // Keeps the stack mapped until the switch back has completed,
        // even if the coroutine deregisters itself meanwhile.
        let hold = Rc::clone(co);
        let prev = self.set_running(Some(Rc::clone(&hold)));
        let prev_id = prev.as_ref().map(|p| p.id());

        kprint::set_coroutine_id(hold.id().as_u64());
        if self.debug.get() {
            ktrace!("resume coroutine {}", hold.id());
        }

        unsafe { hold.switch_in() };

        match prev_id {
            Some(id) => kprint::set_coroutine_id(id.as_u64()),
            None => kprint::clear_coroutine_id(),
        }
        drop(self.set_running(prev));

        if self.debug.get() {
            ktrace!("coroutine {} gave back control ({})", hold.id(), hold.status());
        }

        if let Some(payload) = hold.take_panic() {
            drop(hold);
            panic::resume_unwind(payload);
        }
    }

    /// Suspend the running coroutine and return to its resumer
    ///
    /// # Panics
    ///
    /// If no coroutine is running on this thread.
    pub fn yield_now(&self) {
        let co = match self.running() {
            Some(co) => co,
            None => panic!("yield_now called with no coroutine running on this thread"),
        };
        let status = co.status();
        if status != CoStatus::Running {
            panic!("cannot yield coroutine {}: status is {}", co.id(), status);
        }

        co.set_status(CoStatus::Suspended);
        if self.debug.get() {
            ktrace!("coroutine {} yields", co.id());
        }

        // The resumer and the running slot keep the allocation alive; a
        // strong reference parked on this stack would leak if the
        // coroutine were never resumed again.
        let raw = Rc::as_ptr(&co);
        drop(co);
        unsafe { (*raw).switch_out() };
    }

    /// Look up a live coroutine
    pub fn lookup(&self, id: CoroutineId) -> Option<CoroutineRef> {
        self.coroutines.borrow().get(&id).cloned()
    }

    /// Remove a coroutine from the table; absent ids are a no-op
    ///
    /// Dropping the last handle of a coroutine suspended mid-body unmaps
    /// its stack without running destructors of values living on it.
    pub fn delete(&self, id: CoroutineId) -> Option<CoroutineRef> {
        self.coroutines.borrow_mut().remove(&id)
    }

    /// Called by a finishing coroutine, on its own stack
    pub(crate) fn on_finished(&self, id: CoroutineId) {
        if self.debug.get() {
            kdebug!("coroutine {} finished", id);
        }
        // `resume` still holds a strong reference; this cannot free the stack
        // we are standing on.
        drop(self.delete(id));
    }

    /// Replace the running slot, returning the previous occupant
    pub fn set_running(&self, co: Option<CoroutineRef>) -> Option<CoroutineRef> {
        self.running.replace(co)
    }

    /// Coroutine currently executing on this thread
    pub fn running(&self) -> Option<CoroutineRef> {
        self.running.borrow().clone()
    }

    /// Id of the running coroutine, `CoroutineId::NONE` at thread level
    pub fn running_id(&self) -> CoroutineId {
        self.running
            .borrow()
            .as_ref()
            .map_or(CoroutineId::NONE, |co| co.id())
    }

    /// Number of live (registered) coroutines
    pub fn len(&self) -> usize {
        self.coroutines.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of live coroutines in ascending order
    pub fn ids(&self) -> Vec<CoroutineId> {
        self.coroutines.borrow().keys().copied().collect()
    }

    pub fn default_stack_size(&self) -> usize {
        self.stack_size.get()
    }

    pub fn set_default_stack_size(&self, size: usize) {
        self.stack_size.set(size);
    }

    pub fn set_debug_logging(&self, enable: bool) {
        self.debug.set(enable);
    }
}
