//! Coroutine objects and the entry trampoline
//!
//! This is the only module that touches stacks and saved contexts. Every
//! other component goes through [`CoManager`]'s create / resume / yield.
//!
//! # Teardown ordering
//!
//! A finishing coroutine marks itself `Dead` and deregisters from its
//! manager while still running on its own stack, then switches back to
//! its caller for the last time. The stack must stay mapped until that
//! switch has completed, so the coroutine never relies on a reference it
//! holds itself: [`CoManager::resume`] keeps a strong `Rc` on the
//! *resumer's* stack across the switch and drops it only after control
//! is back. The final release of stack memory therefore always happens on
//! the resuming side.
//!
//! # Panics in bodies
//!
//! Unwinding must not cross the assembly entry frame. The trampoline
//! catches the payload, finishes teardown as usual, and the `resume` call
//! that observes the death re-raises it with `resume_unwind`.

use crate::current_arch::{context_switch, init_context, SavedContext};
use crate::manager::CoManager;
use crate::memory::Stack;

use costack_core::callable::LocalCallable;
use costack_core::error::MemoryError;
use costack_core::id::CoroutineId;
use costack_core::state::CoStatus;

use std::any::Any;
use std::cell::{Cell, UnsafeCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

/// Shared handle to a coroutine
///
/// `Rc` keeps handles on the thread that created them; cross-thread resume
/// is not supported by the saved-context format.
pub type CoroutineRef = Rc<Coroutine>;

type PanicPayload = Box<dyn Any + Send + 'static>;

/// One suspendable execution with its own stack
pub struct Coroutine {
    id: CoroutineId,
    status: Cell<CoStatus>,

    /// This coroutine's own suspended registers
    saved: UnsafeCell<SavedContext>,

    /// Registers of whoever last resumed it
    caller: UnsafeCell<SavedContext>,

    /// Taken exactly once by the trampoline
    body: Cell<Option<LocalCallable>>,

    /// Panic captured on the coroutine stack, re-raised by `resume`
    panic: Cell<Option<PanicPayload>>,

    /// Non-owning back-reference used to deregister on completion
    manager: Weak<CoManager>,

    stack: Stack,
}

impl Coroutine {
    /// Allocate the stack and prime the entry context
    ///
    /// Does not register with the manager and does not start execution.
    pub(crate) fn new(
        id: CoroutineId,
        body: LocalCallable,
        stack_size: usize,
        manager: Weak<CoManager>,
    ) -> Result<CoroutineRef, MemoryError> {
        let stack = Stack::new(stack_size)?;
        let co = Rc::new(Coroutine {
            id,
            status: Cell::new(CoStatus::Suspended),
            saved: UnsafeCell::new(SavedContext::default()),
            caller: UnsafeCell::new(SavedContext::default()),
            body: Cell::new(Some(body)),
            panic: Cell::new(None),
            manager,
            stack,
        });

        // The Rc allocation never moves, so its address is a stable
        // argument for the trampoline.
        unsafe {
            init_context(
                co.saved.get(),
                co.stack.top(),
                coroutine_main,
                Rc::as_ptr(&co) as usize,
            );
        }

        Ok(co)
    }

    #[inline]
    pub fn id(&self) -> CoroutineId {
        self.id
    }

    #[inline]
    pub fn status(&self) -> CoStatus {
        self.status.get()
    }

    #[inline]
    pub(crate) fn set_status(&self, status: CoStatus) {
        self.status.set(status);
    }

    /// Usable stack bytes
    pub fn stack_size(&self) -> usize {
        self.stack.usable_size()
    }

    /// Whether this coroutine was created by `manager`
    pub(crate) fn belongs_to(&self, manager: &Weak<CoManager>) -> bool {
        self.manager.ptr_eq(manager)
    }

    pub(crate) fn take_panic(&self) -> Option<PanicPayload> {
        self.panic.take()
    }

    /// Switch from the resumer into this coroutine
    ///
    /// # Safety
    ///
    /// Must be called on the owning thread with the coroutine marked
    /// Running, and the caller must hold a strong reference until this
    /// returns.
    #[inline]
    pub(crate) unsafe fn switch_in(&self) {
        context_switch(self.caller.get(), self.saved.get());
    }

    /// Switch from this coroutine back to its last resumer
    ///
    /// # Safety
    ///
    /// Must be called on this coroutine's own stack.
    #[inline]
    pub(crate) unsafe fn switch_out(&self) {
        context_switch(self.saved.get(), self.caller.get());
    }

    /// Mark dead and drop out of the manager's table
    fn finish(&self) {
        self.status.set(CoStatus::Dead);
        if let Some(manager) = self.manager.upgrade() {
            manager.on_finished(self.id);
        }
    }
}

impl fmt::Debug for Coroutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coroutine")
            .field("id", &self.id)
            .field("status", &self.status.get())
            .field("stack", &self.stack)
            .finish()
    }
}

/// Entry point of every coroutine, running on its own stack
extern "C" fn coroutine_main(arg: usize) -> ! {
    // SAFETY: `arg` is the Rc allocation address set in `Coroutine::new`,
    // kept alive by the resumer for as long as we run.
    let co = unsafe { &*(arg as *const Coroutine) };

    if let Some(body) = co.body.take() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || body.invoke())) {
            co.panic.set(Some(payload));
        }
    }

    co.finish();

    // Nothing owning memory is alive in this frame any more; `co` is a
    // plain borrow of the resumer-held allocation.
    unsafe { co.switch_out() };

    // A dead coroutine is never switched into again.
    std::process::abort()
}
