//! Type-erased deferred calls
//!
//! A [`Callable`] wraps a function together with everything it captured by
//! value. It is invoked at most once: `invoke` takes `self`, so a consumed
//! callable cannot be touched again.
//!
//! [`Callable`] is `Send` and is what the scheduler queues. Coroutine bodies
//! never leave their thread, so they are stored as [`LocalCallable`], which
//! may capture `Rc` handles to other coroutines.

use core::fmt;

/// A `Send` zero-argument call, invoked exactly once
pub struct Callable {
    f: Box<dyn FnOnce() + Send + 'static>,
}

impl Callable {
    /// Wrap a closure
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self { f: Box::new(f) }
    }

    /// Bind a function to a by-value snapshot of its argument
    ///
    /// ```ignore
    /// let task = Callable::bind(work, 12345);
    /// task.invoke(); // calls work(12345)
    /// ```
    pub fn bind<F, A>(f: F, arg: A) -> Self
    where
        F: FnOnce(A) + Send + 'static,
        A: Send + 'static,
    {
        Self::new(move || f(arg))
    }

    /// Run the wrapped call, consuming it
    ///
    /// Panics raised by the wrapped function propagate unchanged.
    #[inline]
    pub fn invoke(self) {
        (self.f)()
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callable(..)")
    }
}

/// A thread-bound zero-argument call, invoked exactly once
pub struct LocalCallable {
    f: Box<dyn FnOnce() + 'static>,
}

impl LocalCallable {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self { f: Box::new(f) }
    }

    pub fn bind<F, A>(f: F, arg: A) -> Self
    where
        F: FnOnce(A) + 'static,
        A: 'static,
    {
        Self::new(move || f(arg))
    }

    #[inline]
    pub fn invoke(self) {
        (self.f)()
    }
}

impl From<Callable> for LocalCallable {
    fn from(c: Callable) -> Self {
        LocalCallable { f: c.f }
    }
}

impl fmt::Debug for LocalCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LocalCallable(..)")
    }
}
