//! Deferred value forced on demand.

use std::cell::{Cell, OnceCell};
use std::fmt;
use std::rc::Rc;

use crate::error::FutureError;
use crate::settle::Settle;

type WaitFn = Box<dyn FnOnce() -> Result<(), FutureError>>;
type CancelFn = Box<dyn FnMut() -> bool>;

/// A value backed by a settle-once promise that is forced on first access.
///
/// The forcing operation passed to [`new`](FutureValue::new) is expected to
/// drive whatever work settles the promise. It runs at most once: the first
/// [`wait`](FutureValue::wait) takes it before calling it, so a failing or
/// re-entrant forcing operation is never invoked twice. The outcome, value or
/// error, is cached and handed out again on every later `wait()`.
///
/// ```
/// use std::rc::Rc;
/// use std::cell::Cell;
/// use curlring_future::{Deferred, FutureValue, Settle};
///
/// let deferred = Deferred::new();
/// let calls = Rc::new(Cell::new(0));
/// let future = FutureValue::new(deferred.clone(), {
///     let calls = calls.clone();
///     move || {
///         calls.set(calls.get() + 1);
///         deferred.resolve("foo");
///         Ok(())
///     }
/// });
/// assert_eq!(future.wait().unwrap(), "foo");
/// assert_eq!(future.wait().unwrap(), "foo");
/// assert_eq!(calls.get(), 1);
/// ```
pub struct FutureValue<T> {
    promise: Rc<dyn Settle<T>>,
    wait_fn: Cell<Option<WaitFn>>,
    cancel_fn: Cell<Option<CancelFn>>,
    outcome: OnceCell<Result<T, FutureError>>,
    cancelled: Cell<bool>,
    /// Set while the outermost `wait()` runs the forcing operation.
    forcing: Cell<bool>,
}

impl<T: 'static> FutureValue<T> {
    /// Wrap `promise` with a forcing operation.
    pub fn new<P, W>(promise: P, wait_fn: W) -> Self
    where
        P: Settle<T> + 'static,
        W: FnOnce() -> Result<(), FutureError> + 'static,
    {
        Self {
            promise: Rc::new(promise),
            wait_fn: Cell::new(Some(Box::new(wait_fn))),
            cancel_fn: Cell::new(None),
            outcome: OnceCell::new(),
            cancelled: Cell::new(false),
            forcing: Cell::new(false),
        }
    }

    /// Attach a cancellation predicate. It performs any abort of in-flight
    /// work and returns whether the future should be considered cancelled.
    pub fn with_cancel<C>(self, cancel_fn: C) -> Self
    where
        C: FnMut() -> bool + 'static,
    {
        self.cancel_fn.set(Some(Box::new(cancel_fn)));
        self
    }
}

impl<T> FutureValue<T> {
    /// The promise backing this future.
    pub fn promise(&self) -> Rc<dyn Settle<T>> {
        Rc::clone(&self.promise)
    }

    /// Whether [`cancel`](FutureValue::cancel) took effect.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    /// Whether an outcome has been cached.
    pub fn is_realized(&self) -> bool {
        self.outcome.get().is_some()
    }

    /// Cancel the future.
    ///
    /// Has no effect once the outcome has been cached, or when no predicate
    /// was attached. A predicate that returns `false` is kept and consulted
    /// again on the next call. Returns whether the future is now cancelled.
    pub fn cancel(&self) -> bool {
        if self.cancelled.get() {
            return true;
        }
        if self.is_realized() {
            return false;
        }
        let Some(mut cancel_fn) = self.cancel_fn.take() else {
            return false;
        };
        if cancel_fn() {
            self.cancelled.set(true);
            drop(self.wait_fn.take());
            true
        } else {
            self.cancel_fn.set(Some(cancel_fn));
            false
        }
    }
}

impl<T: Clone> FutureValue<T> {
    /// Block until the promise settles and return its value.
    pub fn wait(&self) -> Result<T, FutureError> {
        if self.cancelled.get() {
            return Err(FutureError::Cancelled);
        }
        if let Some(outcome) = self.outcome.get() {
            return outcome.clone();
        }

        // A wait() from inside the forcing operation cannot see the outcome
        // yet. It reports that without caching, so the outer call decides.
        if self.forcing.replace(true) {
            return Err(FutureError::NotResolved);
        }
        let outcome = self.force();
        self.forcing.set(false);
        drop(self.cancel_fn.take());

        // Cancelled while forcing: the forcing operation gave up on the
        // promise, so whatever it left behind is not the outcome.
        if self.cancelled.get() {
            return Err(FutureError::Cancelled);
        }
        let _ = self.outcome.set(outcome.clone());
        outcome
    }

    fn force(&self) -> Result<T, FutureError> {
        if self.promise.is_pending()
            && let Some(wait_fn) = self.wait_fn.take()
        {
            wait_fn()?;
        } else {
            drop(self.wait_fn.take());
        }

        if let Some(value) = self.promise.value() {
            return Ok(value);
        }
        match self.promise.reason() {
            Some(reason) => Err(reason.into()),
            None => Err(FutureError::NotResolved),
        }
    }
}

impl<T> fmt::Debug for FutureValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FutureValue")
            .field("pending", &self.promise.is_pending())
            .field("realized", &self.is_realized())
            .field("cancelled", &self.cancelled.get())
            .finish()
    }
}
