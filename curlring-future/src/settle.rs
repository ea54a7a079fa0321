//! Settle-once promise capability.
//!
//! [`Settle`] is the narrow contract a [`FutureValue`](crate::FutureValue)
//! needs from a promise: settle it once, then ask what happened. [`Deferred`]
//! is a single-threaded implementation with no chaining or callbacks.

use std::cell::RefCell;
use std::error::Error as StdError;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{FutureError, SharedError};

/// Why a promise was rejected.
#[derive(Debug, Clone)]
pub enum Reason {
    /// Rejected with an error value. `wait()` surfaces it unchanged.
    Error(SharedError),
    /// Rejected with something that is not an error.
    Value(String),
}

impl Reason {
    /// Reject with an error value.
    pub fn error<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Reason::Error(Arc::new(error))
    }
}

impl From<Reason> for FutureError {
    fn from(reason: Reason) -> Self {
        match reason {
            Reason::Error(e) => FutureError::Rejected(e),
            Reason::Value(v) => FutureError::RejectedValue(v),
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::Error(e) => write!(f, "{e}"),
            Reason::Value(v) => f.write_str(v),
        }
    }
}

/// A promise that is settled at most once.
///
/// `resolve` and `reject` return `false` when the promise had already been
/// settled; the first outcome wins.
pub trait Settle<T> {
    fn resolve(&self, value: T) -> bool;
    fn reject(&self, reason: Reason) -> bool;
    fn is_pending(&self) -> bool;
    fn is_fulfilled(&self) -> bool;
    fn is_rejected(&self) -> bool;
    /// The fulfillment value, if fulfilled.
    fn value(&self) -> Option<T>;
    /// The rejection reason, if rejected.
    fn reason(&self) -> Option<Reason>;
}

enum State<T> {
    Pending,
    Fulfilled(T),
    Rejected(Reason),
}

/// Single-threaded settle-once promise. Clones share the same state.
pub struct Deferred<T> {
    state: Rc<RefCell<State<T>>>,
}

impl<T> Deferred<T> {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(State::Pending)),
        }
    }

    fn settle(&self, next: State<T>) -> bool {
        let mut state = self.state.borrow_mut();
        if !matches!(*state, State::Pending) {
            return false;
        }
        *state = next;
        true
    }
}

impl<T> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match *self.state.borrow() {
            State::Pending => "pending",
            State::Fulfilled(_) => "fulfilled",
            State::Rejected(_) => "rejected",
        };
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}

impl<T: Clone> Settle<T> for Deferred<T> {
    fn resolve(&self, value: T) -> bool {
        self.settle(State::Fulfilled(value))
    }

    fn reject(&self, reason: Reason) -> bool {
        self.settle(State::Rejected(reason))
    }

    fn is_pending(&self) -> bool {
        matches!(*self.state.borrow(), State::Pending)
    }

    fn is_fulfilled(&self) -> bool {
        matches!(*self.state.borrow(), State::Fulfilled(_))
    }

    fn is_rejected(&self) -> bool {
        matches!(*self.state.borrow(), State::Rejected(_))
    }

    fn value(&self) -> Option<T> {
        match &*self.state.borrow() {
            State::Fulfilled(v) => Some(v.clone()),
            _ => None,
        }
    }

    fn reason(&self) -> Option<Reason> {
        match &*self.state.borrow() {
            State::Rejected(r) => Some(r.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_settlement_wins() {
        let d = Deferred::new();
        assert!(d.is_pending());
        assert!(d.resolve(1));
        assert!(!d.resolve(2));
        assert!(!d.reject(Reason::Value("late".into())));
        assert!(d.is_fulfilled());
        assert_eq!(d.value(), Some(1));
        assert!(d.reason().is_none());
    }

    #[test]
    fn clones_share_state() {
        let d: Deferred<u8> = Deferred::new();
        let other = d.clone();
        other.reject(Reason::Value("nope".into()));
        assert!(d.is_rejected());
        assert_eq!(d.reason().map(|r| r.to_string()), Some("nope".into()));
    }

    #[test]
    fn value_reason_maps_to_rejected_value() {
        let err: FutureError = Reason::Value("boom".into()).into();
        assert!(matches!(err, FutureError::RejectedValue(ref v) if v == "boom"));
    }
}
