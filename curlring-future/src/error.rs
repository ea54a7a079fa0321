use std::error::Error as StdError;
use std::sync::Arc;

/// A shareable error value. Cached outcomes are handed out more than once,
/// so errors are reference counted rather than boxed.
pub type SharedError = Arc<dyn StdError + Send + Sync + 'static>;

/// Errors surfaced by [`FutureValue::wait`](crate::FutureValue::wait).
#[derive(Debug, Clone, thiserror::Error)]
pub enum FutureError {
    /// `wait()` was called on a cancelled future.
    #[error("cannot access the value of a cancelled future")]
    Cancelled,

    /// The forcing operation returned without settling the promise.
    #[error("Waiting did not resolve future")]
    NotResolved,

    /// The promise was rejected with an error value; carried as-is.
    #[error(transparent)]
    Rejected(SharedError),

    /// The promise was rejected with a reason that is not an error value.
    #[error("promise rejected with reason: {0}")]
    RejectedValue(String),

    /// The forcing operation itself failed.
    #[error(transparent)]
    Failed(SharedError),
}

impl FutureError {
    /// Wrap an arbitrary error raised by a forcing operation.
    pub fn failed<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        FutureError::Failed(Arc::new(error))
    }

    /// Returns true for [`FutureError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FutureError::Cancelled)
    }

    /// The carried error for `Rejected` and `Failed`, if any.
    pub fn inner(&self) -> Option<&SharedError> {
        match self {
            FutureError::Rejected(e) | FutureError::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Downcast the carried error to a concrete type.
    pub fn downcast_ref<E: StdError + 'static>(&self) -> Option<&E> {
        self.inner().and_then(|e| e.downcast_ref::<E>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("out of bounds")]
    struct OutOfBounds;

    #[test]
    fn not_resolved_message() {
        assert_eq!(
            FutureError::NotResolved.to_string(),
            "Waiting did not resolve future"
        );
    }

    #[test]
    fn failed_is_transparent() {
        let err = FutureError::failed(OutOfBounds);
        assert_eq!(err.to_string(), "out of bounds");
        assert!(err.downcast_ref::<OutOfBounds>().is_some());
        assert!(!err.is_cancelled());
    }

    #[test]
    fn cancelled_carries_nothing() {
        assert!(FutureError::Cancelled.inner().is_none());
        assert!(FutureError::Cancelled.is_cancelled());
    }
}
