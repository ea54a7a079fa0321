//! Deferred values over settle-once promises.
//!
//! A [`FutureValue`] pairs a promise implementing [`Settle`] with a forcing
//! operation that drives the work which settles it. Nothing runs until the
//! first [`wait`](FutureValue::wait); from then on the outcome is cached.
//!
//! This is not a `std::future::Future`: forcing blocks the calling thread,
//! and there is no waker. It exists to bridge an event loop that is driven
//! cooperatively on one thread to callers that want a plain value.

pub mod error;
pub mod future;
pub mod settle;

pub use error::{FutureError, SharedError};
pub use future::FutureValue;
pub use settle::{Deferred, Reason, Settle};
