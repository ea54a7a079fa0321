//! Synchronous and deferred HTTP transfers on top of libcurl.
//!
//! Requests are executed on reusable libcurl easy handles drawn from a
//! bounded pool, and multiplexed by a single-threaded event loop built on the
//! multi interface. A request either runs to completion before `execute`
//! returns, or comes back as a [`FutureValue`] that drives the loop when it is
//! first forced.
//!
//! # Architecture
//!
//! `TransferExecutor` validates a `Request`, takes a `TransferHandle` from the
//! `HandlePool`, configures it and registers it with the `EventLoop`. The
//! loop pumps libcurl until the transfer settles its promise, then hands the
//! handle back to the pool, which keeps it for the next request or closes it
//! if the pool is full.
//!
//! Progress callbacks run in the middle of a transfer and may issue and wait
//! on further requests through a clone of the executor. Each nesting level
//! gets its own multi handle so libcurl is never re-entered; see
//! [`event_loop`].
//!
//! # Example
//!
//! ```rust,no_run
//! use curlring::{ClientOptions, Config, Request, TransferExecutor};
//!
//! let executor = TransferExecutor::new(Config::default().max_handles(8))?;
//!
//! let resp = executor.execute_sync(
//!     Request::get("/api/data")
//!         .header("host", "example.com")
//!         .header("authorization", "Bearer tok")
//!         .client(ClientOptions::default().timeout(5.0)),
//! )?;
//! match resp.error() {
//!     Some(err) => eprintln!("{err}"),
//!     None => assert_eq!(resp.status(), Some(200)),
//! }
//!
//! // Deferred: nothing moves until the future is forced.
//! let a = executor.execute_future(Request::get("/a").header("host", "example.com"))?;
//! let b = executor.execute_future(Request::get("/b").header("host", "example.com"))?;
//! let a = a.wait()?; // drives `b` along with it
//! let b = b.wait()?;
//! # let _ = (a, b);
//! # Ok::<(), curlring::Error>(())
//! ```
//!
//! # Errors
//!
//! | Failure | Surfaces as |
//! |---------|-------------|
//! | Missing host, bad option, libcurl setup | `Err(Error)` from `execute` |
//! | Transport failure, synchronous | `Response` with `error()` set |
//! | Transport failure, deferred | `FutureError::Rejected` carrying the `TransportError` |
//! | Cancelled future | `FutureError::Cancelled` |

pub mod body;
pub mod config;
pub mod error;
pub mod event_loop;
pub mod executor;
pub mod handle;
pub mod metrics;
pub mod pool;
pub mod request;
pub mod response;

pub use body::Body;
pub use config::Config;
pub use curlring_future::{Deferred, FutureError, FutureValue, Reason, Settle};
pub use error::{Error, TransportError};
pub use event_loop::{EventLoop, Token};
pub use executor::{Outcome, TransferExecutor};
pub use handle::TransferHandle;
pub use pool::{HandlePool, PoolStats};
pub use request::{ClientOptions, CurlOption, Progress, ProgressFn, Request};
pub use response::{Response, TransferStats};
