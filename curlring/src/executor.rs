//! Top-level entry point: turns requests into transfers.

use std::rc::Rc;

use curlring_future::{Deferred, FutureError, FutureValue};
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, TransportError};
use crate::event_loop::EventLoop;
use crate::pool::{HandlePool, PoolStats};
use crate::request::Request;
use crate::response::Response;

/// Result of [`TransferExecutor::execute`].
#[derive(Debug)]
pub enum Outcome {
    /// The transfer ran to completion before `execute` returned.
    Ready(Response),
    /// The transfer is registered but has not been driven. Forcing the
    /// future drives it.
    Deferred(FutureValue<Response>),
}

impl Outcome {
    pub fn is_deferred(&self) -> bool {
        matches!(self, Outcome::Deferred(_))
    }

    /// The response, forcing the future if needed.
    pub fn wait(self) -> Result<Response, Error> {
        match self {
            Outcome::Ready(response) => Ok(response),
            Outcome::Deferred(future) => Ok(future.wait()?),
        }
    }
}

/// Issues HTTP requests over a shared [`HandlePool`] and [`EventLoop`].
///
/// Cloning is cheap and yields an executor sharing the same pool and loop,
/// which is how a progress callback issues requests of its own:
///
/// ```rust,no_run
/// use curlring::{ClientOptions, Request, TransferExecutor};
///
/// let executor = TransferExecutor::default();
/// let inner = executor.clone();
/// let request = Request::get("/slow")
///     .header("host", "localhost:8080")
///     .client(ClientOptions::default().progress(move |_| {
///         let _ = inner.execute_sync(Request::get("/ping").header("host", "localhost:8080"));
///     }));
/// let response = executor.execute_sync(request)?;
/// println!("{:?}", response.status());
/// # Ok::<(), curlring::Error>(())
/// ```
#[derive(Clone)]
pub struct TransferExecutor {
    pool: Rc<HandlePool>,
    event_loop: Rc<EventLoop>,
}

impl TransferExecutor {
    pub fn new(config: Config) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self::with_config(&config))
    }

    fn with_config(config: &Config) -> Self {
        let pool = Rc::new(HandlePool::new(config.max_handles));
        let event_loop = Rc::new(EventLoop::new(Rc::clone(&pool), config));
        Self { pool, event_loop }
    }

    /// Issue `request`.
    ///
    /// With [`ClientOptions::future`](crate::ClientOptions::future) set the
    /// transfer is only registered and a [`Outcome::Deferred`] is returned.
    /// Otherwise the transfer is driven to completion here. Transport
    /// failures are never an `Err`: they come back as a response carrying
    /// [`Response::error`], or reject the future.
    pub fn execute(&self, request: Request) -> Result<Outcome, Error> {
        let future_mode = request.client.future;
        let future = self.submit(request)?;
        if future_mode {
            return Ok(Outcome::Deferred(future));
        }

        match future.wait() {
            Ok(response) => Ok(Outcome::Ready(response)),
            Err(e) => match e.downcast_ref::<TransportError>() {
                Some(error) => {
                    let stats = error.transfer_stats().cloned();
                    Ok(Outcome::Ready(Response::failed(error.clone(), stats)))
                }
                None => Err(e.into()),
            },
        }
    }

    /// Issue `request` and drive it to completion.
    pub fn execute_sync(&self, mut request: Request) -> Result<Response, Error> {
        request.client.future = false;
        self.execute(request)?.wait()
    }

    /// Issue `request` without driving it, whatever its future flag says.
    pub fn execute_future(&self, request: Request) -> Result<FutureValue<Response>, Error> {
        self.submit(request)
    }

    /// Configure a handle for `request` and register it with the loop.
    fn submit(&self, request: Request) -> Result<FutureValue<Response>, Error> {
        if request.host().is_none() {
            return Err(Error::MissingHost);
        }

        let mut handle = self.pool.acquire();
        if let Err(e) = handle.configure(request) {
            self.pool.release(handle);
            return Err(e);
        }

        let promise = Deferred::new();
        let token = self
            .event_loop
            .register(handle, Rc::new(promise.clone()))?;
        debug!(token, "transfer submitted");

        let drive = Rc::clone(&self.event_loop);
        let abort = Rc::clone(&self.event_loop);
        Ok(FutureValue::new(promise, move || {
            drive.drive_until(token).map_err(FutureError::failed)
        })
        .with_cancel(move || abort.abort(token)))
    }

    /// Drive every registered transfer to completion.
    pub fn run(&self) -> Result<(), Error> {
        self.event_loop.run()
    }

    pub fn pool(&self) -> &HandlePool {
        &self.pool
    }

    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl Default for TransferExecutor {
    fn default() -> Self {
        Self::with_config(&Config::default())
    }
}
