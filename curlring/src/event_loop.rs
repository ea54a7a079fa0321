//! Cooperative driver for in-flight transfers.
//!
//! # Nesting
//!
//! libcurl must not be re-entered: a callback fired from
//! `curl_multi_perform` may not call `curl_multi_perform` on the same multi
//! handle. Progress callbacks are nonetheless allowed to issue requests and
//! wait for them. The loop therefore keeps a stack of *levels*, each with its
//! own `Multi`:
//!
//! - A transfer registered while no level is pumping lands on level 0.
//! - A transfer registered from a callback fired while level `L` pumps lands
//!   on the first idle level above `L`.
//! - Forcing a transfer pumps only its own level, so the callback that issued
//!   it regains control once that nested level has settled it. The outer
//!   transfer resumes when the callback returns.
//!
//! Levels beyond `max_nesting_depth` are refused, which bounds runaway
//! recursion in callback chains.
//!
//! # Completion
//!
//! When libcurl reports a transfer done, the loop builds its [`Response`],
//! settles the transfer's promise (resolved with the response, or rejected
//! with its [`TransportError`]), and only then returns the handle to the
//! [`HandlePool`].
//!
//! [`TransportError`]: crate::TransportError

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use curl::multi::{Easy2Handle, Multi};
use curlring_future::{Reason, Settle};
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::error::Error;
use crate::handle::{Collector, TransferHandle};
use crate::metrics::{
    TRANSFERS_ABORTED, TRANSFERS_ACTIVE, TRANSFERS_COMPLETED, TRANSFERS_FAILED,
    TRANSFERS_STARTED,
};
use crate::pool::HandlePool;
use crate::response::Response;

/// Identifies a transfer registered with an [`EventLoop`].
pub type Token = usize;

struct Transfer {
    handle: Easy2Handle<Collector>,
    promise: Rc<dyn Settle<Response>>,
}

struct Level {
    // Dropped before `multi` so each handle detaches from a live multi.
    transfers: RefCell<HashMap<Token, Transfer>>,
    multi: Multi,
    pumping: Cell<bool>,
    /// Aborts requested while this level was pumping.
    doomed: RefCell<Vec<Token>>,
}

impl Level {
    fn new() -> Self {
        Self {
            transfers: RefCell::new(HashMap::new()),
            multi: Multi::new(),
            pumping: Cell::new(false),
            doomed: RefCell::new(Vec::new()),
        }
    }
}

/// Marks a level as pumping for the duration of one `perform()` and routes
/// registrations made meanwhile to the levels above it.
struct Pumping<'a> {
    level: &'a Level,
    depth: &'a Cell<usize>,
    prev_depth: usize,
}

impl<'a> Pumping<'a> {
    fn enter(level: &'a Level, index: usize, depth: &'a Cell<usize>) -> Self {
        level.pumping.set(true);
        let prev_depth = depth.replace(index + 1);
        Self {
            level,
            depth,
            prev_depth,
        }
    }
}

impl Drop for Pumping<'_> {
    fn drop(&mut self) {
        self.level.pumping.set(false);
        self.depth.set(self.prev_depth);
    }
}

/// Drives registered transfers to completion on the calling thread.
pub struct EventLoop {
    pool: Rc<HandlePool>,
    levels: RefCell<Vec<Rc<Level>>>,
    owners: RefCell<HashMap<Token, usize>>,
    depth: Cell<usize>,
    next_token: Cell<Token>,
    max_depth: usize,
    select_timeout: Duration,
}

impl EventLoop {
    pub fn new(pool: Rc<HandlePool>, config: &Config) -> Self {
        Self {
            pool,
            levels: RefCell::new(Vec::new()),
            owners: RefCell::new(HashMap::new()),
            depth: Cell::new(0),
            next_token: Cell::new(0),
            max_depth: config.max_nesting_depth,
            select_timeout: config.select_timeout(),
        }
    }

    /// The pool that completed transfers are released to.
    pub fn pool(&self) -> &Rc<HandlePool> {
        &self.pool
    }

    /// Add a configured handle to the loop. The transfer does not start
    /// moving until some level is pumped.
    ///
    /// On failure the handle goes straight back to the pool.
    pub fn register(
        &self,
        handle: TransferHandle,
        promise: Rc<dyn Settle<Response>>,
    ) -> Result<Token, Error> {
        let index = self.registration_level();
        if index > self.max_depth {
            self.pool.release(handle);
            return Err(Error::NestingTooDeep(index));
        }
        let level = self.level(index);

        let token = self.next_token.get();
        self.next_token.set(token + 1);
        let handle_id = handle.id();

        let mut easy = level.multi.add2(handle.into_easy())?;
        easy.set_token(token)?;
        level
            .transfers
            .borrow_mut()
            .insert(token, Transfer { handle: easy, promise });
        self.owners.borrow_mut().insert(token, index);

        TRANSFERS_STARTED.increment();
        TRANSFERS_ACTIVE.increment();
        debug!(token, handle = handle_id, nesting = index, "transfer registered");
        Ok(token)
    }

    /// Pump the transfer's level until the transfer settles.
    ///
    /// Returns immediately if the transfer already finished or was aborted.
    /// Other transfers on the same level progress too.
    pub fn drive_until(&self, token: Token) -> Result<(), Error> {
        let Some(index) = self.owner(token) else {
            return Ok(());
        };
        let level = self.level(index);
        if level.pumping.get() {
            return Err(Error::ReentrantDrive(token));
        }

        trace!(token, nesting = index, "driving transfer");
        while self.owner(token).is_some() {
            let running = self.pump_once(index, &level)?;
            if self.owner(token).is_none() {
                break;
            }
            if running == 0 {
                warn!(token, nesting = index, "multi handle idle with transfer outstanding");
                break;
            }
            level.multi.wait(&mut [], self.select_timeout)?;
        }
        Ok(())
    }

    /// Pump every idle level until it has no transfers left.
    pub fn run(&self) -> Result<(), Error> {
        let mut index = 0;
        while index < self.levels.borrow().len() {
            let level = self.level(index);
            if !level.pumping.get() {
                while !level.transfers.borrow().is_empty() {
                    if self.pump_once(index, &level)? == 0 {
                        break;
                    }
                    level.multi.wait(&mut [], self.select_timeout)?;
                }
            }
            index += 1;
        }
        Ok(())
    }

    /// Remove an in-flight transfer without settling its promise.
    ///
    /// If the transfer's level is pumping right now, removal happens as soon
    /// as that `perform()` returns. Returns whether the transfer was still in
    /// flight.
    pub fn abort(&self, token: Token) -> bool {
        let Some(index) = self.owners.borrow_mut().remove(&token) else {
            return false;
        };
        let level = self.level(index);
        TRANSFERS_ABORTED.increment();
        if level.pumping.get() {
            debug!(token, nesting = index, "abort deferred until perform returns");
            level.doomed.borrow_mut().push(token);
        } else {
            self.detach(&level, token);
        }
        true
    }

    /// Whether `token` is still in flight.
    pub fn is_active(&self, token: Token) -> bool {
        self.owner(token).is_some()
    }

    /// Number of transfers in flight across all levels.
    pub fn active_count(&self) -> usize {
        self.owners.borrow().len()
    }

    /// Number of levels currently pumping on this thread's stack, plus one
    /// for the innermost.
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    fn owner(&self, token: Token) -> Option<usize> {
        self.owners.borrow().get(&token).copied()
    }

    /// The first level at or above the current depth that is not pumping.
    fn registration_level(&self) -> usize {
        let levels = self.levels.borrow();
        let mut index = self.depth.get();
        while levels.get(index).is_some_and(|l| l.pumping.get()) {
            index += 1;
        }
        index
    }

    fn level(&self, index: usize) -> Rc<Level> {
        let mut levels = self.levels.borrow_mut();
        while levels.len() <= index {
            levels.push(Rc::new(Level::new()));
        }
        Rc::clone(&levels[index])
    }

    /// One round: let libcurl move bytes, then retire doomed and finished
    /// transfers. Returns the number of transfers libcurl still runs.
    fn pump_once(&self, index: usize, level: &Level) -> Result<u32, Error> {
        let running = {
            let _pumping = Pumping::enter(level, index, &self.depth);
            level.multi.perform()
        };

        let doomed = std::mem::take(&mut *level.doomed.borrow_mut());
        for token in doomed {
            self.detach(level, token);
        }
        self.reap(level);
        Ok(running?)
    }

    fn reap(&self, level: &Level) {
        let mut done = Vec::new();
        level.multi.messages(|msg| {
            if let (Ok(token), Some(result)) = (msg.token(), msg.result()) {
                done.push((token, result));
            }
        });

        for (token, result) in done {
            let Some(transfer) = level.transfers.borrow_mut().remove(&token) else {
                continue;
            };
            self.owners.borrow_mut().remove(&token);
            TRANSFERS_ACTIVE.decrement();

            let mut handle = match level.multi.remove2(transfer.handle) {
                Ok(easy) => TransferHandle::from_easy(easy),
                Err(e) => {
                    warn!(token, error = %e, "failed to detach finished transfer");
                    TRANSFERS_FAILED.increment();
                    transfer
                        .promise
                        .reject(Reason::Value(format!("failed to detach transfer: {e}")));
                    continue;
                }
            };

            let response = handle.complete(result);
            match response.error() {
                Some(error) => {
                    TRANSFERS_FAILED.increment();
                    debug!(token, %error, "transfer failed");
                    transfer.promise.reject(Reason::error(error.clone()));
                }
                None => {
                    TRANSFERS_COMPLETED.increment();
                    debug!(token, status = ?response.status(), "transfer complete");
                    transfer.promise.resolve(response);
                }
            }
            self.pool.release(handle);
        }
    }

    fn detach(&self, level: &Level, token: Token) {
        let Some(transfer) = level.transfers.borrow_mut().remove(&token) else {
            return;
        };
        TRANSFERS_ACTIVE.decrement();
        match level.multi.remove2(transfer.handle) {
            Ok(easy) => {
                debug!(token, "transfer aborted");
                self.pool.release(TransferHandle::from_easy(easy));
            }
            Err(e) => warn!(token, error = %e, "failed to detach aborted transfer"),
        }
    }
}
