//! Bounded pool of idle transfer handles.
//!
//! Handles are created lazily when the pool is empty and reused most
//! recently released first, which keeps warm connections in play. On release
//! a full pool closes the incoming handle instead of keeping it. It is
//! single-threaded (no Arc, no Mutex); the event loop and executor share it
//! through an `Rc`.

use std::cell::{Cell, RefCell};

use tracing::debug;

use crate::handle::TransferHandle;
use crate::metrics::{HANDLES_CREATED, HANDLES_DISCARDED, HANDLES_REUSED};

/// Handle counters for one pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Handles constructed because no idle handle was available.
    pub created: u64,
    /// Acquisitions served from the idle set.
    pub reused: u64,
    /// Handles closed on release because the pool was full.
    pub discarded: u64,
}

/// A bounded cache of idle [`TransferHandle`]s.
pub struct HandlePool {
    idle: RefCell<Vec<TransferHandle>>,
    max_handles: usize,
    next_id: Cell<u64>,
    stats: Cell<PoolStats>,
}

impl HandlePool {
    /// Create an empty pool. `None` keeps every released handle.
    pub fn new(max_handles: Option<usize>) -> Self {
        HandlePool {
            idle: RefCell::new(Vec::new()),
            max_handles: max_handles.unwrap_or(usize::MAX),
            next_id: Cell::new(0),
            stats: Cell::new(PoolStats::default()),
        }
    }

    /// Take an idle handle, or create one if none is idle.
    pub fn acquire(&self) -> TransferHandle {
        let reused = self.idle.borrow_mut().pop();
        let mut stats = self.stats.get();
        let handle = match reused {
            Some(handle) => {
                stats.reused += 1;
                HANDLES_REUSED.increment();
                debug!(handle = handle.id(), "reusing idle handle");
                handle
            }
            None => {
                let id = self.next_id.get();
                self.next_id.set(id + 1);
                stats.created += 1;
                HANDLES_CREATED.increment();
                debug!(handle = id, "creating handle");
                TransferHandle::new(id)
            }
        };
        self.stats.set(stats);
        handle
    }

    /// Return a handle after its transfer finished.
    ///
    /// Below the cap the handle is cleared of per-request state and kept;
    /// otherwise it is closed right away.
    pub fn release(&self, mut handle: TransferHandle) {
        if self.idle_count() >= self.max_handles {
            let mut stats = self.stats.get();
            stats.discarded += 1;
            self.stats.set(stats);
            HANDLES_DISCARDED.increment();
            debug!(handle = handle.id(), max = self.max_handles, "pool full, closing handle");
            drop(handle);
            return;
        }
        handle.clear();
        self.idle.borrow_mut().push(handle);
    }

    /// Number of idle handles.
    pub fn idle_count(&self) -> usize {
        self.idle.borrow().len()
    }

    /// Configured cap on idle handles.
    pub fn max_handles(&self) -> usize {
        self.max_handles
    }

    pub fn stats(&self) -> PoolStats {
        self.stats.get()
    }

    /// Close every idle handle.
    pub fn close_all(&self) {
        let idle = std::mem::take(&mut *self.idle.borrow_mut());
        drop(idle);
    }
}

impl Default for HandlePool {
    fn default() -> Self {
        Self::new(None)
    }
}
