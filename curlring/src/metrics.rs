//! curlring transfer metrics.
//!
//! Process-wide counters for handle reuse and transfer outcomes. Per-pool
//! figures are available from [`HandlePool::stats`](crate::HandlePool::stats).

use metriken::{Counter, Gauge, metric};

// ── Handles ──────────────────────────────────────────────────────

#[metric(
    name = "curlring/handles/created",
    description = "Easy handles created because the pool was empty"
)]
pub static HANDLES_CREATED: Counter = Counter::new();

#[metric(
    name = "curlring/handles/reused",
    description = "Easy handles taken from the idle pool"
)]
pub static HANDLES_REUSED: Counter = Counter::new();

#[metric(
    name = "curlring/handles/discarded",
    description = "Easy handles closed on release because the pool was full"
)]
pub static HANDLES_DISCARDED: Counter = Counter::new();

// ── Transfers ────────────────────────────────────────────────────

#[metric(
    name = "curlring/transfers/started",
    description = "Transfers registered with the event loop"
)]
pub static TRANSFERS_STARTED: Counter = Counter::new();

#[metric(
    name = "curlring/transfers/completed",
    description = "Transfers that produced an HTTP response"
)]
pub static TRANSFERS_COMPLETED: Counter = Counter::new();

#[metric(
    name = "curlring/transfers/failed",
    description = "Transfers that ended with a transport error"
)]
pub static TRANSFERS_FAILED: Counter = Counter::new();

#[metric(
    name = "curlring/transfers/aborted",
    description = "Transfers removed from the loop by cancellation"
)]
pub static TRANSFERS_ABORTED: Counter = Counter::new();

#[metric(
    name = "curlring/transfers/active",
    description = "Transfers currently in flight"
)]
pub static TRANSFERS_ACTIVE: Gauge = Gauge::new();
