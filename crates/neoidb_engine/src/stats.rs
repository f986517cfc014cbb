//! Engine statistics.
//!
//! Counters for the transaction lifecycle of a [`crate::MemoryEngine`].
//!
//! # Usage
//!
//! ```rust
//! use neoidb_engine::MemoryEngine;
//!
//! let engine = MemoryEngine::new();
//! let stats = engine.stats();
//! assert_eq!(stats.transactions_started, 0);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};

/// Engine statistics.
///
/// All counters are atomic and monotonically increasing.
#[derive(Debug, Default)]
pub struct EngineStats {
    /// Databases opened successfully.
    databases_opened: AtomicU64,
    /// Upgrade phases that committed.
    upgrades: AtomicU64,
    /// Transactions granted.
    transactions_started: AtomicU64,
    /// Transactions that committed.
    transactions_committed: AtomicU64,
    /// Transactions rolled back.
    transactions_aborted: AtomicU64,
    /// Transactions that failed at commit.
    transactions_errored: AtomicU64,
}

impl EngineStats {
    /// Creates a new stats instance.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_open(&self) {
        self.databases_opened.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_upgrade(&self) {
        self.upgrades.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_start(&self) {
        self.transactions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_commit(&self) {
        self.transactions_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_abort(&self) {
        self.transactions_aborted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transaction_error(&self) {
        self.transactions_errored.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            databases_opened: self.databases_opened.load(Ordering::Relaxed),
            upgrades: self.upgrades.load(Ordering::Relaxed),
            transactions_started: self.transactions_started.load(Ordering::Relaxed),
            transactions_committed: self.transactions_committed.load(Ordering::Relaxed),
            transactions_aborted: self.transactions_aborted.load(Ordering::Relaxed),
            transactions_errored: self.transactions_errored.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of engine statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Databases opened successfully.
    pub databases_opened: u64,
    /// Upgrade phases that committed.
    pub upgrades: u64,
    /// Transactions granted.
    pub transactions_started: u64,
    /// Transactions that committed.
    pub transactions_committed: u64,
    /// Transactions rolled back.
    pub transactions_aborted: u64,
    /// Transactions that failed at commit.
    pub transactions_errored: u64,
}
