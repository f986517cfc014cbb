//! Per-operation transaction context.

use neoidb_engine::TransactionMode;

/// What one operation asks of the transaction adapter: a store and an
/// access mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionContext {
    store: String,
    mode: TransactionMode,
}

impl TransactionContext {
    /// Creates a context.
    pub fn new(store: impl Into<String>, mode: TransactionMode) -> Self {
        Self {
            store: store.into(),
            mode,
        }
    }

    /// A read-only context on `store`.
    pub fn read_only(store: impl Into<String>) -> Self {
        Self::new(store, TransactionMode::ReadOnly)
    }

    /// A read-write context on `store`.
    pub fn read_write(store: impl Into<String>) -> Self {
        Self::new(store, TransactionMode::ReadWrite)
    }

    /// Returns the store name.
    #[must_use]
    pub fn store(&self) -> &str {
        &self.store
    }

    /// Returns the access mode.
    #[must_use]
    pub fn mode(&self) -> TransactionMode {
        self.mode
    }
}
