//! Transactions, store handles and cursors of the memory engine.
//!
//! A transaction holds one lock per store in its scope: a shared lock for
//! read-only transactions and an exclusive lock for read-write ones. The
//! locks are fair, so read-write transactions on the same store are
//! granted in request order. Exclusive stores keep a snapshot taken at
//! grant time; rolling back restores it.

use super::store::StoreData;
use super::EngineShared;
use crate::engine::{EngineCursor, EngineIndex, EngineObjectStore, EngineTransaction};
use crate::error::{EngineError, EngineResult};
use crate::key::{Key, KeyRange};
use crate::request::{Completion, Request, TransactionSignal};
use crate::types::{CursorDirection, CursorRecord, TransactionMode};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard};

/// Lock held on one store for the lifetime of a transaction.
pub(crate) enum StoreGuard {
    Shared(OwnedRwLockReadGuard<StoreData>),
    Exclusive {
        guard: OwnedRwLockWriteGuard<StoreData>,
        snapshot: StoreData,
    },
}

impl StoreGuard {
    pub(crate) fn exclusive(guard: OwnedRwLockWriteGuard<StoreData>) -> Self {
        let snapshot = (*guard).clone();
        Self::Exclusive { guard, snapshot }
    }

    fn data(&self) -> &StoreData {
        match self {
            Self::Shared(guard) => &**guard,
            Self::Exclusive { guard, .. } => &**guard,
        }
    }

    fn data_mut(&mut self) -> EngineResult<&mut StoreData> {
        match self {
            Self::Shared(_) => Err(EngineError::read_only("the transaction is read-only")),
            Self::Exclusive { guard, .. } => Ok(&mut **guard),
        }
    }

    fn rollback(&mut self) {
        if let Self::Exclusive { guard, snapshot } = self {
            std::mem::swap(&mut **guard, snapshot);
        }
    }

    fn exceeds(&self, limit: usize) -> bool {
        matches!(self, Self::Exclusive { guard, .. } if guard.records.len() > limit)
    }
}

/// Mutable state shared by a transaction and its store handles.
pub(crate) struct TxnInner {
    id: u64,
    mode: TransactionMode,
    stores: BTreeMap<String, StoreGuard>,
    finished: bool,
    failure: Option<EngineError>,
}

impl TxnInner {
    /// Runs one request against a store, marking the transaction for
    /// abort if it fails.
    fn request<T>(
        &mut self,
        store: &str,
        f: impl FnOnce(&mut StoreGuard) -> EngineResult<T>,
    ) -> EngineResult<T> {
        if self.finished {
            return Err(EngineError::transaction_inactive(format!(
                "transaction {} has finished",
                self.id
            )));
        }
        let result = match self.stores.get_mut(store) {
            Some(guard) => f(guard),
            None => Err(EngineError::not_found(format!(
                "object store `{store}` is not in the transaction's scope"
            ))),
        };
        if let Err(err) = &result {
            tracing::trace!(txn = self.id, store, error = %err, "request failed");
            self.failure.get_or_insert_with(|| err.clone());
        }
        result
    }

    fn rollback(&mut self) {
        for guard in self.stores.values_mut() {
            guard.rollback();
        }
    }
}

type SharedTxn = Arc<Mutex<TxnInner>>;

/// A transaction granted by [`crate::MemoryEngine`].
///
/// Dropping an unfinished transaction rolls it back.
pub struct MemoryTransaction {
    inner: SharedTxn,
    shared: Arc<EngineShared>,
}

impl MemoryTransaction {
    pub(crate) fn new(
        id: u64,
        mode: TransactionMode,
        stores: BTreeMap<String, StoreGuard>,
        shared: Arc<EngineShared>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TxnInner {
                id,
                mode,
                stores,
                finished: false,
                failure: None,
            })),
            shared,
        }
    }

    /// Returns the transaction's identifier.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.lock().id
    }

    fn settle(&self) -> TransactionSignal {
        let mut inner = self.inner.lock();
        inner.finished = true;

        let signal = if let Some(err) = inner.failure.take() {
            inner.rollback();
            self.shared.stats.record_transaction_abort();
            TransactionSignal::Abort(err)
        } else if let Some(store) = self.over_quota(&inner) {
            inner.rollback();
            self.shared.stats.record_transaction_error();
            TransactionSignal::Error(EngineError::quota_exceeded(format!(
                "object store `{store}` would exceed its record quota"
            )))
        } else {
            self.shared.stats.record_transaction_commit();
            TransactionSignal::Complete
        };
        tracing::trace!(txn = inner.id, ?signal, "transaction finished");

        // Releasing the guards lets waiting transactions proceed.
        inner.stores.clear();
        signal
    }

    fn over_quota(&self, inner: &TxnInner) -> Option<String> {
        let limit = self.shared.config.max_records_per_store?;
        inner
            .stores
            .iter()
            .find(|(_, guard)| guard.exceeds(limit))
            .map(|(name, _)| name.clone())
    }
}

impl EngineTransaction for MemoryTransaction {
    type ObjectStore = MemoryObjectStore;

    fn mode(&self) -> TransactionMode {
        self.inner.lock().mode
    }

    fn object_store(&self, name: &str) -> EngineResult<MemoryObjectStore> {
        self.inner.lock().request(name, |_| Ok(()))?;
        Ok(MemoryObjectStore {
            txn: Arc::clone(&self.inner),
            name: name.to_string(),
        })
    }

    fn abort(&self) {
        let mut inner = self.inner.lock();
        if !inner.finished {
            tracing::trace!(txn = inner.id, "abort requested");
            inner
                .failure
                .get_or_insert_with(|| EngineError::abort("the transaction was aborted"));
        }
    }

    fn finish(self) -> Completion {
        Completion::ready(self.settle())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        if !inner.finished {
            inner.finished = true;
            inner.rollback();
            inner.stores.clear();
            self.shared.stats.record_transaction_abort();
            tracing::trace!(txn = inner.id, "unfinished transaction rolled back");
        }
    }
}

impl fmt::Debug for MemoryTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("MemoryTransaction")
            .field("id", &inner.id)
            .field("mode", &inner.mode)
            .field("finished", &inner.finished)
            .finish_non_exhaustive()
    }
}

/// An object store within a [`MemoryTransaction`].
pub struct MemoryObjectStore {
    txn: SharedTxn,
    name: String,
}

impl MemoryObjectStore {
    fn request<T: Send + 'static>(
        &self,
        f: impl FnOnce(&mut StoreGuard) -> EngineResult<T>,
    ) -> Request<T> {
        Request::ready(self.txn.lock().request(&self.name, f))
    }
}

impl EngineObjectStore for MemoryObjectStore {
    type Cursor = MemoryCursor;
    type Index = MemoryIndex;

    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &Key) -> Request<Option<Value>> {
        self.request(|guard| Ok(guard.data().records.get(key).cloned()))
    }

    fn add(&self, value: Value, key: Option<Key>) -> Request<Key> {
        self.request(|guard| guard.data_mut()?.insert(value, key, false))
    }

    fn put(&self, value: Value, key: Option<Key>) -> Request<Key> {
        self.request(|guard| guard.data_mut()?.insert(value, key, true))
    }

    fn delete(&self, key: &Key) -> Request<()> {
        self.request(|guard| {
            guard.data_mut()?.records.remove(key);
            Ok(())
        })
    }

    fn clear(&self) -> Request<()> {
        self.request(|guard| {
            guard.data_mut()?.records.clear();
            Ok(())
        })
    }

    fn open_cursor(
        &self,
        range: Option<&KeyRange>,
        direction: CursorDirection,
    ) -> Request<MemoryCursor> {
        self.request(|guard| Ok(MemoryCursor::new(guard.data().entries(range, direction))))
    }

    fn index(&self, name: &str) -> EngineResult<MemoryIndex> {
        self.txn.lock().request(&self.name, |guard| {
            if guard.data().indexes.contains_key(name) {
                Ok(())
            } else {
                Err(EngineError::not_found(format!(
                    "index `{name}` does not exist on `{}`",
                    self.name
                )))
            }
        })?;
        Ok(MemoryIndex {
            txn: Arc::clone(&self.txn),
            store: self.name.clone(),
            name: name.to_string(),
        })
    }
}

impl fmt::Debug for MemoryObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryObjectStore")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// An index within a [`MemoryTransaction`].
pub struct MemoryIndex {
    txn: SharedTxn,
    store: String,
    name: String,
}

impl EngineIndex for MemoryIndex {
    type Cursor = MemoryCursor;

    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &Key) -> Request<Option<Value>> {
        let range = KeyRange::only(key.clone());
        let result = self.txn.lock().request(&self.store, |guard| {
            let entries = guard
                .data()
                .index_entries(&self.name, Some(&range), CursorDirection::Next)?;
            Ok(entries.into_iter().next().map(|record| record.value))
        });
        Request::ready(result)
    }

    fn open_cursor(
        &self,
        range: Option<&KeyRange>,
        direction: CursorDirection,
    ) -> Request<MemoryCursor> {
        let result = self.txn.lock().request(&self.store, |guard| {
            let entries = guard.data().index_entries(&self.name, range, direction)?;
            Ok(MemoryCursor::new(entries))
        });
        Request::ready(result)
    }
}

impl fmt::Debug for MemoryIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryIndex")
            .field("store", &self.store)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// A cursor over the records visible when it was opened.
#[derive(Debug)]
pub struct MemoryCursor {
    records: std::vec::IntoIter<CursorRecord>,
}

impl MemoryCursor {
    fn new(records: Vec<CursorRecord>) -> Self {
        Self {
            records: records.into_iter(),
        }
    }
}

impl EngineCursor for MemoryCursor {
    fn advance(&mut self) -> Request<Option<CursorRecord>> {
        Request::ready(Ok(self.records.next()))
    }
}
