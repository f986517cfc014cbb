//! In-memory engine implementation.
//!
//! `MemoryEngine` keeps every database in process memory. It implements the
//! full engine contract: versioned opens with an upgrade phase, per-store
//! reader/writer scheduling, rollback on abort and an optional per-store
//! record quota checked at commit.
//!
//! # Thread Safety
//!
//! The engine is `Send + Sync` and cheap to clone; clones share the same
//! databases.
//!
//! # Example
//!
//! ```rust
//! use neoidb_engine::{Engine, EngineDatabase, MemoryEngine, StoreParameters};
//!
//! # tokio_test_block_on(async {
//! let engine = MemoryEngine::new();
//! let db = engine
//!     .open(
//!         "app",
//!         1,
//!         Some(Box::new(|_change, schema| {
//!             schema.create_object_store("items", StoreParameters::new().auto_increment(true))
//!         })),
//!     )
//!     .await
//!     .unwrap();
//! assert_eq!(db.object_store_names(), vec!["items"]);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

mod schema;
mod store;
mod transaction;

pub use transaction::{MemoryCursor, MemoryIndex, MemoryObjectStore, MemoryTransaction};

use crate::config::MemoryEngineConfig;
use crate::engine::{Engine, EngineDatabase, UpgradeHandler};
use crate::error::{EngineError, EngineResult};
use crate::request::Request;
use crate::stats::{EngineStats, StatsSnapshot};
use crate::types::{TransactionMode, VersionChange};
use parking_lot::{Mutex, RwLock};
use schema::MemorySchemaEditor;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use store::StoreData;
use tokio::sync::OwnedRwLockWriteGuard;
use transaction::StoreGuard;

type StoreLock = Arc<tokio::sync::RwLock<StoreData>>;

/// State shared by every clone of a [`MemoryEngine`].
pub(crate) struct EngineShared {
    pub(crate) config: MemoryEngineConfig,
    pub(crate) stats: EngineStats,
    databases: Mutex<HashMap<String, Arc<DatabaseState>>>,
    next_txn_id: AtomicU64,
}

/// Current schema of one database.
struct Catalog {
    version: u32,
    stores: BTreeMap<String, StoreLock>,
}

/// One named database.
struct DatabaseState {
    name: String,
    catalog: RwLock<Catalog>,
    /// Serializes opens, and with them upgrades.
    open_lock: tokio::sync::Mutex<()>,
}

impl DatabaseState {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            catalog: RwLock::new(Catalog {
                version: 0,
                stores: BTreeMap::new(),
            }),
            open_lock: tokio::sync::Mutex::new(()),
        }
    }

    fn version(&self) -> u32 {
        self.catalog.read().version
    }

    fn store_locks(&self) -> Vec<(String, StoreLock)> {
        self.catalog
            .read()
            .stores
            .iter()
            .map(|(name, lock)| (name.clone(), Arc::clone(lock)))
            .collect()
    }

    /// Installs the outcome of a successful upgrade.
    ///
    /// Surviving stores keep their lock so connections opened earlier see
    /// the new contents.
    fn install(
        &self,
        guards: Vec<(String, OwnedRwLockWriteGuard<StoreData>)>,
        mut staged: BTreeMap<String, StoreData>,
        version: u32,
    ) {
        let mut catalog = self.catalog.write();
        for (name, mut guard) in guards {
            match staged.remove(&name) {
                Some(data) => *guard = data,
                None => {
                    catalog.stores.remove(&name);
                }
            }
        }
        for (name, data) in staged {
            catalog
                .stores
                .insert(name, Arc::new(tokio::sync::RwLock::new(data)));
        }
        catalog.version = version;
    }
}

impl EngineShared {
    fn database(&self, name: &str) -> Arc<DatabaseState> {
        let mut databases = self.databases.lock();
        Arc::clone(
            databases
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(DatabaseState::new(name))),
        )
    }

    async fn open(
        self: Arc<Self>,
        name: String,
        version: u32,
        upgrade: Option<UpgradeHandler>,
    ) -> EngineResult<MemoryDatabase> {
        if version == 0 {
            return Err(EngineError::data("database version must be at least 1"));
        }
        let state = self.database(&name);
        let _open = state.open_lock.lock().await;

        let current = state.version();
        if version < current {
            return Err(EngineError::version(format!(
                "requested version {version} is below the stored version {current}"
            )));
        }
        if version > current {
            self.upgrade(&state, current, version, upgrade).await?;
        }

        self.stats.record_open();
        tracing::debug!(database = %name, version, "database opened");
        Ok(MemoryDatabase {
            version,
            state: Arc::clone(&state),
            shared: self,
            closed: Arc::new(AtomicBool::new(false)),
        })
    }

    async fn upgrade(
        &self,
        state: &DatabaseState,
        old_version: u32,
        new_version: u32,
        upgrade: Option<UpgradeHandler>,
    ) -> EngineResult<()> {
        tracing::debug!(
            database = %state.name,
            old_version,
            new_version,
            "starting upgrade"
        );

        // Waits for every running transaction on the database to finish.
        let mut guards = Vec::new();
        for (name, lock) in state.store_locks() {
            guards.push((name, lock.write_owned().await));
        }

        let mut staged: BTreeMap<String, StoreData> = guards
            .iter()
            .map(|(name, guard)| (name.clone(), (**guard).clone()))
            .collect();
        let change = VersionChange {
            old_version,
            new_version,
        };
        if let Err(err) = run_upgrade(&mut staged, change, upgrade) {
            tracing::debug!(database = %state.name, error = %err, "upgrade aborted");
            return Err(EngineError::abort(format!(
                "upgrade to version {new_version} aborted: {err}"
            )));
        }

        state.install(guards, staged, new_version);
        self.stats.record_upgrade();
        Ok(())
    }
}

fn run_upgrade(
    staged: &mut BTreeMap<String, StoreData>,
    change: VersionChange,
    upgrade: Option<UpgradeHandler>,
) -> EngineResult<()> {
    match upgrade {
        Some(handler) => handler(change, &mut MemorySchemaEditor::new(staged)),
        None => Ok(()),
    }
}

/// An engine that keeps databases in process memory.
#[derive(Clone)]
pub struct MemoryEngine {
    inner: Arc<EngineShared>,
}

impl MemoryEngine {
    /// Creates an engine with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(MemoryEngineConfig::default())
    }

    /// Creates an engine with the given configuration.
    #[must_use]
    pub fn with_config(config: MemoryEngineConfig) -> Self {
        Self {
            inner: Arc::new(EngineShared {
                config,
                stats: EngineStats::new(),
                databases: Mutex::new(HashMap::new()),
                next_txn_id: AtomicU64::new(1),
            }),
        }
    }

    /// Returns the engine configuration.
    #[must_use]
    pub fn config(&self) -> &MemoryEngineConfig {
        &self.inner.config
    }

    /// Returns a snapshot of the engine's counters.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Returns the stored version of `name`, or `None` if it was never
    /// opened successfully.
    #[must_use]
    pub fn stored_version(&self, name: &str) -> Option<u32> {
        let databases = self.inner.databases.lock();
        databases
            .get(name)
            .map(|state| state.version())
            .filter(|version| *version > 0)
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl Engine for MemoryEngine {
    type Database = MemoryDatabase;

    fn open(
        &self,
        name: &str,
        version: u32,
        upgrade: Option<UpgradeHandler>,
    ) -> Request<MemoryDatabase> {
        let shared = Arc::clone(&self.inner);
        let name = name.to_string();
        Request::new(shared.open(name, version, upgrade))
    }
}

/// A connection to a database of a [`MemoryEngine`].
#[derive(Clone)]
pub struct MemoryDatabase {
    version: u32,
    state: Arc<DatabaseState>,
    shared: Arc<EngineShared>,
    closed: Arc<AtomicBool>,
}

impl MemoryDatabase {
    /// Returns whether [`EngineDatabase::close`] was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn scope(&self, stores: &[&str]) -> EngineResult<Vec<(String, StoreLock)>> {
        if self.is_closed() {
            return Err(EngineError::invalid_state("the connection is closed"));
        }
        if stores.is_empty() {
            return Err(EngineError::invalid_access(
                "a transaction needs at least one object store",
            ));
        }
        let catalog = self.state.catalog.read();
        let mut names: Vec<&str> = stores.to_vec();
        names.sort_unstable();
        names.dedup();
        names
            .into_iter()
            .map(|name| {
                catalog
                    .stores
                    .get(name)
                    .map(|lock| (name.to_string(), Arc::clone(lock)))
                    .ok_or_else(|| {
                        EngineError::not_found(format!("object store `{name}` does not exist"))
                    })
            })
            .collect()
    }

    fn scope_is_current(&self, scope: &[(String, StoreLock)]) -> bool {
        let catalog = self.state.catalog.read();
        scope.iter().all(|(name, lock)| {
            catalog
                .stores
                .get(name)
                .is_some_and(|current| Arc::ptr_eq(current, lock))
        })
    }
}

impl EngineDatabase for MemoryDatabase {
    type Transaction = MemoryTransaction;

    fn name(&self) -> &str {
        &self.state.name
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn object_store_names(&self) -> Vec<String> {
        self.state.catalog.read().stores.keys().cloned().collect()
    }

    fn transaction(&self, stores: &[&str], mode: TransactionMode) -> Request<MemoryTransaction> {
        let db = self.clone();
        let stores: Vec<String> = stores.iter().map(|name| name.to_string()).collect();
        Request::new(async move {
            let names: Vec<&str> = stores.iter().map(String::as_str).collect();
            let guards = loop {
                let scope = db.scope(&names)?;
                // Locks are taken in name order so overlapping scopes cannot deadlock.
                let mut guards = BTreeMap::new();
                for (name, lock) in &scope {
                    let guard = match mode {
                        TransactionMode::ReadOnly => {
                            StoreGuard::Shared(Arc::clone(lock).read_owned().await)
                        }
                        TransactionMode::ReadWrite => {
                            StoreGuard::exclusive(Arc::clone(lock).write_owned().await)
                        }
                    };
                    guards.insert(name.clone(), guard);
                }
                // An upgrade may have replaced or dropped a store while we waited.
                if db.scope_is_current(&scope) {
                    break guards;
                }
                tracing::trace!(database = %db.state.name, "scope changed while waiting, retrying");
            };
            let shared = Arc::clone(&db.shared);
            let id = shared.next_txn_id.fetch_add(1, Ordering::Relaxed);
            shared.stats.record_transaction_start();
            tracing::trace!(txn = id, %mode, stores = guards.len(), "transaction granted");
            Ok(MemoryTransaction::new(id, mode, guards, shared))
        })
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            tracing::debug!(database = %self.state.name, "connection closed");
        }
    }
}

impl fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDatabase")
            .field("name", &self.state.name)
            .field("version", &self.version)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineCursor, EngineIndex, EngineObjectStore, EngineTransaction};
    use crate::{EngineErrorKind, IndexParameters, Key, StoreParameters, TransactionSignal};
    use serde_json::json;

    fn items_schema() -> Option<UpgradeHandler> {
        Some(Box::new(|_, schema| {
            schema.create_object_store("items", StoreParameters::new().auto_increment(true))?;
            schema.create_object_store("notes", StoreParameters::new().key_path("id"))?;
            schema.create_index("notes", "by_tag", IndexParameters::new("tag"))
        }))
    }

    async fn open_items(engine: &MemoryEngine) -> MemoryDatabase {
        engine.open("test", 1, items_schema()).await.unwrap()
    }

    #[tokio::test]
    async fn open_runs_upgrade_once() {
        let engine = MemoryEngine::new();
        let db = open_items(&engine).await;
        assert_eq!(db.object_store_names(), vec!["items", "notes"]);
        assert_eq!(db.version(), 1);

        // Same version: the handler is not consulted.
        let again = engine
            .open(
                "test",
                1,
                Some(Box::new(|_, _| panic!("upgrade must not run"))),
            )
            .await
            .unwrap();
        assert_eq!(again.object_store_names(), vec!["items", "notes"]);

        let stats = engine.stats();
        assert_eq!(stats.databases_opened, 2);
        assert_eq!(stats.upgrades, 1);
        assert_eq!(engine.stored_version("test"), Some(1));
    }

    #[tokio::test]
    async fn lower_version_is_rejected() {
        let engine = MemoryEngine::new();
        engine.open("test", 3, None).await.unwrap();
        let err = engine.open("test", 2, None).await.unwrap_err();
        assert_eq!(err.kind(), EngineErrorKind::Version);
        let err = engine.open("test", 0, None).await.unwrap_err();
        assert_eq!(err.kind(), EngineErrorKind::Data);
    }

    #[tokio::test]
    async fn failed_upgrade_keeps_old_schema() {
        let engine = MemoryEngine::new();
        open_items(&engine).await;

        let err = engine
            .open(
                "test",
                2,
                Some(Box::new(|_, schema| {
                    schema.delete_object_store("items")?;
                    Err(EngineError::constraint("boom"))
                })),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), EngineErrorKind::Abort);
        assert!(err.message().contains("boom"));
        assert_eq!(engine.stored_version("test"), Some(1));

        let db = engine.open("test", 1, None).await.unwrap();
        assert_eq!(db.object_store_names(), vec!["items", "notes"]);
    }

    #[tokio::test]
    async fn committed_writes_are_visible() {
        let engine = MemoryEngine::new();
        let db = open_items(&engine).await;

        let txn = db
            .transaction(&["items"], TransactionMode::ReadWrite)
            .await
            .unwrap();
        let store = txn.object_store("items").unwrap();
        let key = store.add(json!({"n": 1}), None).await.unwrap();
        assert_eq!(key, Key::Integer(1));
        assert_eq!(txn.finish().await, TransactionSignal::Complete);

        let txn = db
            .transaction(&["items"], TransactionMode::ReadOnly)
            .await
            .unwrap();
        let store = txn.object_store("items").unwrap();
        assert_eq!(store.get(&key).await.unwrap(), Some(json!({"n": 1})));
        assert_eq!(txn.finish().await, TransactionSignal::Complete);
    }

    #[tokio::test]
    async fn failed_request_aborts_and_rolls_back() {
        let engine = MemoryEngine::new();
        let db = open_items(&engine).await;

        let txn = db
            .transaction(&["items"], TransactionMode::ReadWrite)
            .await
            .unwrap();
        let store = txn.object_store("items").unwrap();
        store.add(json!(1), Some(Key::Integer(7))).await.unwrap();
        let err = store.add(json!(2), Some(Key::Integer(7))).await.unwrap_err();
        assert_eq!(err.kind(), EngineErrorKind::Constraint);

        match txn.finish().await {
            TransactionSignal::Abort(reason) => {
                assert_eq!(reason.kind(), EngineErrorKind::Constraint);
            }
            other => panic!("unexpected signal {other:?}"),
        }

        let txn = db
            .transaction(&["items"], TransactionMode::ReadOnly)
            .await
            .unwrap();
        let store = txn.object_store("items").unwrap();
        assert_eq!(store.get(&Key::Integer(7)).await.unwrap(), None);
        drop(txn.finish());

        let stats = engine.stats();
        assert_eq!(stats.transactions_aborted, 1);
    }

    #[tokio::test]
    async fn read_only_transactions_reject_writes() {
        let engine = MemoryEngine::new();
        let db = open_items(&engine).await;

        let txn = db
            .transaction(&["items"], TransactionMode::ReadOnly)
            .await
            .unwrap();
        let store = txn.object_store("items").unwrap();
        let err = store.clear().await.unwrap_err();
        assert_eq!(err.kind(), EngineErrorKind::ReadOnly);
        assert!(matches!(txn.finish().await, TransactionSignal::Abort(_)));
    }

    #[tokio::test]
    async fn transaction_scope_errors() {
        let engine = MemoryEngine::new();
        let db = open_items(&engine).await;

        let err = db
            .transaction(&[], TransactionMode::ReadOnly)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), EngineErrorKind::InvalidAccess);

        let err = db
            .transaction(&["missing"], TransactionMode::ReadOnly)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), EngineErrorKind::NotFound);

        db.close();
        let err = db
            .transaction(&["items"], TransactionMode::ReadOnly)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), EngineErrorKind::InvalidState);
        assert_eq!(engine.stats().transactions_started, 0);
    }

    #[tokio::test]
    async fn scope_is_resolved_when_polled() {
        let engine = MemoryEngine::new();
        let db = open_items(&engine).await;
        let pending = db.transaction(&["items"], TransactionMode::ReadWrite);

        engine
            .open(
                "test",
                2,
                Some(Box::new(|_, schema| schema.delete_object_store("items"))),
            )
            .await
            .unwrap();

        let err = pending.await.unwrap_err();
        assert_eq!(err.kind(), EngineErrorKind::NotFound);
        assert_eq!(engine.stats().transactions_started, 0);
    }

    #[tokio::test]
    async fn recreated_store_is_not_the_old_one() {
        let engine = MemoryEngine::new();
        let db = open_items(&engine).await;
        let txn = db
            .transaction(&["items"], TransactionMode::ReadWrite)
            .await
            .unwrap();
        txn.object_store("items")
            .unwrap()
            .add(json!("old"), None)
            .await
            .unwrap();
        assert_eq!(txn.finish().await, TransactionSignal::Complete);

        let pending = db.transaction(&["items"], TransactionMode::ReadOnly);
        engine
            .open(
                "test",
                2,
                Some(Box::new(|_, schema| {
                    schema.delete_object_store("items")?;
                    schema.create_object_store("items", StoreParameters::new())
                })),
            )
            .await
            .unwrap();

        let txn = pending.await.unwrap();
        let store = txn.object_store("items").unwrap();
        assert_eq!(store.get(&Key::Integer(1)).await.unwrap(), None);
        assert_eq!(txn.finish().await, TransactionSignal::Complete);
    }

    #[tokio::test]
    async fn quota_fails_commit() {
        let engine = MemoryEngine::with_config(MemoryEngineConfig::new().max_records_per_store(1));
        let db = open_items(&engine).await;

        let txn = db
            .transaction(&["items"], TransactionMode::ReadWrite)
            .await
            .unwrap();
        let store = txn.object_store("items").unwrap();
        store.add(json!(1), None).await.unwrap();
        store.add(json!(2), None).await.unwrap();
        match txn.finish().await {
            TransactionSignal::Error(err) => assert_eq!(err.kind(), EngineErrorKind::QuotaExceeded),
            other => panic!("unexpected signal {other:?}"),
        }
        assert_eq!(engine.stats().transactions_errored, 1);
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let engine = MemoryEngine::new();
        let db = open_items(&engine).await;

        {
            let txn = db
                .transaction(&["items"], TransactionMode::ReadWrite)
                .await
                .unwrap();
            let store = txn.object_store("items").unwrap();
            store.add(json!(1), None).await.unwrap();
        }

        let txn = db
            .transaction(&["items"], TransactionMode::ReadOnly)
            .await
            .unwrap();
        let store = txn.object_store("items").unwrap();
        let mut cursor = store.open_cursor(None, Default::default()).await.unwrap();
        assert_eq!(cursor.advance().await.unwrap(), None);
        assert_eq!(txn.finish().await, TransactionSignal::Complete);
    }

    #[tokio::test]
    async fn writers_are_serialized_in_request_order() {
        let engine = MemoryEngine::new();
        let db = open_items(&engine).await;

        let first = db
            .transaction(&["items"], TransactionMode::ReadWrite)
            .await
            .unwrap();
        let pending = db.transaction(&["items"], TransactionMode::ReadWrite);
        let waiter = tokio::spawn(async move {
            let txn = pending.await.unwrap();
            let store = txn.object_store("items").unwrap();
            let key = store.add(json!("second"), None).await.unwrap();
            drop(store);
            assert_eq!(txn.finish().await, TransactionSignal::Complete);
            key
        });

        let store = first.object_store("items").unwrap();
        let key = store.add(json!("first"), None).await.unwrap();
        drop(store);
        assert_eq!(first.finish().await, TransactionSignal::Complete);

        assert_eq!(key, Key::Integer(1));
        assert_eq!(waiter.await.unwrap(), Key::Integer(2));
    }

    #[tokio::test]
    async fn index_reads_and_cursors() {
        let engine = MemoryEngine::new();
        let db = open_items(&engine).await;

        let txn = db
            .transaction(&["notes"], TransactionMode::ReadWrite)
            .await
            .unwrap();
        let store = txn.object_store("notes").unwrap();
        for (id, tag) in [(3, "b"), (1, "a"), (2, "b")] {
            store.put(json!({"id": id, "tag": tag}), None).await.unwrap();
        }
        let index = store.index("by_tag").unwrap();
        assert_eq!(
            index.get(&Key::from("b")).await.unwrap(),
            Some(json!({"id": 2, "tag": "b"}))
        );

        let mut cursor = index
            .open_cursor(None, crate::CursorDirection::Prev)
            .await
            .unwrap();
        let mut seen = Vec::new();
        while let Some(record) = cursor.advance().await.unwrap() {
            seen.push(record.primary_key);
        }
        assert_eq!(seen, vec![Key::Integer(3), Key::Integer(2), Key::Integer(1)]);

        assert!(store.index("missing").is_err());
        assert!(matches!(txn.finish().await, TransactionSignal::Abort(_)));
    }
}
