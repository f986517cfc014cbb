//! Database facade.
//!
//! [`Database`] is the public entry point. Every operation follows the
//! same protocol:
//!
//! 1. validate the store through the [`ConnectionManager`], returning early
//!    on a precondition failure so no transaction is requested;
//! 2. acquire a transaction through the adapter;
//! 3. issue one request (or walk one cursor);
//! 4. settle once on the transaction's terminal signal.
//!
//! Writes therefore resolve only after the engine reports the commit.

use crate::config::Config;
use crate::connection::ConnectionManager;
use crate::error::DbResult;
use crate::transaction::{acquire, TransactionContext, TransactionHandle};
use crate::typed::TypedStore;
use neoidb_engine::{
    CursorDirection, CursorRecord, Engine, EngineCursor, EngineDatabase, EngineIndex,
    EngineObjectStore, EngineResult, Key, KeyRange, SchemaEditor, UpgradeHandler, VersionChange,
};
use serde_json::Value;
use std::ops::ControlFlow;

/// Iteration order of an index walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Order {
    /// Lowest index key first.
    #[default]
    Ascending,
    /// Highest index key first.
    Descending,
}

impl Order {
    /// The cursor direction for this order.
    #[must_use]
    pub const fn direction(self) -> CursorDirection {
        match self {
            Self::Ascending => CursorDirection::Next,
            Self::Descending => CursorDirection::Prev,
        }
    }
}

/// Selects an index, and its order, for a range query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDetails {
    /// Name of the index to walk.
    pub index_name: String,
    /// Walk order.
    pub order: Order,
}

impl IndexDetails {
    /// Walks `index_name` in ascending order.
    pub fn new(index_name: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            order: Order::Ascending,
        }
    }

    /// Sets the walk order.
    #[must_use]
    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }
}

/// Result of a successful [`Database::add`].
#[derive(Debug, Clone, PartialEq)]
pub struct Added {
    /// The key the engine stored the record under.
    pub key: Key,
    /// The value that was added.
    pub value: Value,
}

/// An adapted database.
///
/// # Example
///
/// ```rust
/// use neoidb_core::{Config, Database};
/// use neoidb_engine::{MemoryEngine, StoreParameters};
/// use serde_json::json;
///
/// # tokio_test_block_on(async {
/// let db = Database::new(MemoryEngine::new(), Config::new("example"));
/// db.open_with(1, |_, schema| {
///     schema.create_object_store("items", StoreParameters::new().auto_increment(true))
/// })
/// .await
/// .unwrap();
///
/// let added = db.add("items", json!({"title": "hello"}), None).await.unwrap();
/// let found = db.get_by_key("items", &added.key).await.unwrap();
/// assert_eq!(found, Some(json!({"title": "hello"})));
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
/// # }
/// ```
pub struct Database<E: Engine> {
    config: Config,
    connection: ConnectionManager<E>,
}

impl<E: Engine> Database<E> {
    /// Creates an unopened database over `engine`.
    pub fn new(engine: E, config: Config) -> Self {
        let connection = ConnectionManager::new(engine, &config);
        Self { config, connection }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the connection manager.
    #[must_use]
    pub fn connection(&self) -> &ConnectionManager<E> {
        &self.connection
    }

    /// Returns the engine.
    pub fn engine(&self) -> &E {
        self.connection.engine()
    }

    /// Returns the database name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.connection.name()
    }

    /// Returns the current version.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.connection.version()
    }

    /// Returns whether the database is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.connection.is_open()
    }

    /// Returns the store names of the open database.
    #[must_use]
    pub fn store_names(&self) -> Vec<String> {
        self.connection.store_names()
    }

    /// Returns whether the open database has a store named `name`.
    #[must_use]
    pub fn has_store(&self, name: &str) -> bool {
        self.connection.has_store(name)
    }

    /// Opens the database at `version`, running `upgrade` if the stored
    /// version is lower.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the open or the upgrade fails.
    pub async fn open(&self, version: u32, upgrade: Option<UpgradeHandler>) -> DbResult<()> {
        self.connection.open(version, upgrade).await
    }

    /// Opens the database at `version` with an upgrade closure.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the open or the upgrade fails.
    pub async fn open_with<F>(&self, version: u32, upgrade: F) -> DbResult<()>
    where
        F: FnOnce(VersionChange, &mut dyn SchemaEditor) -> EngineResult<()> + Send + 'static,
    {
        self.open(version, Some(Box::new(upgrade))).await
    }

    /// Opens the database at the configured version.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the open or the upgrade fails.
    pub async fn open_default(&self, upgrade: Option<UpgradeHandler>) -> DbResult<()> {
        self.open(self.config.version, upgrade).await
    }

    /// Closes the database.
    pub fn close(&self) {
        self.connection.close();
    }

    /// Returns a typed view of `store`.
    #[must_use]
    pub fn typed<T>(&self, store: impl Into<String>) -> TypedStore<'_, E, T> {
        TypedStore::new(self, store.into())
    }

    async fn begin(
        &self,
        context: TransactionContext,
    ) -> DbResult<TransactionHandle<<E::Database as EngineDatabase>::Transaction>> {
        let handle = self.connection.ensure_ready(context.store())?;
        acquire(&handle, context).await
    }

    /// Reads the record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns a precondition error for an unknown store, or the engine's
    /// error if the read or the transaction fails.
    pub async fn get_by_key(&self, store: &str, key: &Key) -> DbResult<Option<Value>> {
        let tx = self.begin(TransactionContext::read_only(store)).await?;
        let outcome = tx.store().get(key).await;
        tx.settle(outcome).await
    }

    /// Reads the first record whose `index` key equals `key`.
    ///
    /// # Errors
    ///
    /// Returns a precondition error for an unknown store, or the engine's
    /// error for an unknown index or a failed transaction.
    pub async fn get_by_index(
        &self,
        store: &str,
        index: &str,
        key: &Key,
    ) -> DbResult<Option<Value>> {
        let tx = self.begin(TransactionContext::read_only(store)).await?;
        let outcome = match tx.store().index(index) {
            Ok(index) => index.get(key).await,
            Err(err) => Err(err),
        };
        tx.settle(outcome).await
    }

    /// Collects the records in `range`, in cursor order.
    ///
    /// Without `index` the walk follows ascending primary key order;
    /// otherwise it follows the index in the requested order.
    ///
    /// # Errors
    ///
    /// Returns a precondition error for an unknown store, or the engine's
    /// error if the walk or the transaction fails.
    pub async fn get_all(
        &self,
        store: &str,
        range: Option<&KeyRange>,
        index: Option<&IndexDetails>,
    ) -> DbResult<Vec<Value>> {
        let tx = self.begin(TransactionContext::read_only(store)).await?;
        let mut records = Vec::new();
        let outcome = walk(tx.store(), range, index, |record| {
            records.push(record.value);
            ControlFlow::Continue(())
        })
        .await;
        tx.settle(outcome.map(|()| records)).await
    }

    /// Inserts a record; fails if its key already exists.
    ///
    /// `key` is only an input; the resolved key is the one the engine
    /// stored the record under.
    ///
    /// # Errors
    ///
    /// Returns a precondition error for an unknown store. A duplicate key
    /// aborts the transaction and surfaces as [`crate::DbError::Aborted`].
    pub async fn add(&self, store: &str, value: Value, key: Option<Key>) -> DbResult<Added> {
        let tx = self.begin(TransactionContext::read_write(store)).await?;
        let outcome = tx.store().add(value.clone(), key).await;
        let key = tx.settle(outcome).await?;
        Ok(Added { key, value })
    }

    /// Inserts or replaces a record and returns the written value.
    ///
    /// # Errors
    ///
    /// Returns a precondition error for an unknown store, or the engine's
    /// error if the write or the transaction fails.
    pub async fn update(&self, store: &str, value: Value, key: Option<Key>) -> DbResult<Value> {
        let tx = self.begin(TransactionContext::read_write(store)).await?;
        let outcome = tx.store().put(value.clone(), key).await;
        tx.settle(outcome.map(|_| value)).await
    }

    /// Removes the record stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns a precondition error for an unknown store, or the engine's
    /// error if the transaction fails.
    pub async fn delete(&self, store: &str, key: &Key) -> DbResult<()> {
        let tx = self.begin(TransactionContext::read_write(store)).await?;
        let outcome = tx.store().delete(key).await;
        tx.settle(outcome).await
    }

    /// Removes every record of `store`.
    ///
    /// Resolves only after the engine reports the commit.
    ///
    /// # Errors
    ///
    /// Returns a precondition error for an unknown store, or the engine's
    /// error if the transaction fails.
    pub async fn clear(&self, store: &str) -> DbResult<()> {
        let tx = self.begin(TransactionContext::read_write(store)).await?;
        let outcome = tx.store().clear().await;
        tx.settle(outcome).await
    }

    /// Walks `store` in ascending key order, calling `visit` once per
    /// record in `range`. Returning [`ControlFlow::Break`] stops the walk.
    ///
    /// # Errors
    ///
    /// Returns a precondition error for an unknown store, or the engine's
    /// error if the walk or the transaction fails.
    pub async fn open_cursor<F>(
        &self,
        store: &str,
        visit: F,
        range: Option<&KeyRange>,
    ) -> DbResult<()>
    where
        F: FnMut(CursorRecord) -> ControlFlow<()>,
    {
        let tx = self.begin(TransactionContext::read_only(store)).await?;
        let outcome = walk(tx.store(), range, None, visit).await;
        tx.settle(outcome).await
    }
}

impl<E: Engine> std::fmt::Debug for Database<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .field("connection", &self.connection)
            .finish()
    }
}

/// Walks a store, or one of its indexes, until the cursor is exhausted or
/// `visit` breaks.
async fn walk<S, F>(
    store: &S,
    range: Option<&KeyRange>,
    index: Option<&IndexDetails>,
    mut visit: F,
) -> EngineResult<()>
where
    S: EngineObjectStore,
    F: FnMut(CursorRecord) -> ControlFlow<()>,
{
    let mut cursor = match index {
        Some(details) => {
            store
                .index(&details.index_name)?
                .open_cursor(range, details.order.direction())
                .await?
        }
        None => store.open_cursor(range, CursorDirection::Next).await?,
    };
    while let Some(record) = cursor.advance().await? {
        if visit(record).is_break() {
            break;
        }
    }
    Ok(())
}
