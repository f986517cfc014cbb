//! Engine trait definitions.

use crate::error::EngineResult;
use crate::key::{Key, KeyRange};
use crate::request::{Completion, Request};
use crate::types::{
    CursorDirection, CursorRecord, IndexParameters, StoreParameters, TransactionMode,
    VersionChange,
};
use serde_json::Value;

/// Caller-supplied logic run during the upgrade phase of an open.
///
/// It is the only place where object stores and indexes may be created or
/// removed. Returning an error aborts the upgrade and fails the open.
pub type UpgradeHandler =
    Box<dyn FnOnce(VersionChange, &mut dyn SchemaEditor) -> EngineResult<()> + Send>;

/// A transactional, versioned key/value storage engine.
///
/// Engines are **capability-style collaborators**: they own persistence,
/// scheduling and the transaction lifecycle, and report every outcome
/// through [`Request`] and [`Completion`] signals. Adapters never look at
/// how records are stored.
///
/// # Invariants
///
/// - an open at a version above the stored version runs the upgrade
///   handler exactly once before the open succeeds
/// - read-write transactions on the same store are granted in the order
///   they were requested
/// - every transaction delivers exactly one [`crate::TransactionSignal`]
/// - a request that fails marks its transaction for abort
///
/// # Implementors
///
/// - [`crate::MemoryEngine`] - In-process engine for tests and native hosts
pub trait Engine: Send + Sync {
    /// Handle to an opened database.
    type Database: EngineDatabase;

    /// Opens the database `name` at `version`, upgrading it first when
    /// `version` is above the stored version.
    fn open(
        &self,
        name: &str,
        version: u32,
        upgrade: Option<UpgradeHandler>,
    ) -> Request<Self::Database>;
}

/// An opened database connection.
pub trait EngineDatabase: Clone + Send + Sync + 'static {
    /// Transaction type of this engine.
    type Transaction: EngineTransaction;

    /// Returns the database name.
    fn name(&self) -> &str;

    /// Returns the version the connection was opened at.
    fn version(&self) -> u32;

    /// Returns the names of the database's object stores, sorted.
    fn object_store_names(&self) -> Vec<String>;

    /// Requests a transaction over `stores` in `mode`.
    ///
    /// The request resolves once the engine grants the transaction.
    fn transaction(&self, stores: &[&str], mode: TransactionMode) -> Request<Self::Transaction>;

    /// Closes the connection. Later transaction requests fail.
    fn close(&self);
}

/// A granted transaction.
pub trait EngineTransaction: Send + 'static {
    /// Object store type of this engine.
    type ObjectStore: EngineObjectStore;

    /// Returns the transaction mode.
    fn mode(&self) -> TransactionMode;

    /// Returns a handle to one of the transaction's stores.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the store is outside the transaction's
    /// scope.
    fn object_store(&self, name: &str) -> EngineResult<Self::ObjectStore>;

    /// Marks the transaction for rollback.
    fn abort(&self);

    /// Declares that no further requests will be issued and waits for the
    /// terminal signal.
    fn finish(self) -> Completion;
}

/// An object store within a transaction.
pub trait EngineObjectStore: Send + Sync {
    /// Cursor type of this engine.
    type Cursor: EngineCursor;
    /// Index type of this engine.
    type Index: EngineIndex<Cursor = Self::Cursor>;

    /// Returns the store name.
    fn name(&self) -> &str;

    /// Reads the record stored under `key`.
    fn get(&self, key: &Key) -> Request<Option<Value>>;

    /// Inserts a record; fails with a constraint error if the key exists.
    ///
    /// Resolves with the record's key, which the engine may have generated.
    fn add(&self, value: Value, key: Option<Key>) -> Request<Key>;

    /// Inserts or replaces a record.
    fn put(&self, value: Value, key: Option<Key>) -> Request<Key>;

    /// Removes the record stored under `key`, if any.
    fn delete(&self, key: &Key) -> Request<()>;

    /// Removes every record.
    fn clear(&self) -> Request<()>;

    /// Opens a cursor over the records whose key lies in `range`.
    fn open_cursor(
        &self,
        range: Option<&KeyRange>,
        direction: CursorDirection,
    ) -> Request<Self::Cursor>;

    /// Returns a handle to one of the store's indexes.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the index does not exist.
    fn index(&self, name: &str) -> EngineResult<Self::Index>;
}

/// An index within a transaction.
pub trait EngineIndex: Send + Sync {
    /// Cursor type of this engine.
    type Cursor: EngineCursor;

    /// Returns the index name.
    fn name(&self) -> &str;

    /// Reads the first record (lowest primary key) whose index key is `key`.
    fn get(&self, key: &Key) -> Request<Option<Value>>;

    /// Opens a cursor ordered by index key, then primary key.
    fn open_cursor(
        &self,
        range: Option<&KeyRange>,
        direction: CursorDirection,
    ) -> Request<Self::Cursor>;
}

/// A cursor over records.
pub trait EngineCursor: Send {
    /// Moves to the next record; resolves with `None` when exhausted.
    fn advance(&mut self) -> Request<Option<CursorRecord>>;
}

/// Schema operations available during the upgrade phase.
pub trait SchemaEditor {
    /// Returns the names of the object stores, sorted.
    fn object_store_names(&self) -> Vec<String>;

    /// Creates an object store.
    ///
    /// # Errors
    ///
    /// Returns a constraint error if the store already exists.
    fn create_object_store(&mut self, name: &str, params: StoreParameters) -> EngineResult<()>;

    /// Deletes an object store and its records.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the store does not exist.
    fn delete_object_store(&mut self, name: &str) -> EngineResult<()>;

    /// Returns the names of a store's indexes, sorted.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the store does not exist.
    fn index_names(&self, store: &str) -> EngineResult<Vec<String>>;

    /// Creates an index on a store.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for an unknown store, or a constraint
    /// error if the index exists or existing records violate uniqueness.
    fn create_index(&mut self, store: &str, name: &str, params: IndexParameters)
        -> EngineResult<()>;

    /// Deletes an index.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the store or index does not exist.
    fn delete_index(&mut self, store: &str, name: &str) -> EngineResult<()>;
}
