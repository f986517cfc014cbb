//! Test fixtures and database helpers.
//!
//! Provides a database on the memory engine with a fixed schema, so tests
//! can start issuing operations right away.

use neoidb_core::{Config, Database};
use neoidb_engine::{
    EngineResult, IndexParameters, Key, MemoryEngine, MemoryEngineConfig, SchemaEditor,
    StoreParameters, VersionChange,
};
use serde_json::{json, Value};

/// Out-of-line keys with a key generator.
pub const ITEMS: &str = "items";
/// In-line keys at `id` with a key generator; indexed by title and priority.
pub const NOTES: &str = "notes";
/// In-line keys at `email`, no generator; unique index on `handle`.
pub const USERS: &str = "users";

/// Non-unique index on `notes.title`.
pub const BY_TITLE: &str = "by_title";
/// Non-unique index on `notes.priority`.
pub const BY_PRIORITY: &str = "by_priority";
/// Multi-entry index on `notes.tags`.
pub const BY_TAG: &str = "by_tag";
/// Unique index on `users.handle`.
pub const BY_HANDLE: &str = "by_handle";

/// Creates the fixture schema.
///
/// # Errors
///
/// Returns the engine's error if a store or index already exists.
pub fn fixture_schema(_change: VersionChange, schema: &mut dyn SchemaEditor) -> EngineResult<()> {
    schema.create_object_store(ITEMS, StoreParameters::new().auto_increment(true))?;

    schema.create_object_store(
        NOTES,
        StoreParameters::new().key_path("id").auto_increment(true),
    )?;
    schema.create_index(NOTES, BY_TITLE, IndexParameters::new("title"))?;
    schema.create_index(NOTES, BY_PRIORITY, IndexParameters::new("priority"))?;
    schema.create_index(NOTES, BY_TAG, IndexParameters::new("tags").multi_entry(true))?;

    schema.create_object_store(USERS, StoreParameters::new().key_path("email"))?;
    schema.create_index(USERS, BY_HANDLE, IndexParameters::new("handle").unique(true))
}

/// Builds a note record.
pub fn note(title: &str, priority: i64) -> Value {
    json!({ "title": title, "priority": priority })
}

/// A test database on a fresh memory engine.
pub struct TestDatabase {
    /// The database instance.
    pub db: Database<MemoryEngine>,
}

impl TestDatabase {
    /// Creates a database that has not been opened.
    pub fn unopened() -> Self {
        Self::unopened_with(MemoryEngineConfig::default())
    }

    /// Creates an unopened database over an engine with `config`.
    pub fn unopened_with(config: MemoryEngineConfig) -> Self {
        Self {
            db: Database::new(MemoryEngine::with_config(config), Config::new("testkit")),
        }
    }

    /// Creates a database and opens it with the fixture schema.
    pub async fn open() -> Self {
        Self::open_with(MemoryEngineConfig::default()).await
    }

    /// Creates a database over an engine with `config` and opens it with
    /// the fixture schema.
    pub async fn open_with(config: MemoryEngineConfig) -> Self {
        let test = Self::unopened_with(config);
        test.db
            .open_with(1, fixture_schema)
            .await
            .expect("Failed to open test database");
        test
    }

    /// Returns the engine.
    pub fn engine(&self) -> &MemoryEngine {
        self.db.engine()
    }

    /// Adds every value to `store` and returns the keys in order.
    pub async fn seed(&self, store: &str, values: impl IntoIterator<Item = Value>) -> Vec<Key> {
        let mut keys = Vec::new();
        for value in values {
            let added = self
                .db
                .add(store, value, None)
                .await
                .expect("Failed to seed record");
            keys.push(added.key);
        }
        keys
    }
}

impl std::ops::Deref for TestDatabase {
    type Target = Database<MemoryEngine>;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}
