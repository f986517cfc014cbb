//! Cross-crate integration test helpers.
//!
//! Provides a harness that mirrors every write into an in-process model,
//! so tests can check the engine against it after any sequence of
//! operations.

use crate::fixtures::TestDatabase;
use neoidb_core::DbResult;
use neoidb_engine::Key;
use serde_json::Value;
use std::collections::BTreeMap;

/// A test harness for integration testing.
pub struct IntegrationHarness {
    /// The database under test.
    pub db: TestDatabase,
    /// Store the harness operates on.
    store: String,
    /// Expected contents, keyed by primary key.
    model: BTreeMap<Key, Value>,
}

impl IntegrationHarness {
    /// Creates a harness over a freshly opened fixture database.
    pub async fn new(store: &str) -> Self {
        Self {
            db: TestDatabase::open().await,
            store: store.to_string(),
            model: BTreeMap::new(),
        }
    }

    /// Adds a record and tracks it on success.
    pub async fn add(&mut self, value: Value, key: Option<Key>) -> DbResult<Key> {
        let added = self.db.add(&self.store, value, key).await?;
        let stored = self
            .db
            .get_by_key(&self.store, &added.key)
            .await?
            .expect("added record is readable");
        self.model.insert(added.key.clone(), stored);
        Ok(added.key)
    }

    /// Writes a record under an explicit key and tracks it on success.
    ///
    /// Only valid for stores with out-of-line keys.
    pub async fn update(&mut self, value: Value, key: Key) -> DbResult<()> {
        let written = self.db.update(&self.store, value, Some(key.clone())).await?;
        self.model.insert(key, written);
        Ok(())
    }

    /// Deletes a record and stops tracking it on success.
    pub async fn delete(&mut self, key: &Key) -> DbResult<()> {
        self.db.delete(&self.store, key).await?;
        self.model.remove(key);
        Ok(())
    }

    /// Clears the store and the model on success.
    pub async fn clear(&mut self) -> DbResult<()> {
        self.db.clear(&self.store).await?;
        self.model.clear();
        Ok(())
    }

    /// Reads a record and checks it against the model.
    pub async fn get_and_verify(&self, key: &Key) -> Option<Value> {
        let actual = self
            .db
            .get_by_key(&self.store, key)
            .await
            .expect("Failed to get record");
        assert_eq!(
            actual.as_ref(),
            self.model.get(key),
            "record mismatch for key {key}"
        );
        actual
    }

    /// Checks the whole store against the model, in key order.
    pub async fn verify_all(&self) {
        let actual = self
            .db
            .get_all(&self.store, None, None)
            .await
            .expect("Failed to read store");
        let expected: Vec<Value> = self.model.values().cloned().collect();
        assert_eq!(actual, expected, "store contents diverged from the model");
    }

    /// Returns the count of tracked records.
    pub fn tracked_count(&self) -> usize {
        self.model.len()
    }
}
