//! Typed store access.

use crate::database::{Database, IndexDetails};
use crate::error::DbResult;
use neoidb_engine::{Engine, Key, KeyRange};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// A typed view of one object store.
///
/// `TypedStore<T>` converts between `T` and the JSON records the engine
/// stores, using `serde`. Each call runs in its own transaction, exactly
/// like the untyped operations on [`Database`].
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Serialize, Deserialize)]
/// struct Note { title: String }
///
/// let notes = db.typed::<Note>("notes");
/// let key = notes.add(&Note { title: "hi".into() }, None).await?;
/// let note = notes.get(&key).await?;
/// ```
pub struct TypedStore<'a, E: Engine, T> {
    db: &'a Database<E>,
    store: String,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, E: Engine, T> TypedStore<'a, E, T> {
    pub(crate) fn new(db: &'a Database<E>, store: String) -> Self {
        Self {
            db,
            store,
            _marker: PhantomData,
        }
    }

    /// Returns the store name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.store
    }
}

impl<E: Engine, T> TypedStore<'_, E, T>
where
    T: Serialize + DeserializeOwned,
{
    /// Reads the record stored under `key`.
    ///
    /// # Errors
    ///
    /// Fails like [`Database::get_by_key`], or with a serialization error if
    /// the record does not decode as `T`.
    pub async fn get(&self, key: &Key) -> DbResult<Option<T>> {
        self.db
            .get_by_key(&self.store, key)
            .await?
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    /// Reads the first record whose `index` key equals `key`.
    ///
    /// # Errors
    ///
    /// Fails like [`Database::get_by_index`], or with a serialization error
    /// if the record does not decode as `T`.
    pub async fn get_by_index(&self, index: &str, key: &Key) -> DbResult<Option<T>> {
        self.db
            .get_by_index(&self.store, index, key)
            .await?
            .map(serde_json::from_value)
            .transpose()
            .map_err(Into::into)
    }

    /// Collects the records in `range`, in cursor order.
    ///
    /// # Errors
    ///
    /// Fails like [`Database::get_all`], or with a serialization error if a
    /// record does not decode as `T`.
    pub async fn get_all(
        &self,
        range: Option<&KeyRange>,
        index: Option<&IndexDetails>,
    ) -> DbResult<Vec<T>> {
        self.db
            .get_all(&self.store, range, index)
            .await?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(Into::into))
            .collect()
    }

    /// Inserts a record and returns the key the engine stored it under.
    ///
    /// # Errors
    ///
    /// Fails like [`Database::add`], or with a serialization error if
    /// `record` cannot be encoded.
    pub async fn add(&self, record: &T, key: Option<Key>) -> DbResult<Key> {
        let value = serde_json::to_value(record)?;
        Ok(self.db.add(&self.store, value, key).await?.key)
    }

    /// Inserts or replaces a record.
    ///
    /// # Errors
    ///
    /// Fails like [`Database::update`], or with a serialization error if
    /// `record` cannot be encoded.
    pub async fn put(&self, record: &T, key: Option<Key>) -> DbResult<()> {
        let value = serde_json::to_value(record)?;
        self.db.update(&self.store, value, key).await?;
        Ok(())
    }

    /// Removes the record stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Fails like [`Database::delete`].
    pub async fn delete(&self, key: &Key) -> DbResult<()> {
        self.db.delete(&self.store, key).await
    }

    /// Removes every record.
    ///
    /// # Errors
    ///
    /// Fails like [`Database::clear`].
    pub async fn clear(&self) -> DbResult<()> {
        self.db.clear(&self.store).await
    }
}
