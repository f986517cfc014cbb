//! Core type definitions shared by engines and adapters.

use crate::key::{Key, KeyPath};
use serde_json::Value;
use std::fmt;

/// Access mode of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionMode {
    /// Reads only; may overlap with other read-only transactions.
    ReadOnly,
    /// Reads and writes; serialized per store.
    ReadWrite,
}

impl fmt::Display for TransactionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadOnly => f.write_str("readonly"),
            Self::ReadWrite => f.write_str("readwrite"),
        }
    }
}

/// Direction of a cursor walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CursorDirection {
    /// Ascending key order.
    #[default]
    Next,
    /// Ascending key order, one record per distinct key.
    NextUnique,
    /// Descending key order.
    Prev,
    /// Descending key order, one record per distinct key.
    PrevUnique,
}

impl CursorDirection {
    /// Whether the walk is descending.
    #[must_use]
    pub const fn is_reverse(self) -> bool {
        matches!(self, Self::Prev | Self::PrevUnique)
    }

    /// Whether duplicate keys are skipped.
    #[must_use]
    pub const fn is_unique(self) -> bool {
        matches!(self, Self::NextUnique | Self::PrevUnique)
    }
}

impl fmt::Display for CursorDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Next => f.write_str("next"),
            Self::NextUnique => f.write_str("nextunique"),
            Self::Prev => f.write_str("prev"),
            Self::PrevUnique => f.write_str("prevunique"),
        }
    }
}

/// The record a cursor is positioned on.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorRecord {
    /// The cursor key: the primary key for store cursors, the index key
    /// for index cursors.
    pub key: Key,
    /// The record's primary key.
    pub primary_key: Key,
    /// The record.
    pub value: Value,
}

/// Parameters of an object store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreParameters {
    /// Path of the in-line key inside each record, if keys are in-line.
    pub key_path: Option<KeyPath>,
    /// Whether the store has a key generator.
    pub auto_increment: bool,
}

impl StoreParameters {
    /// Parameters for a store with out-of-line keys and no generator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the in-line key path.
    #[must_use]
    pub fn key_path(mut self, path: impl Into<KeyPath>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    /// Enables or disables the key generator.
    #[must_use]
    pub const fn auto_increment(mut self, value: bool) -> Self {
        self.auto_increment = value;
        self
    }
}

/// Parameters of an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexParameters {
    /// Path of the indexed value inside each record.
    pub key_path: KeyPath,
    /// Whether two records may share an index key.
    pub unique: bool,
    /// Whether array values produce one index entry per element.
    pub multi_entry: bool,
}

impl IndexParameters {
    /// Parameters for a non-unique, single-entry index on `key_path`.
    pub fn new(key_path: impl Into<KeyPath>) -> Self {
        Self {
            key_path: key_path.into(),
            unique: false,
            multi_entry: false,
        }
    }

    /// Sets the unique flag.
    #[must_use]
    pub const fn unique(mut self, value: bool) -> Self {
        self.unique = value;
        self
    }

    /// Sets the multi-entry flag.
    #[must_use]
    pub const fn multi_entry(mut self, value: bool) -> Self {
        self.multi_entry = value;
        self
    }

    /// Computes the index keys a record contributes.
    ///
    /// Records whose indexed value is absent or not a valid key contribute
    /// nothing. With `multi_entry`, each valid element of an array value
    /// contributes one key, duplicates removed.
    #[must_use]
    pub fn index_keys(&self, record: &Value) -> Vec<Key> {
        let Some(found) = self.key_path.lookup(record) else {
            return Vec::new();
        };
        match found {
            Value::Array(items) if self.multi_entry => {
                let mut keys: Vec<Key> = items.iter().filter_map(Key::from_json).collect();
                keys.sort();
                keys.dedup();
                keys
            }
            other => Key::from_json(other).into_iter().collect(),
        }
    }
}

/// Versions involved in an upgrade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionChange {
    /// The stored version before the upgrade (0 for a new database).
    pub old_version: u32,
    /// The version being opened.
    pub new_version: u32,
}
