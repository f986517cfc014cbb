//! Record storage for one object store.

use crate::error::{EngineError, EngineResult};
use crate::key::{Key, KeyRange};
use crate::types::{CursorDirection, CursorRecord, IndexParameters, StoreParameters};
use serde_json::Value;
use std::collections::BTreeMap;

/// First key handed out by a key generator.
const GENERATOR_START: i64 = 1;

/// Records, schema and key generator of one object store.
#[derive(Debug, Clone)]
pub(crate) struct StoreData {
    pub(crate) params: StoreParameters,
    pub(crate) indexes: BTreeMap<String, IndexParameters>,
    pub(crate) records: BTreeMap<Key, Value>,
    next_key: i64,
}

impl StoreData {
    pub(crate) fn new(params: StoreParameters) -> Self {
        Self {
            params,
            indexes: BTreeMap::new(),
            records: BTreeMap::new(),
            next_key: GENERATOR_START,
        }
    }

    /// Inserts `value`, generating or extracting its key as the store's
    /// parameters require.
    pub(crate) fn insert(
        &mut self,
        mut value: Value,
        key: Option<Key>,
        overwrite: bool,
    ) -> EngineResult<Key> {
        let key = self.resolve_key(&mut value, key)?;
        if !overwrite && self.records.contains_key(&key) {
            return Err(EngineError::constraint(format!(
                "a record with key {key} already exists"
            )));
        }
        self.check_unique(&key, &value)?;
        self.records.insert(key.clone(), value);
        Ok(key)
    }

    fn resolve_key(&mut self, value: &mut Value, key: Option<Key>) -> EngineResult<Key> {
        match (self.params.key_path.clone(), key) {
            (Some(path), Some(_)) => Err(EngineError::data(format!(
                "store uses in-line keys at `{path}`; an explicit key was provided"
            ))),
            (Some(path), None) => match path.evaluate(value)? {
                Some(found) => {
                    self.bump_generator(&found);
                    Ok(found)
                }
                None if self.params.auto_increment => {
                    let generated = self.generate()?;
                    path.inject(value, &generated)?;
                    Ok(generated)
                }
                None => Err(EngineError::data(format!(
                    "evaluating key path `{path}` did not yield a key"
                ))),
            },
            (None, Some(explicit)) => {
                self.bump_generator(&explicit);
                Ok(explicit)
            }
            (None, None) if self.params.auto_increment => self.generate(),
            (None, None) => Err(EngineError::data(
                "store uses out-of-line keys and has no key generator; a key is required",
            )),
        }
    }

    fn generate(&mut self) -> EngineResult<Key> {
        if self.next_key == i64::MAX {
            return Err(EngineError::constraint("key generator exhausted"));
        }
        let key = Key::Integer(self.next_key);
        self.next_key += 1;
        Ok(key)
    }

    /// Explicit integer keys at or above the generator move it forward.
    fn bump_generator(&mut self, key: &Key) {
        if !self.params.auto_increment {
            return;
        }
        if let Some(n) = key.as_integer() {
            if n >= self.next_key {
                self.next_key = n.saturating_add(1);
            }
        }
    }

    fn check_unique(&self, primary_key: &Key, value: &Value) -> EngineResult<()> {
        for (name, params) in self.indexes.iter().filter(|(_, p)| p.unique) {
            let keys = params.index_keys(value);
            if keys.is_empty() {
                continue;
            }
            let clash = self
                .records
                .iter()
                .filter(|(pk, _)| *pk != primary_key)
                .any(|(_, other)| params.index_keys(other).iter().any(|k| keys.contains(k)));
            if clash {
                return Err(EngineError::constraint(format!(
                    "unique index `{name}` already contains one of the record's keys"
                )));
            }
        }
        Ok(())
    }

    /// Checks that existing records satisfy a new unique index.
    pub(crate) fn validate_unique(&self, name: &str, params: &IndexParameters) -> EngineResult<()> {
        if !params.unique {
            return Ok(());
        }
        let mut seen = std::collections::BTreeSet::new();
        for value in self.records.values() {
            for key in params.index_keys(value) {
                if !seen.insert(key) {
                    return Err(EngineError::constraint(format!(
                        "existing records violate unique index `{name}`"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Records visible to a store cursor, in cursor order.
    pub(crate) fn entries(
        &self,
        range: Option<&KeyRange>,
        direction: CursorDirection,
    ) -> Vec<CursorRecord> {
        let mut entries: Vec<CursorRecord> = self
            .records
            .iter()
            .filter(|(key, _)| range.map_or(true, |r| r.includes(key)))
            .map(|(key, value)| CursorRecord {
                key: key.clone(),
                primary_key: key.clone(),
                value: value.clone(),
            })
            .collect();
        if direction.is_reverse() {
            entries.reverse();
        }
        entries
    }

    /// Records visible to an index cursor, in cursor order.
    pub(crate) fn index_entries(
        &self,
        index: &str,
        range: Option<&KeyRange>,
        direction: CursorDirection,
    ) -> EngineResult<Vec<CursorRecord>> {
        let params = self
            .indexes
            .get(index)
            .ok_or_else(|| EngineError::not_found(format!("index `{index}` does not exist")))?;

        let mut entries: Vec<CursorRecord> = Vec::new();
        for (primary_key, value) in &self.records {
            for key in params.index_keys(value) {
                if range.map_or(true, |r| r.includes(&key)) {
                    entries.push(CursorRecord {
                        key,
                        primary_key: primary_key.clone(),
                        value: value.clone(),
                    });
                }
            }
        }
        entries.sort_by(|a, b| {
            a.key
                .cmp(&b.key)
                .then_with(|| a.primary_key.cmp(&b.primary_key))
        });
        // Unique walks keep the lowest primary key per index key in both directions.
        if direction.is_unique() {
            entries.dedup_by(|later, earlier| later.key == earlier.key);
        }
        if direction.is_reverse() {
            entries.reverse();
        }
        Ok(entries)
    }
}
