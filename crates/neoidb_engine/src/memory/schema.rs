//! Schema editing during the upgrade phase.

use super::store::StoreData;
use crate::engine::SchemaEditor;
use crate::error::{EngineError, EngineResult};
use crate::types::{IndexParameters, StoreParameters};
use std::collections::BTreeMap;

/// Applies schema changes to a staged copy of a database's stores.
///
/// The staged copy is installed only if the whole upgrade succeeds.
pub(crate) struct MemorySchemaEditor<'a> {
    stores: &'a mut BTreeMap<String, StoreData>,
}

impl<'a> MemorySchemaEditor<'a> {
    pub(crate) fn new(stores: &'a mut BTreeMap<String, StoreData>) -> Self {
        Self { stores }
    }

    fn store_mut(&mut self, name: &str) -> EngineResult<&mut StoreData> {
        self.stores
            .get_mut(name)
            .ok_or_else(|| EngineError::not_found(format!("object store `{name}` does not exist")))
    }
}

impl SchemaEditor for MemorySchemaEditor<'_> {
    fn object_store_names(&self) -> Vec<String> {
        self.stores.keys().cloned().collect()
    }

    fn create_object_store(&mut self, name: &str, params: StoreParameters) -> EngineResult<()> {
        if self.stores.contains_key(name) {
            return Err(EngineError::constraint(format!(
                "object store `{name}` already exists"
            )));
        }
        tracing::debug!(store = name, ?params, "creating object store");
        self.stores.insert(name.to_string(), StoreData::new(params));
        Ok(())
    }

    fn delete_object_store(&mut self, name: &str) -> EngineResult<()> {
        self.stores
            .remove(name)
            .map(|_| tracing::debug!(store = name, "deleted object store"))
            .ok_or_else(|| EngineError::not_found(format!("object store `{name}` does not exist")))
    }

    fn index_names(&self, store: &str) -> EngineResult<Vec<String>> {
        self.stores
            .get(store)
            .map(|data| data.indexes.keys().cloned().collect())
            .ok_or_else(|| EngineError::not_found(format!("object store `{store}` does not exist")))
    }

    fn create_index(
        &mut self,
        store: &str,
        name: &str,
        params: IndexParameters,
    ) -> EngineResult<()> {
        let data = self.store_mut(store)?;
        if data.indexes.contains_key(name) {
            return Err(EngineError::constraint(format!(
                "index `{name}` already exists on `{store}`"
            )));
        }
        data.validate_unique(name, &params)?;
        tracing::debug!(store, index = name, "creating index");
        data.indexes.insert(name.to_string(), params);
        Ok(())
    }

    fn delete_index(&mut self, store: &str, name: &str) -> EngineResult<()> {
        let data = self.store_mut(store)?;
        data.indexes
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EngineError::not_found(format!("index `{name}` does not exist on `{store}`")))
    }
}
