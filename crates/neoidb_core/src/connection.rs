//! Connection management.
//!
//! The [`ConnectionManager`] owns the engine handle of one named database.
//! It performs the open/upgrade handshake and validates every operation's
//! store before a transaction is requested.

use crate::config::Config;
use crate::error::{DbResult, PreconditionError};
use neoidb_engine::{Engine, EngineDatabase, UpgradeHandler};
use parking_lot::RwLock;
use std::fmt;

struct ConnectionState<D> {
    version: u32,
    handle: Option<D>,
}

/// Owns the handle to an opened database.
pub struct ConnectionManager<E: Engine> {
    engine: E,
    name: String,
    state: RwLock<ConnectionState<E::Database>>,
}

impl<E: Engine> ConnectionManager<E> {
    /// Creates a manager for the database named in `config`. Nothing is
    /// opened until [`open`](Self::open) is called.
    pub fn new(engine: E, config: &Config) -> Self {
        Self {
            engine,
            name: config.name.clone(),
            state: RwLock::new(ConnectionState {
                version: config.version,
                handle: None,
            }),
        }
    }

    /// Returns the engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Returns the database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the version of the open handle, or the configured version
    /// before the first open.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.state.read().version
    }

    /// Returns whether a handle is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.read().handle.is_some()
    }

    /// Opens the database at `version`.
    ///
    /// When `version` is above the stored version the engine first runs
    /// `upgrade`. A previously open handle is closed and replaced.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DbError::Engine`] with the engine's error if the
    /// open fails; the current handle is kept in that case.
    pub async fn open(&self, version: u32, upgrade: Option<UpgradeHandler>) -> DbResult<()> {
        tracing::debug!(database = %self.name, version, "opening database");
        let handle = self.engine.open(&self.name, version, upgrade).await?;

        let previous = {
            let mut state = self.state.write();
            state.version = handle.version();
            state.handle.replace(handle)
        };
        if let Some(previous) = previous {
            previous.close();
        }
        tracing::debug!(database = %self.name, version, "database open");
        Ok(())
    }

    /// Closes the handle, if any. Later operations fail with
    /// [`PreconditionError::NotOpen`].
    pub fn close(&self) {
        let handle = self.state.write().handle.take();
        if let Some(handle) = handle {
            handle.close();
            tracing::debug!(database = %self.name, "database closed");
        }
    }

    /// Returns the store names of the open handle, or an empty list.
    #[must_use]
    pub fn store_names(&self) -> Vec<String> {
        self.state
            .read()
            .handle
            .as_ref()
            .map(EngineDatabase::object_store_names)
            .unwrap_or_default()
    }

    /// Returns whether a handle is open and has a store named `name`.
    #[must_use]
    pub fn has_store(&self, name: &str) -> bool {
        self.state
            .read()
            .handle
            .as_ref()
            .is_some_and(|handle| handle.object_store_names().iter().any(|s| s == name))
    }

    /// Validates that `store` can be used and returns the handle.
    ///
    /// Callers must return early on error so no transaction is requested.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::NotOpen`] without a handle, or
    /// [`PreconditionError::StoreNotFound`] if the store does not exist.
    pub fn ensure_ready(&self, store: &str) -> Result<E::Database, PreconditionError> {
        let state = self.state.read();
        let handle = state.handle.as_ref().ok_or(PreconditionError::NotOpen)?;
        if !handle.object_store_names().iter().any(|s| s == store) {
            return Err(PreconditionError::store_not_found(store));
        }
        Ok(handle.clone())
    }
}

impl<E: Engine> fmt::Debug for ConnectionManager<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("ConnectionManager")
            .field("name", &self.name)
            .field("version", &state.version)
            .field("open", &state.handle.is_some())
            .finish_non_exhaustive()
    }
}
