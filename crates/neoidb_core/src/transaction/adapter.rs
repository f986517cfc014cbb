//! Transaction adapter.
//!
//! Drives one engine transaction through [`TransactionState`] and turns
//! its terminal signal into exactly one settlement.

use super::{TransactionContext, TransactionState};
use crate::error::{DbError, DbResult};
use neoidb_engine::{
    EngineDatabase, EngineError, EngineResult, EngineTransaction, TransactionSignal,
};
use std::fmt;
use std::marker::PhantomData;

/// Receives the terminal signal of a transaction.
///
/// Each method consumes the sink, so at most one of them runs.
pub trait Settle: Sized {
    /// Value produced on success.
    type Output;

    /// The transaction committed.
    fn on_complete(self) -> DbResult<Self::Output>;

    /// The transaction failed before commit.
    fn on_error(self, error: EngineError) -> DbResult<Self::Output> {
        Err(DbError::Engine(error))
    }

    /// The transaction was rolled back.
    fn on_abort(self, error: EngineError) -> DbResult<Self::Output> {
        Err(DbError::Aborted(error))
    }
}

impl<T, F> Settle for F
where
    F: FnOnce() -> DbResult<T>,
{
    type Output = T;

    fn on_complete(self) -> DbResult<T> {
        self()
    }
}

/// Sink for a transaction whose request failed.
///
/// The engine is expected to abort; a commit after a failed request is
/// still reported as an abort carrying the request's error.
struct RequestFailed<T> {
    error: EngineError,
    _output: PhantomData<T>,
}

impl<T> Settle for RequestFailed<T> {
    type Output = T;

    fn on_complete(self) -> DbResult<T> {
        Err(DbError::Aborted(self.error))
    }
}

/// Obtains a transaction for `context` from `db`.
///
/// # Errors
///
/// Returns [`DbError::Engine`] if the engine refuses the transaction, and
/// [`DbError::Aborted`] if the granted transaction does not cover the
/// store.
pub async fn acquire<D>(
    db: &D,
    context: TransactionContext,
) -> DbResult<TransactionHandle<D::Transaction>>
where
    D: EngineDatabase,
{
    let mut state = TransactionState::Pending;
    tracing::trace!(store = context.store(), mode = %context.mode(), "requesting transaction");

    let transaction = match db.transaction(&[context.store()], context.mode()).await {
        Ok(transaction) => transaction,
        Err(err) => {
            state.transition(TransactionState::Errored)?;
            tracing::debug!(store = context.store(), error = %err, "transaction refused");
            return Err(DbError::Engine(err));
        }
    };
    state.transition(TransactionState::Active)?;

    let store = match transaction.object_store(context.store()) {
        Ok(store) => store,
        Err(err) => {
            transaction.abort();
            return match transaction.finish().await {
                TransactionSignal::Error(_) => {
                    state.transition(TransactionState::Errored)?;
                    Err(DbError::Engine(err))
                }
                TransactionSignal::Abort(_) | TransactionSignal::Complete => {
                    state.transition(TransactionState::Aborted)?;
                    tracing::debug!(store = context.store(), error = %err, "store lookup aborted the transaction");
                    Err(DbError::Aborted(err))
                }
            };
        }
    };

    Ok(TransactionHandle {
        context,
        state,
        transaction,
        store,
    })
}

/// An active transaction together with the store it was opened for.
pub struct TransactionHandle<T: EngineTransaction> {
    context: TransactionContext,
    state: TransactionState,
    transaction: T,
    store: T::ObjectStore,
}

impl<T: EngineTransaction> TransactionHandle<T> {
    /// Returns the context the transaction was acquired for.
    #[must_use]
    pub fn context(&self) -> &TransactionContext {
        &self.context
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns the object store the transaction was opened for.
    #[must_use]
    pub fn store(&self) -> &T::ObjectStore {
        &self.store
    }

    /// Marks the transaction for rollback.
    pub fn abort(&self) {
        self.transaction.abort();
    }

    /// Waits for the terminal signal and hands it to `sink`.
    ///
    /// # Errors
    ///
    /// Returns whatever the chosen sink method returns.
    pub async fn finish<S: Settle>(self, sink: S) -> DbResult<S::Output> {
        let Self {
            context,
            mut state,
            transaction,
            store,
        } = self;
        drop(store);

        let signal = transaction.finish().await;
        let next = match &signal {
            TransactionSignal::Complete => TransactionState::Complete,
            TransactionSignal::Error(_) => TransactionState::Errored,
            TransactionSignal::Abort(_) => TransactionState::Aborted,
        };
        state.transition(next)?;
        tracing::debug!(store = context.store(), mode = %context.mode(), %state, "transaction settled");

        match signal {
            TransactionSignal::Complete => sink.on_complete(),
            TransactionSignal::Error(err) => sink.on_error(err),
            TransactionSignal::Abort(err) => sink.on_abort(err),
        }
    }

    /// Settles the transaction after its single request.
    ///
    /// A successful request resolves with its value once the transaction
    /// commits. A failed request aborts the transaction and rejects with
    /// the request's error.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Aborted`] or [`DbError::Engine`] as signalled by
    /// the engine.
    pub async fn settle<R>(self, outcome: EngineResult<R>) -> DbResult<R> {
        match outcome {
            Ok(value) => self.finish(move || -> DbResult<R> { Ok(value) }).await,
            Err(error) => {
                self.abort();
                self.finish(RequestFailed {
                    error,
                    _output: PhantomData,
                })
                .await
            }
        }
    }
}

impl<T: EngineTransaction> fmt::Debug for TransactionHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionHandle")
            .field("context", &self.context)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neoidb_engine::{
        Engine, EngineErrorKind, EngineObjectStore, Key, MemoryDatabase, MemoryEngine,
        StoreParameters,
    };
    use serde_json::json;

    async fn open() -> (MemoryEngine, MemoryDatabase) {
        let engine = MemoryEngine::new();
        let db = engine
            .open(
                "adapter",
                1,
                Some(Box::new(|_, schema| {
                    schema.create_object_store("items", StoreParameters::new().auto_increment(true))
                })),
            )
            .await
            .unwrap();
        (engine, db)
    }

    #[tokio::test]
    async fn acquire_activates() {
        let (engine, db) = open().await;
        let handle = acquire(&db, TransactionContext::read_write("items"))
            .await
            .unwrap();
        assert_eq!(handle.state(), TransactionState::Active);
        assert_eq!(handle.context().store(), "items");

        let outcome = handle.store().add(json!("a"), None).await;
        let key = handle.settle(outcome).await.unwrap();
        assert_eq!(key, Key::Integer(1));

        let stats = engine.stats();
        assert_eq!(stats.transactions_started, 1);
        assert_eq!(stats.transactions_committed, 1);
    }

    #[tokio::test]
    async fn acquire_unknown_store_is_engine_error() {
        let (_engine, db) = open().await;
        let err = acquire(&db, TransactionContext::read_only("missing"))
            .await
            .unwrap_err();
        assert_eq!(
            err.engine_error().map(EngineError::kind),
            Some(EngineErrorKind::NotFound)
        );
        assert!(!err.is_abort());
    }

    /// Grants every transaction over `items`, whatever was asked for.
    #[derive(Clone)]
    struct ItemsOnly(MemoryDatabase);

    impl EngineDatabase for ItemsOnly {
        type Transaction = <MemoryDatabase as EngineDatabase>::Transaction;

        fn name(&self) -> &str {
            self.0.name()
        }

        fn version(&self) -> u32 {
            self.0.version()
        }

        fn object_store_names(&self) -> Vec<String> {
            self.0.object_store_names()
        }

        fn transaction(
            &self,
            _stores: &[&str],
            mode: neoidb_engine::TransactionMode,
        ) -> neoidb_engine::Request<Self::Transaction> {
            self.0.transaction(&["items"], mode)
        }

        fn close(&self) {
            self.0.close();
        }
    }

    #[tokio::test]
    async fn store_outside_scope_rejects_with_abort() {
        let (engine, db) = open().await;
        let err = acquire(&ItemsOnly(db), TransactionContext::read_write("notes"))
            .await
            .unwrap_err();
        assert!(err.is_abort());
        assert_eq!(
            err.engine_error().map(EngineError::kind),
            Some(EngineErrorKind::NotFound)
        );

        let stats = engine.stats();
        assert_eq!(stats.transactions_started, 1);
        assert_eq!(stats.transactions_aborted, 1);
    }

    #[tokio::test]
    async fn failed_request_rejects_with_abort() {
        let (engine, db) = open().await;
        let handle = acquire(&db, TransactionContext::read_only("items"))
            .await
            .unwrap();
        let outcome = handle.store().clear().await;
        let err = handle.settle(outcome).await.unwrap_err();
        assert!(err.is_abort());
        assert_eq!(
            err.engine_error().map(EngineError::kind),
            Some(EngineErrorKind::ReadOnly)
        );
        assert_eq!(engine.stats().transactions_aborted, 1);
    }

    #[tokio::test]
    async fn explicit_abort_uses_abort_sink() {
        let (_engine, db) = open().await;
        let handle = acquire(&db, TransactionContext::read_write("items"))
            .await
            .unwrap();
        handle.abort();

        struct Recorder;
        impl Settle for Recorder {
            type Output = &'static str;
            fn on_complete(self) -> DbResult<&'static str> {
                Ok("complete")
            }
            fn on_error(self, _: EngineError) -> DbResult<&'static str> {
                Ok("error")
            }
            fn on_abort(self, _: EngineError) -> DbResult<&'static str> {
                Ok("abort")
            }
        }

        assert_eq!(handle.finish(Recorder).await.unwrap(), "abort");
    }
}
