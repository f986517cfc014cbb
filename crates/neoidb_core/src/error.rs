//! Error types for neoidb core.

use crate::transaction::TransactionState;
use neoidb_engine::EngineError;
use thiserror::Error;

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// A precondition checked before any transaction is opened.
///
/// These are always recoverable: open the database first, or fix the
/// store name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreconditionError {
    /// No database handle is open.
    #[error("database is not open")]
    NotOpen,

    /// The open database has no store with this name.
    #[error("object store not found: {name}")]
    StoreNotFound {
        /// Name of the missing store.
        name: String,
    },
}

impl PreconditionError {
    /// Creates a store-not-found error.
    pub fn store_not_found(name: impl Into<String>) -> Self {
        Self::StoreNotFound { name: name.into() }
    }
}

/// Errors returned by database operations.
#[derive(Debug, Error)]
pub enum DbError {
    /// A precondition failed; no transaction was opened.
    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    /// The engine reported an error (open failure or transaction error).
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// The engine rolled the transaction back.
    #[error("transaction aborted: {0}")]
    Aborted(EngineError),

    /// The transaction adapter was driven through an illegal transition.
    #[error("invalid transaction state transition: {from} -> {to}")]
    InvalidState {
        /// State before the attempted transition.
        from: TransactionState,
        /// Requested state.
        to: TransactionState,
    },

    /// A typed record could not be converted to or from JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DbError {
    /// Returns whether this is a precondition failure.
    #[must_use]
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::Precondition(_))
    }

    /// Returns whether the transaction was aborted.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }

    /// Returns the engine-reported error, if any.
    #[must_use]
    pub fn engine_error(&self) -> Option<&EngineError> {
        match self {
            Self::Engine(err) | Self::Aborted(err) => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neoidb_engine::EngineErrorKind;

    #[test]
    fn precondition_display() {
        let err = DbError::from(PreconditionError::store_not_found("notes"));
        assert!(err.is_precondition());
        assert_eq!(
            err.to_string(),
            "precondition failed: object store not found: notes"
        );
    }

    #[test]
    fn engine_errors_are_carried_verbatim() {
        let source = EngineError::constraint("key 1 exists");
        let err = DbError::Aborted(source.clone());
        assert!(err.is_abort());
        assert_eq!(err.engine_error(), Some(&source));
        assert_eq!(
            err.engine_error().map(EngineError::kind),
            Some(EngineErrorKind::Constraint)
        );

        let err = DbError::from(EngineError::quota_exceeded("full"));
        assert!(!err.is_abort());
        assert!(err.to_string().contains("QuotaExceededError"));
    }

    #[test]
    fn invalid_state_display() {
        let err = DbError::InvalidState {
            from: TransactionState::Complete,
            to: TransactionState::Active,
        };
        assert!(err.engine_error().is_none());
        assert_eq!(
            err.to_string(),
            "invalid transaction state transition: complete -> active"
        );
    }
}
