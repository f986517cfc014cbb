//! Error types reported by storage engines.

use std::fmt;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Classification of an engine failure.
///
/// The variants mirror the DOMException names an IndexedDB implementation
/// reports, so errors from a browser engine and from [`crate::MemoryEngine`]
/// can be told apart the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineErrorKind {
    /// A named database object (store, index) does not exist.
    NotFound,
    /// A mutation violated a constraint, such as a duplicate key.
    Constraint,
    /// A key, key range or key path was invalid.
    Data,
    /// A mutation was attempted in a read-only transaction.
    ReadOnly,
    /// The requested version is lower than the stored version.
    Version,
    /// The transaction was aborted.
    Abort,
    /// The engine ran out of storage quota.
    QuotaExceeded,
    /// The call is not allowed in the object's current state.
    InvalidState,
    /// The call is not allowed with the given arguments.
    InvalidAccess,
    /// A request was issued against a finished transaction.
    TransactionInactive,
    /// Anything the engine could not classify.
    Unknown,
}

impl EngineErrorKind {
    /// Returns the engine's name for this error class.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NotFound => "NotFoundError",
            Self::Constraint => "ConstraintError",
            Self::Data => "DataError",
            Self::ReadOnly => "ReadOnlyError",
            Self::Version => "VersionError",
            Self::Abort => "AbortError",
            Self::QuotaExceeded => "QuotaExceededError",
            Self::InvalidState => "InvalidStateError",
            Self::InvalidAccess => "InvalidAccessError",
            Self::TransactionInactive => "TransactionInactiveError",
            Self::Unknown => "UnknownError",
        }
    }
}

impl fmt::Display for EngineErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An error reported by a storage engine.
///
/// Carries the engine's classification and message unmodified so callers
/// keep the full diagnostic detail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct EngineError {
    kind: EngineErrorKind,
    message: String,
}

impl EngineError {
    /// Creates an error of the given kind.
    pub fn new(kind: EngineErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Returns the error classification.
    #[must_use]
    pub fn kind(&self) -> EngineErrorKind {
        self.kind
    }

    /// Returns the engine's message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Creates a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::NotFound, message)
    }

    /// Creates a constraint error.
    pub fn constraint(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Constraint, message)
    }

    /// Creates a data error.
    pub fn data(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Data, message)
    }

    /// Creates a read-only error.
    pub fn read_only(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::ReadOnly, message)
    }

    /// Creates a version error.
    pub fn version(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Version, message)
    }

    /// Creates an abort error.
    pub fn abort(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::Abort, message)
    }

    /// Creates a quota-exceeded error.
    pub fn quota_exceeded(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::QuotaExceeded, message)
    }

    /// Creates an invalid-state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::InvalidState, message)
    }

    /// Creates an invalid-access error.
    pub fn invalid_access(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::InvalidAccess, message)
    }

    /// Creates a transaction-inactive error.
    pub fn transaction_inactive(message: impl Into<String>) -> Self {
        Self::new(EngineErrorKind::TransactionInactive, message)
    }
}
