//! Transaction lifecycle states.

use crate::error::{DbError, DbResult};
use std::fmt;

/// State of an adapted transaction.
///
/// ```text
/// Pending ──► Active ──► Complete
///    │          ├──────► Aborted
///    │          └──────► Errored
///    └──► Aborted | Errored
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransactionState {
    /// Requested from the database handle, not yet granted.
    #[default]
    Pending,
    /// Granted; requests may be issued.
    Active,
    /// Every request succeeded and the engine committed.
    Complete,
    /// The engine rolled the transaction back.
    Aborted,
    /// The transaction failed before it could commit.
    Errored,
}

impl TransactionState {
    /// Returns whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Aborted | Self::Errored)
    }

    /// Returns whether `self -> to` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        match self {
            Self::Pending => matches!(to, Self::Active | Self::Aborted | Self::Errored),
            Self::Active => to.is_terminal(),
            Self::Complete | Self::Aborted | Self::Errored => false,
        }
    }

    /// Moves to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidState`] for an illegal transition; the
    /// state is left unchanged.
    pub fn transition(&mut self, to: Self) -> DbResult<()> {
        if !self.can_transition_to(to) {
            return Err(DbError::InvalidState { from: *self, to });
        }
        *self = to;
        Ok(())
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Complete => "complete",
            Self::Aborted => "aborted",
            Self::Errored => "errored",
        };
        f.write_str(name)
    }
}
