//! Transaction adapter.
//!
//! Every operation passes a [`TransactionContext`] to [`acquire`], issues
//! its request against the returned [`TransactionHandle`], and settles the
//! handle exactly once. The handle tracks its [`TransactionState`]:
//!
//! ```text
//! Pending → Active → {Complete, Aborted, Errored}
//! ```

mod adapter;
mod context;
mod state;

pub use adapter::{acquire, Settle, TransactionHandle};
pub use context::TransactionContext;
pub use state::TransactionState;
