//! # neoidb Core
//!
//! Asynchronous adapter over transactional key/value engines.
//!
//! This crate provides:
//! - [`ConnectionManager`] - open/upgrade handshake and store validation
//! - the transaction adapter - an explicit state machine that settles every
//!   engine transaction exactly once
//! - [`Database`] - CRUD and cursor operations, each in its own transaction
//! - [`TypedStore`] - `serde`-typed access to a store
//!
//! Engines implement the traits of [`neoidb_engine`]; the in-memory engine
//! from that crate is the reference implementation.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connection;
mod database;
mod error;
pub mod transaction;
mod typed;

pub use config::{Config, DEFAULT_NAME};
pub use connection::ConnectionManager;
pub use database::{Added, Database, IndexDetails, Order};
pub use error::{DbError, DbResult, PreconditionError};
pub use transaction::{TransactionContext, TransactionState};
pub use typed::TypedStore;
