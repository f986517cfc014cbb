//! # neoidb Engine
//!
//! Transactional key/value engine interface and an in-memory engine for
//! neoidb.
//!
//! This crate is the lowest layer of neoidb. An engine owns databases,
//! their object stores and indexes, and the transaction lifecycle. It
//! reports every outcome through one-shot [`Request`] and [`Completion`]
//! signals, so the adapter layer above it never blocks on storage.
//!
//! ## Design Principles
//!
//! - Engines are capability-style collaborators behind the [`Engine`] traits
//! - Records are JSON values; keys are ordered [`Key`]s
//! - Every transaction ends in exactly one [`TransactionSignal`]
//! - A failed request aborts its transaction
//!
//! ## Available Engines
//!
//! - [`MemoryEngine`] - For tests and native hosts
//!
//! ## Example
//!
//! ```rust
//! use neoidb_engine::{Key, KeyRange};
//!
//! let range = KeyRange::bound(1, 10, false, true).unwrap();
//! assert!(range.includes(&Key::from(1)));
//! assert!(!range.includes(&Key::from(10)));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod key;
mod memory;
mod request;
mod stats;
mod types;

pub use config::MemoryEngineConfig;
pub use engine::{
    Engine, EngineCursor, EngineDatabase, EngineIndex, EngineObjectStore, EngineTransaction,
    SchemaEditor, UpgradeHandler,
};
pub use error::{EngineError, EngineErrorKind, EngineResult};
pub use key::{Key, KeyPath, KeyRange};
pub use memory::{
    MemoryCursor, MemoryDatabase, MemoryEngine, MemoryIndex, MemoryObjectStore, MemoryTransaction,
};
pub use request::{Completion, Request, TransactionSignal};
pub use stats::{EngineStats, StatsSnapshot};
pub use types::{
    CursorDirection, CursorRecord, IndexParameters, StoreParameters, TransactionMode,
    VersionChange,
};
