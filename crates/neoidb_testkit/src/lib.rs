//! # neoidb Testkit
//!
//! Test utilities for neoidb.
//!
//! This crate provides:
//! - Test fixtures with a ready-made schema on the memory engine
//! - Property-based test generators using proptest
//! - A model-checking integration harness
//!
//! ## Usage
//!
//! ```rust,ignore
//! use neoidb_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn test_with_database() {
//!     let db = TestDatabase::open().await;
//!     let added = db.add(ITEMS, serde_json::json!({"n": 1}), None).await.unwrap();
//!     // ... test operations
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
