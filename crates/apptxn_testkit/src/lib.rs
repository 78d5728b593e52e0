//! # apptxn Testkit
//!
//! Test utilities for apptxn.
//!
//! This crate provides:
//! - Test fixtures and repository helpers
//! - Property-based test generators using proptest
//! - [`ScriptedRemote`], a remote store with scripted replies and latency
//! - Concurrency stress helpers
//!
//! ## Usage
//!
//! ```rust
//! use apptxn_testkit::prelude::*;
//!
//! with_temp_repository(|repo| {
//!     let txn = repo.create_transaction(7, &test_device()).unwrap();
//!     assert_eq!(repo.all_transactions().unwrap(), vec![txn]);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod remote;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::remote::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use remote::*;
pub use stress::*;
