//! # apptxn Storage
//!
//! Generic data-access layer for apptxn over SQLite.
//!
//! This crate is the lowest layer of apptxn. It knows nothing about
//! transactions or logs; it executes parameterized statements and hands back
//! generated ids, affected-row counts and typed rows.
//!
//! ## Design Principles
//!
//! - One connection per store, guarded by a single lock (the execution queue)
//! - No two statements ever run concurrently against that connection
//! - Multi-statement sequences are **not** implicitly atomic; callers opt in
//!   with [`LocalStore::in_transaction`]
//! - Every failure is a [`StoreError`] carrying the engine code and description
//!
//! ## Example
//!
//! ```rust
//! use apptxn_storage::LocalStore;
//!
//! let store = LocalStore::open_in_memory().unwrap();
//! store.update("CREATE TABLE kv (id INTEGER PRIMARY KEY, v TEXT)").unwrap();
//! let id = store.insert("INSERT INTO kv (v) VALUES (?1)", &[&"hello"]).unwrap();
//! let v: Option<String> = store.value_from("kv", "v", "id", &id).unwrap();
//! assert_eq!(v.as_deref(), Some("hello"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod session;
mod store;

pub use config::{JournalMode, StoreConfig, SynchronousMode};
pub use error::{StoreError, StoreResult, GENERIC_ERROR_CODE};
pub use session::{RowId, Session};
pub use store::LocalStore;

/// Re-exported so callers can name rows and bound values without a direct
/// `rusqlite` dependency.
pub use rusqlite::{types::FromSql, Error as RowError, Row, ToSql};

/// Result type returned by row-mapping functions.
pub type RowResult<T> = Result<T, RowError>;
