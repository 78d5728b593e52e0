//! # apptxn Core
//!
//! Durable, local log of application business transactions.
//!
//! This crate provides:
//! - The [`Transaction`] / [`TransactionLog`] model
//! - The two-table schema and its bootstrap
//! - [`TransactionRepository`] for creating, logging, fetching and deleting
//!
//! ## Key Invariants
//!
//! - A transaction's `local_id` is assigned once, at insert, and never changes
//! - A log row always references an existing transaction when inserted
//! - Log timestamps of one transaction never decrease in persistence order
//! - Fetched transactions are immutable snapshots, never live views

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod model;
mod repository;
pub mod schema;

pub use error::{CoreError, CoreResult};
pub use model::{DeviceInfo, LocalId, LogEvent, LogId, Timestamp, Transaction, TransactionLog};
pub use repository::{SentDeletion, StoreCounts, TransactionRepository};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
