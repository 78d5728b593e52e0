//! # apptxn Sync Engine
//!
//! Flushes locally recorded transactions to a remote store.
//!
//! This crate provides:
//! - [`FlushCoordinator`]: synchronous and timer-triggered flush passes
//! - [`RemoteStore`] abstraction with an HTTP adapter and a mock
//! - Per-transaction backoff for transactions the remote keeps rejecting
//! - [`FlushScheduler`] driving asynchronous flushes on a tokio interval
//! - [`TransactionManager`], the application-facing facade
//!
//! ## Delivery
//!
//! Delivery is **at-least-once**. A transaction is deleted locally only after
//! the remote acknowledged it; if the process dies between the
//! acknowledgement and the delete, the transaction is sent again on the next
//! pass. The remote is expected to deduplicate on the transaction `guid`.
//!
//! ## Key Invariants
//!
//! - Only acknowledged transactions are ever deleted by a flush
//! - A transaction is sent whole: itself plus all its logs
//! - Logs written while their transaction is in flight are kept for the
//!   next pass, never deleted unsent
//! - A busy response stops the pass and fires the busy callback once
//! - Two flush passes never run at the same time

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod flush;
mod http;
mod ledger;
mod manager;
mod remote;
mod scheduler;

pub use config::{FlushConfig, ManagerConfig, RemoteConfig, RetryConfig};
pub use error::{SyncError, SyncResult};
pub use flush::{BusyHandler, FlushCoordinator, FlushReport, FlushStats, TickOutcome};
pub use http::{HttpClient, HttpRemoteStore, HttpRequest};
pub use manager::TransactionManager;
pub use remote::{MockRemote, MockReply, RemoteResponse, RemoteStore};
pub use scheduler::FlushScheduler;
