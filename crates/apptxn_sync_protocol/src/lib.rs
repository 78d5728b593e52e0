//! # apptxn Sync Protocol
//!
//! Shapes exchanged with the remote transaction store.
//!
//! This crate provides:
//! - [`TransactionPayload`], the JSON representation of one transaction
//! - [`RequestMeta`], the authentication and media-type metadata sent with it
//! - [`RemoteOutcome`] and [`classify_status`], the three-way response
//!   classification (acknowledged / server busy / other failure)
//!
//! The network exchange itself lives in `apptxn_sync_engine`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod meta;
mod outcome;
mod payload;

pub use error::{ProtocolError, ProtocolResult};
pub use meta::{Charset, RequestMeta, MEDIA_TYPE_PREFIX, MEDIA_TYPE_SUFFIX};
pub use outcome::{classify_status, RemoteOutcome, SERVICE_UNAVAILABLE};
pub use payload::{FlushRequest, LogEntryPayload, TransactionPayload, UserAgentPayload};
