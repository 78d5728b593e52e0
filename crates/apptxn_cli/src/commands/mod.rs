//! CLI command implementations.

pub mod export;
pub mod inspect;
pub mod maintenance;
pub mod record;

use apptxn_core::{CoreResult, TransactionRepository};
use apptxn_storage::StoreConfig;
use std::path::Path;

/// Opens a store that must already exist.
pub fn open_existing(path: &Path) -> CoreResult<TransactionRepository> {
    TransactionRepository::open(path, &StoreConfig::default().create_if_missing(false))
}
