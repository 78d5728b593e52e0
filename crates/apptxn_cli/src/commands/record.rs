//! Create and log commands.

use apptxn_core::{DeviceInfo, LogEvent, TransactionRepository};
use apptxn_storage::StoreConfig;
use std::path::Path;
use tracing::info;

/// Creates a transaction, creating the store if needed.
pub fn create(
    path: &Path,
    usecase: i64,
    guid: Option<String>,
    make: &str,
    os: &str,
    os_version: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let repo = TransactionRepository::open(path, &StoreConfig::default())?;
    let device = DeviceInfo::new(make, os, os_version);
    let txn = match guid {
        Some(guid) => repo.create_transaction_with_guid(guid, usecase, &device)?,
        None => repo.create_transaction(usecase, &device)?,
    };
    info!(local_id = %txn.local_id(), guid = txn.guid(), "transaction created");
    println!("{}", txn.guid());
    Ok(())
}

/// Logs an event against the transaction with `guid`.
pub fn log(
    path: &Path,
    guid: &str,
    event: i64,
    error: Option<(i64, String)>,
) -> Result<(), Box<dyn std::error::Error>> {
    let repo = super::open_existing(path)?;
    let txn = repo
        .find_by_guid(guid)?
        .ok_or_else(|| format!("No transaction with guid {guid}"))?;
    let event = match error {
        Some((code, desc)) => LogEvent::error(event, code, desc),
        None => LogEvent::new(event),
    };
    let log = repo.log_event(&txn, event)?;
    println!("{}", log.timestamp().as_millis());
    Ok(())
}
