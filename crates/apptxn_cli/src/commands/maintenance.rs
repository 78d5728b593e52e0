//! Delete and purge commands.

use std::path::Path;
use tracing::info;

/// Deletes the transaction with `guid` and its logs.
pub fn delete(path: &Path, guid: &str) -> Result<(), Box<dyn std::error::Error>> {
    let repo = super::open_existing(path)?;
    let txn = repo
        .find_by_guid(guid)?
        .ok_or_else(|| format!("No transaction with guid {guid}"))?;
    repo.delete_transaction(&txn)?;
    info!(guid, "transaction deleted");
    Ok(())
}

/// Deletes every transaction and log.
pub fn purge(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let repo = super::open_existing(path)?;
    let removed = repo.delete_all()?;
    info!(removed, "store purged");
    println!("Removed {removed} transaction(s)");
    Ok(())
}
