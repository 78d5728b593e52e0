//! Export command implementation.

use apptxn_sync_protocol::TransactionPayload;
use std::io::Write;
use std::path::Path;

/// Writes the flush payload of every stored transaction as one JSON line.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let repo = super::open_existing(path)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for txn in repo.all_transactions()? {
        serde_json::to_writer(&mut out, &TransactionPayload::from(&txn))?;
        writeln!(out)?;
    }
    Ok(())
}
