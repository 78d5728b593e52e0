//! Inspect command implementation.

use crate::Format;
use apptxn_core::{Transaction, TransactionRepository};
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Store file size in bytes.
    pub file_size: u64,
    /// Number of transactions.
    pub transaction_count: u64,
    /// Number of log rows.
    pub log_count: u64,
    /// Per-transaction summaries.
    pub transactions: Vec<TransactionSummary>,
}

/// Summary of one stored transaction.
#[derive(Debug, Serialize)]
pub struct TransactionSummary {
    /// Local id.
    pub local_id: i64,
    /// Guid.
    pub guid: String,
    /// Use-case tag.
    pub usecase: i64,
    /// Device as `make / os os_version`.
    pub device: String,
    /// Number of logs.
    pub log_count: usize,
    /// Number of logs carrying error context.
    pub error_count: usize,
    /// First and last log timestamps, epoch milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<(i64, i64)>,
    /// Log entries (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<LogSummary>>,
}

/// One log entry.
#[derive(Debug, Serialize)]
pub struct LogSummary {
    /// Timestamp, epoch milliseconds.
    pub timestamp: i64,
    /// Use-case event tag.
    pub usecase_event: i64,
    /// Error code, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err_code: Option<i64>,
    /// Error description, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err_description: Option<String>,
}

impl TransactionSummary {
    fn new(txn: &Transaction, with_logs: bool) -> Self {
        let logs = txn.logs();
        let span = logs
            .first()
            .zip(logs.last())
            .map(|(first, last)| (first.timestamp().as_millis(), last.timestamp().as_millis()));
        Self {
            local_id: txn.local_id().as_i64(),
            guid: txn.guid().to_string(),
            usecase: txn.usecase(),
            device: format!(
                "{} / {} {}",
                txn.user_agent_device_make(),
                txn.user_agent_device_os(),
                txn.user_agent_device_os_version()
            ),
            log_count: logs.len(),
            error_count: logs.iter().filter(|l| l.is_error()).count(),
            span,
            logs: with_logs.then(|| {
                logs.iter()
                    .map(|l| LogSummary {
                        timestamp: l.timestamp().as_millis(),
                        usecase_event: l.usecase_event(),
                        err_code: l.in_context_err_code(),
                        err_description: l.in_context_err_description().map(str::to_string),
                    })
                    .collect()
            }),
        }
    }
}

/// Collects the inspection result for an open repository.
pub fn inspect(
    repo: &TransactionRepository,
    path: &Path,
    with_logs: bool,
) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let counts = repo.counts()?;
    let transactions = repo
        .all_transactions()?
        .iter()
        .map(|txn| TransactionSummary::new(txn, with_logs))
        .collect();

    Ok(InspectResult {
        path: path.display().to_string(),
        file_size: std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
        transaction_count: counts.transactions,
        log_count: counts.logs,
        transactions,
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, with_logs: bool, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No store found at {}", path.display()).into());
    }
    let repo = super::open_existing(path)?;
    let result = inspect(&repo, path, with_logs)?;

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Text => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Store: {}", result.path);
    println!("File size: {} bytes", result.file_size);
    println!("Transactions: {}", result.transaction_count);
    println!("Logs: {}", result.log_count);

    for txn in &result.transactions {
        println!();
        println!("#{} {} (usecase {})", txn.local_id, txn.guid, txn.usecase);
        println!("  device: {}", txn.device);
        println!("  logs: {} ({} with errors)", txn.log_count, txn.error_count);
        if let Some((first, last)) = txn.span {
            println!("  span: {first} .. {last} ({} ms)", last - first);
        }
        for log in txn.logs.iter().flatten() {
            match (&log.err_code, &log.err_description) {
                (Some(code), Some(desc)) => println!(
                    "    {} event {} error {code}: {desc}",
                    log.timestamp, log.usecase_event
                ),
                _ => println!("    {} event {}", log.timestamp, log.usecase_event),
            }
        }
    }
}
