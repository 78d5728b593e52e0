//! Persistence of transactions and their logs.

use crate::error::{CoreError, CoreResult};
use crate::model::{DeviceInfo, LocalId, LogEvent, LogId, Timestamp, Transaction, TransactionLog};
use crate::schema::{self, *};
use apptxn_storage::{LocalStore, Row, RowResult, StoreConfig};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Number of rows in each table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounts {
    /// Transactions stored locally.
    pub transactions: u64,
    /// Transaction logs stored locally.
    pub logs: u64,
}

/// What [`TransactionRepository::delete_sent`] removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentDeletion {
    /// The sent logs and the transaction row are gone.
    Removed,
    /// The sent logs are gone; logs written after the snapshot keep the
    /// transaction stored.
    LogsRemain,
    /// The transaction had already been deleted.
    AlreadyGone,
}

/// Creates, persists, fetches and deletes transactions and their logs.
///
/// Every write is persisted before the call returns; nothing is buffered in
/// memory. Reads return snapshots.
///
/// # Deletion atomicity
///
/// A transaction and its logs are always deleted together inside one store
/// transaction, so an interrupted delete never leaves orphaned logs. Deleting
/// a *set* of transactions is atomic per transaction, not for the whole set.
pub struct TransactionRepository {
    store: Arc<LocalStore>,
}

impl TransactionRepository {
    /// Wraps an open store, creating the schema if needed.
    pub fn new(store: Arc<LocalStore>) -> CoreResult<Self> {
        schema::ensure(&store)?;
        Ok(Self { store })
    }

    /// Opens a file-backed repository.
    pub fn open(path: impl AsRef<Path>, config: &StoreConfig) -> CoreResult<Self> {
        let store = LocalStore::open(path, config)?;
        Self::new(Arc::new(store))
    }

    /// Opens an in-memory repository.
    pub fn open_in_memory() -> CoreResult<Self> {
        let store = LocalStore::open_in_memory()?;
        Self::new(Arc::new(store))
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    /// Creates and persists a transaction with a freshly generated guid.
    pub fn create_transaction(&self, usecase: i64, device: &DeviceInfo) -> CoreResult<Transaction> {
        self.create_transaction_with_guid(Uuid::new_v4().to_string(), usecase, device)
    }

    /// Creates and persists a transaction with a caller-supplied guid.
    ///
    /// Returns only once the store has assigned the local id. Fails if the
    /// guid is blank or already present.
    pub fn create_transaction_with_guid(
        &self,
        guid: impl Into<String>,
        usecase: i64,
        device: &DeviceInfo,
    ) -> CoreResult<Transaction> {
        let guid = guid.into();
        if guid.trim().is_empty() {
            return Err(CoreError::invalid_argument("transaction guid must not be blank"));
        }

        let mut txn = Transaction {
            local_id: LocalId::new(0),
            guid: guid.clone(),
            usecase,
            device: device.clone(),
            logs: Vec::new(),
        };

        let stmt = format!(
            "INSERT INTO {TBL_TXN} ({COL_TXN_GUID}, {COL_TXN_USECASE}, {COL_TXN_DEVICE_MAKE}, \
             {COL_TXN_DEVICE_OS}, {COL_TXN_DEVICE_OS_VERSION}) VALUES (?1, ?2, ?3, ?4, ?5)"
        );
        self.store.insert_entity(
            &stmt,
            &[&guid, &usecase, &device.make, &device.os, &device.os_version],
            &mut txn,
            |t, id| t.local_id = LocalId::new(id),
        )?;

        tracing::debug!(local_id = %txn.local_id, guid = %txn.guid, usecase, "transaction created");
        Ok(txn)
    }

    /// Persists a log row for `txn`.
    ///
    /// The timestamp is taken while the store queue is held and is never
    /// earlier than the latest timestamp already stored for `txn`, so stored
    /// order and timestamp order agree even under concurrent callers.
    pub fn log_event(&self, txn: &Transaction, event: LogEvent) -> CoreResult<TransactionLog> {
        let parent = txn.local_id;
        let result = self.store.run(|s| -> CoreResult<TransactionLog> {
            let last: Option<i64> = s
                .query_one(
                    &format!(
                        "SELECT MAX({COL_TXNLOG_TIMESTAMP}) FROM {TBL_TXN_LOG} \
                         WHERE {COL_TXNLOG_PARENT_TXN_ID} = ?1"
                    ),
                    &[&parent.as_i64()],
                    |row| row.get::<_, Option<i64>>(0),
                )?
                .flatten();
            let now = Timestamp::now();
            let timestamp = match last {
                Some(last) if last > now.as_millis() => Timestamp::from_millis(last),
                _ => now,
            };

            let id = s.insert(
                &format!(
                    "INSERT INTO {TBL_TXN_LOG} ({COL_TXNLOG_PARENT_TXN_ID}, {COL_TXNLOG_TIMESTAMP}, \
                     {COL_TXNLOG_USECASE_EVENT}, {COL_TXNLOG_IN_CTX_ERR_CODE}, {COL_TXNLOG_IN_CTX_ERR_DESC}) \
                     VALUES (?1, ?2, ?3, ?4, ?5)"
                ),
                &[
                    &parent.as_i64(),
                    &timestamp.as_millis(),
                    &event.usecase_event,
                    &event.err_code,
                    &event.err_description,
                ],
            )?;

            Ok(TransactionLog {
                id: LogId::new(id),
                parent_transaction_id: parent,
                timestamp,
                usecase_event: event.usecase_event,
                in_context_err_code: event.err_code,
                in_context_err_description: event.err_description.clone(),
            })
        });

        match result {
            Ok(log) => {
                tracing::debug!(
                    local_id = %parent,
                    usecase_event = log.usecase_event,
                    error = log.is_error(),
                    "event logged"
                );
                Ok(log)
            }
            Err(CoreError::Store(err)) if err.is_constraint_violation() => {
                Err(CoreError::UnknownTransaction(parent))
            }
            Err(err) => Err(err),
        }
    }

    /// Fetches every stored transaction with its logs, ordered by local id.
    pub fn all_transactions(&self) -> CoreResult<Vec<Transaction>> {
        let stmt = format!("{} ORDER BY t.{COL_TXN_ID}, l.{COL_TXNLOG_TIMESTAMP}, l.{COL_TXNLOG_ID}", joined_select());
        let rows = self.store.query(&stmt, &[], map_joined_row)?;
        Ok(fold_rows(rows))
    }

    /// Fetches one transaction with its logs.
    pub fn transaction(&self, local_id: LocalId) -> CoreResult<Option<Transaction>> {
        let stmt = format!(
            "{} WHERE t.{COL_TXN_ID} = ?1 ORDER BY l.{COL_TXNLOG_TIMESTAMP}, l.{COL_TXNLOG_ID}",
            joined_select()
        );
        let rows = self.store.query(&stmt, &[&local_id.as_i64()], map_joined_row)?;
        Ok(fold_rows(rows).into_iter().next())
    }

    /// Fetches one transaction by its guid.
    pub fn find_by_guid(&self, guid: &str) -> CoreResult<Option<Transaction>> {
        match self.store.number_from(TBL_TXN, COL_TXN_ID, COL_TXN_GUID, &guid)? {
            Some(id) => self.transaction(LocalId::new(id)),
            None => Ok(None),
        }
    }

    /// Returns the guid stored for `local_id`.
    pub fn guid_for(&self, local_id: LocalId) -> CoreResult<Option<String>> {
        Ok(self
            .store
            .value_from(TBL_TXN, COL_TXN_GUID, COL_TXN_ID, &local_id.as_i64())?)
    }

    /// Deletes every transaction and every log. Returns the number of
    /// transactions removed.
    pub fn delete_all(&self) -> CoreResult<usize> {
        let removed = self.store.in_transaction(|s| {
            s.delete_from(TBL_TXN_LOG, &[], &[])?;
            s.delete_from(TBL_TXN, &[], &[])
        })?;
        tracing::debug!(removed, "all transactions deleted");
        Ok(removed)
    }

    /// Deletes `txn` and all of its logs atomically. Returns false if the
    /// transaction was already gone.
    pub fn delete_transaction(&self, txn: &Transaction) -> CoreResult<bool> {
        let id = txn.local_id.as_i64();
        let removed = self.store.in_transaction(|s| {
            s.delete_from(TBL_TXN_LOG, &[COL_TXNLOG_PARENT_TXN_ID], &[&id])?;
            s.delete_from(TBL_TXN, &[COL_TXN_ID], &[&id])
        })?;
        tracing::debug!(local_id = id, guid = %txn.guid, removed, "transaction deleted");
        Ok(removed > 0)
    }

    /// Deletes what was sent for the snapshot `txn`.
    ///
    /// Only the logs present in `txn` are deleted. The transaction row goes
    /// too unless logs written after the snapshot remain, in which case the
    /// transaction stays stored so they are sent later.
    pub fn delete_sent(&self, txn: &Transaction) -> CoreResult<SentDeletion> {
        let id = txn.local_id.as_i64();
        let outcome = self.store.in_transaction(|s| -> CoreResult<SentDeletion> {
            for log in &txn.logs {
                s.delete_from(
                    TBL_TXN_LOG,
                    &[COL_TXNLOG_ID, COL_TXNLOG_PARENT_TXN_ID],
                    &[&log.id.as_i64(), &id],
                )?;
            }
            if s
                .number_from(TBL_TXN_LOG, COL_TXNLOG_ID, COL_TXNLOG_PARENT_TXN_ID, &id)?
                .is_some()
            {
                return Ok(SentDeletion::LogsRemain);
            }
            Ok(match s.delete_from(TBL_TXN, &[COL_TXN_ID], &[&id])? {
                0 => SentDeletion::AlreadyGone,
                _ => SentDeletion::Removed,
            })
        })?;
        tracing::debug!(
            local_id = id,
            guid = %txn.guid,
            sent_logs = txn.logs.len(),
            ?outcome,
            "sent snapshot deleted"
        );
        Ok(outcome)
    }

    /// Deletes each of `txns` with its logs. Returns how many existed.
    ///
    /// Each transaction is deleted atomically; if one delete fails, the
    /// transactions before it stay deleted and the error is returned.
    pub fn delete_transactions(&self, txns: &[Transaction]) -> CoreResult<usize> {
        let mut removed = 0;
        for txn in txns {
            if self.delete_transaction(txn)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Returns the number of stored transactions and logs.
    pub fn counts(&self) -> CoreResult<StoreCounts> {
        let stmt = format!("SELECT (SELECT COUNT(*) FROM {TBL_TXN}), (SELECT COUNT(*) FROM {TBL_TXN_LOG})");
        let counts = self
            .store
            .run(|s| s.query_one(&stmt, &[], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))))?
            .unwrap_or((0, 0));
        Ok(StoreCounts {
            transactions: u64::try_from(counts.0).unwrap_or(0),
            logs: u64::try_from(counts.1).unwrap_or(0),
        })
    }
}

impl std::fmt::Debug for TransactionRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionRepository")
            .field("store", &self.store)
            .finish()
    }
}

/// One row of the transaction/log join.
struct JoinedRow {
    txn: Transaction,
    log: Option<TransactionLog>,
}

fn joined_select() -> String {
    format!(
        "SELECT t.{COL_TXN_ID}, t.{COL_TXN_GUID}, t.{COL_TXN_USECASE}, t.{COL_TXN_DEVICE_MAKE}, \
         t.{COL_TXN_DEVICE_OS}, t.{COL_TXN_DEVICE_OS_VERSION}, \
         l.{COL_TXNLOG_ID}, l.{COL_TXNLOG_TIMESTAMP}, l.{COL_TXNLOG_USECASE_EVENT}, \
         l.{COL_TXNLOG_IN_CTX_ERR_CODE}, l.{COL_TXNLOG_IN_CTX_ERR_DESC} \
         FROM {TBL_TXN} t LEFT JOIN {TBL_TXN_LOG} l ON l.{COL_TXNLOG_PARENT_TXN_ID} = t.{COL_TXN_ID}"
    )
}

fn map_joined_row(row: &Row<'_>) -> RowResult<JoinedRow> {
    let local_id = LocalId::new(row.get(0)?);
    let txn = Transaction {
        local_id,
        guid: row.get(1)?,
        usecase: row.get(2)?,
        device: DeviceInfo {
            make: row.get(3)?,
            os: row.get(4)?,
            os_version: row.get(5)?,
        },
        logs: Vec::new(),
    };

    let log = match row.get::<_, Option<i64>>(6)? {
        Some(log_id) => Some(TransactionLog {
            id: LogId::new(log_id),
            parent_transaction_id: local_id,
            timestamp: Timestamp::from_millis(row.get(7)?),
            usecase_event: row.get(8)?,
            in_context_err_code: row.get(9)?,
            in_context_err_description: row.get(10)?,
        }),
        None => None,
    };

    Ok(JoinedRow { txn, log })
}

/// Groups consecutive join rows of the same transaction.
fn fold_rows(rows: Vec<JoinedRow>) -> Vec<Transaction> {
    let mut out: Vec<Transaction> = Vec::new();
    for JoinedRow { txn, log } in rows {
        let same = out.last().is_some_and(|last| last.local_id == txn.local_id);
        if !same {
            out.push(txn);
        }
        if let (Some(log), Some(current)) = (log, out.last_mut()) {
            current.logs.push(log);
        }
    }
    out
}
