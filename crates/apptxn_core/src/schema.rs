//! Table layout and schema bootstrap.

use crate::error::{CoreError, CoreResult};
use apptxn_storage::LocalStore;

/// Transaction table.
pub const TBL_TXN: &str = "app_transaction";
/// Transaction id (generated primary key).
pub const COL_TXN_ID: &str = "id";
/// Transaction guid.
pub const COL_TXN_GUID: &str = "guid";
/// Transaction use case.
pub const COL_TXN_USECASE: &str = "usecase";
/// Device make.
pub const COL_TXN_DEVICE_MAKE: &str = "device_make";
/// Device OS.
pub const COL_TXN_DEVICE_OS: &str = "device_os";
/// Device OS version.
pub const COL_TXN_DEVICE_OS_VERSION: &str = "device_os_version";

/// Transaction log table.
pub const TBL_TXN_LOG: &str = "transaction_log";
/// Log id (generated primary key).
pub const COL_TXNLOG_ID: &str = "id";
/// Owning transaction id.
pub const COL_TXNLOG_PARENT_TXN_ID: &str = "parent_transaction_id";
/// Persist-time timestamp (epoch milliseconds).
pub const COL_TXNLOG_TIMESTAMP: &str = "timestamp";
/// Use-case event.
pub const COL_TXNLOG_USECASE_EVENT: &str = "usecase_event";
/// In-context error code.
pub const COL_TXNLOG_IN_CTX_ERR_CODE: &str = "in_context_err_code";
/// In-context error description.
pub const COL_TXNLOG_IN_CTX_ERR_DESC: &str = "in_context_err_description";

/// Schema version written to `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

/// DDL of the transaction table.
pub fn transaction_ddl() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {TBL_TXN} (
            {COL_TXN_ID} INTEGER PRIMARY KEY AUTOINCREMENT,
            {COL_TXN_GUID} TEXT NOT NULL UNIQUE,
            {COL_TXN_USECASE} INTEGER NOT NULL,
            {COL_TXN_DEVICE_MAKE} TEXT NOT NULL,
            {COL_TXN_DEVICE_OS} TEXT NOT NULL,
            {COL_TXN_DEVICE_OS_VERSION} TEXT NOT NULL
        )"
    )
}

/// DDL of the transaction log table and its parent index.
pub fn transaction_log_ddl() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {TBL_TXN_LOG} (
            {COL_TXNLOG_ID} INTEGER PRIMARY KEY AUTOINCREMENT,
            {COL_TXNLOG_PARENT_TXN_ID} INTEGER NOT NULL REFERENCES {TBL_TXN}({COL_TXN_ID}),
            {COL_TXNLOG_TIMESTAMP} INTEGER NOT NULL,
            {COL_TXNLOG_USECASE_EVENT} INTEGER NOT NULL,
            {COL_TXNLOG_IN_CTX_ERR_CODE} INTEGER,
            {COL_TXNLOG_IN_CTX_ERR_DESC} TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_{TBL_TXN_LOG}_parent
        ON {TBL_TXN_LOG} ({COL_TXNLOG_PARENT_TXN_ID}, {COL_TXNLOG_TIMESTAMP})"
    )
}

/// Creates both tables if needed and stamps the schema version.
///
/// Fails with [`CoreError::UnsupportedSchema`] if the data file was written
/// by a newer schema.
pub fn ensure(store: &LocalStore) -> CoreResult<()> {
    store.in_transaction(|s| {
        let found = s
            .query_one("PRAGMA user_version", &[], |row| row.get::<_, i64>(0))?
            .unwrap_or(0);
        if found > SCHEMA_VERSION {
            return Err(CoreError::UnsupportedSchema {
                found,
                supported: SCHEMA_VERSION,
            });
        }

        s.execute_batch(&transaction_ddl())?;
        s.execute_batch(&transaction_log_ddl())?;
        if found < SCHEMA_VERSION {
            s.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION}"))?;
            tracing::debug!(from = found, to = SCHEMA_VERSION, "schema initialized");
        }
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(store: &LocalStore) -> Vec<String> {
        store
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                &[],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn ensure_creates_tables() {
        let store = LocalStore::open_in_memory().unwrap();
        ensure(&store).unwrap();
        assert_eq!(table_names(&store), vec![TBL_TXN.to_string(), TBL_TXN_LOG.to_string()]);
    }

    #[test]
    fn ensure_is_idempotent() {
        let store = LocalStore::open_in_memory().unwrap();
        ensure(&store).unwrap();
        ensure(&store).unwrap();
        let version = store
            .query("PRAGMA user_version", &[], |row| row.get::<_, i64>(0))
            .unwrap();
        assert_eq!(version, vec![SCHEMA_VERSION]);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let store = LocalStore::open_in_memory().unwrap();
        store.update("PRAGMA user_version = 99").unwrap();
        assert!(matches!(
            ensure(&store),
            Err(CoreError::UnsupportedSchema { found: 99, .. })
        ));
    }

    #[test]
    fn ddl_mentions_every_column() {
        let ddl = transaction_ddl();
        for col in [
            COL_TXN_GUID,
            COL_TXN_USECASE,
            COL_TXN_DEVICE_MAKE,
            COL_TXN_DEVICE_OS,
            COL_TXN_DEVICE_OS_VERSION,
        ] {
            assert!(ddl.contains(col));
        }
        let ddl = transaction_log_ddl();
        for col in [
            COL_TXNLOG_PARENT_TXN_ID,
            COL_TXNLOG_TIMESTAMP,
            COL_TXNLOG_USECASE_EVENT,
            COL_TXNLOG_IN_CTX_ERR_CODE,
            COL_TXNLOG_IN_CTX_ERR_DESC,
        ] {
            assert!(ddl.contains(col));
        }
    }
}
