//! The serialized local store.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::session::{RowId, Session};
use parking_lot::Mutex;
use rusqlite::types::FromSql;
use rusqlite::{Connection, Row, ToSql, TransactionBehavior};
use std::path::{Path, PathBuf};

/// A SQLite-backed store with a single serialized connection.
///
/// # Invariants
///
/// - All statements go through one `Mutex<Connection>`; two statements never
///   execute concurrently against the connection
/// - A sequence of statements issued via [`LocalStore::run`] is *not* atomic
/// - [`LocalStore::in_transaction`] commits only if the closure succeeds
pub struct LocalStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl LocalStore {
    /// Opens (or creates) a file-backed store.
    pub fn open(path: impl AsRef<Path>, config: &StoreConfig) -> StoreResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            if !config.create_if_missing {
                return Err(StoreError::NotFound(path.to_path_buf()));
            }
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(config.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let mode: String = conn.pragma_update_and_check(
            None,
            "journal_mode",
            config.journal_mode.as_str(),
            |row| row.get(0),
        )?;
        conn.pragma_update(None, "synchronous", config.synchronous.as_str())?;

        tracing::debug!(path = %path.display(), journal_mode = %mode, "opened local store");

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Opens a private in-memory store (for testing and ephemeral use).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Returns the data file path, or `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Runs `f` while holding the execution queue, without an enclosing
    /// transaction.
    pub fn run<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&Session<'_>) -> Result<R, E>,
        E: From<StoreError>,
    {
        let conn = self.conn.lock();
        f(&Session::new(&conn))
    }

    /// Runs `f` inside a single engine transaction.
    ///
    /// The transaction commits if `f` returns `Ok`, and is rolled back if `f`
    /// returns `Err` or the commit itself fails.
    pub fn in_transaction<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&Session<'_>) -> Result<R, E>,
        E: From<StoreError>,
    {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| E::from(StoreError::from(e)))?;

        // Dropping `tx` without committing rolls it back.
        let value = f(&Session::new(&tx))?;
        tx.commit().map_err(|e| E::from(StoreError::from(e)))?;
        Ok(value)
    }

    /// One-shot [`Session::insert`].
    pub fn insert(&self, stmt: &str, args: &[&dyn ToSql]) -> StoreResult<RowId> {
        self.run(|s| s.insert(stmt, args))
    }

    /// One-shot [`Session::insert_entity`].
    pub fn insert_entity<E, F>(
        &self,
        stmt: &str,
        args: &[&dyn ToSql],
        entity: &mut E,
        assign: F,
    ) -> StoreResult<RowId>
    where
        F: FnOnce(&mut E, RowId),
    {
        self.run(|s| s.insert_entity(stmt, args, entity, assign))
    }

    /// One-shot [`Session::update`].
    pub fn update(&self, stmt: &str) -> StoreResult<usize> {
        self.run(|s| s.update(stmt))
    }

    /// One-shot [`Session::update_with`].
    pub fn update_with(&self, stmt: &str, args: &[&dyn ToSql]) -> StoreResult<usize> {
        self.run(|s| s.update_with(stmt, args))
    }

    /// One-shot [`Session::query`].
    pub fn query<T, F>(&self, stmt: &str, args: &[&dyn ToSql], mapper: F) -> StoreResult<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.run(|s| s.query(stmt, args, mapper))
    }

    /// One-shot [`Session::delete_from`].
    pub fn delete_from(
        &self,
        table: &str,
        where_columns: &[&str],
        where_values: &[&dyn ToSql],
    ) -> StoreResult<usize> {
        self.run(|s| s.delete_from(table, where_columns, where_values))
    }

    /// One-shot [`Session::number_from`].
    pub fn number_from(
        &self,
        table: &str,
        select_column: &str,
        where_column: &str,
        where_value: &dyn ToSql,
    ) -> StoreResult<Option<i64>> {
        self.run(|s| s.number_from(table, select_column, where_column, where_value))
    }

    /// One-shot [`Session::value_from`].
    pub fn value_from<T: FromSql>(
        &self,
        table: &str,
        select_column: &str,
        where_column: &str,
        where_value: &dyn ToSql,
    ) -> StoreResult<Option<T>> {
        self.run(|s| s.value_from(table, select_column, where_column, where_value))
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore").field("path", &self.path).finish()
    }
}
