//! Data-access primitives over a held connection.

use crate::error::{StoreError, StoreResult};
use rusqlite::types::FromSql;
use rusqlite::{Connection, OptionalExtension, Row, ToSql};

/// Generated row id returned by inserts.
pub type RowId = i64;

/// A borrowed view of the store's connection while the execution queue is held.
///
/// A `Session` is only handed out by [`crate::LocalStore::run`] and
/// [`crate::LocalStore::in_transaction`], so every statement issued through it
/// is serialized with every other statement on the same store.
pub struct Session<'c> {
    conn: &'c Connection,
}

impl<'c> Session<'c> {
    pub(crate) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Executes an insert and returns the generated row id.
    pub fn insert(&self, stmt: &str, args: &[&dyn ToSql]) -> StoreResult<RowId> {
        tracing::trace!(sql = stmt, "insert");
        self.conn.execute(stmt, args)?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Executes an insert and hands the generated id to `assign` so it can be
    /// stored on `entity`.
    ///
    /// `assign` runs only if the insert succeeded.
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
        let id = self.insert(stmt, args)?;
        assign(entity, id);
        Ok(id)
    }

    /// Executes a statement without bound arguments and returns the number of
    /// affected rows.
    pub fn update(&self, stmt: &str) -> StoreResult<usize> {
        self.update_with(stmt, &[])
    }

    /// Executes a statement with bound arguments and returns the number of
    /// affected rows.
    pub fn update_with(&self, stmt: &str, args: &[&dyn ToSql]) -> StoreResult<usize> {
        tracing::trace!(sql = stmt, "update");
        Ok(self.conn.execute(stmt, args)?)
    }

    /// Executes several `;`-separated statements without arguments (DDL).
    pub fn execute_batch(&self, sql: &str) -> StoreResult<()> {
        Ok(self.conn.execute_batch(sql)?)
    }

    /// Runs a query and maps every row with `mapper`.
    pub fn query<T, F>(&self, stmt: &str, args: &[&dyn ToSql], mut mapper: F) -> StoreResult<Vec<T>>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        tracing::trace!(sql = stmt, "query");
        let mut prepared = self.conn.prepare(stmt)?;
        let rows = prepared.query_map(args, |row| mapper(row))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Runs a query expected to return at most one row.
    pub fn query_one<T, F>(&self, stmt: &str, args: &[&dyn ToSql], mapper: F) -> StoreResult<Option<T>>
    where
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        tracing::trace!(sql = stmt, "query one");
        Ok(self.conn.query_row(stmt, args, mapper).optional()?)
    }

    /// Deletes rows from `table` matching every `column = value` pair.
    ///
    /// An empty `where_columns` deletes every row of the table. Returns the
    /// number of deleted rows.
    pub fn delete_from(
        &self,
        table: &str,
        where_columns: &[&str],
        where_values: &[&dyn ToSql],
    ) -> StoreResult<usize> {
        if where_columns.len() != where_values.len() {
            return Err(StoreError::ArgumentMismatch {
                columns: where_columns.len(),
                values: where_values.len(),
            });
        }
        check_identifier(table)?;
        for column in where_columns {
            check_identifier(column)?;
        }

        let mut stmt = format!("DELETE FROM {table}");
        if !where_columns.is_empty() {
            let clauses: Vec<String> = where_columns
                .iter()
                .enumerate()
                .map(|(i, column)| format!("{column} = ?{}", i + 1))
                .collect();
            stmt.push_str(" WHERE ");
            stmt.push_str(&clauses.join(" AND "));
        }

        self.update_with(&stmt, where_values)
    }

    /// Reads one integer column from the first row where
    /// `where_column = where_value`.
    ///
    /// Returns `None` if no row matched or the column is NULL.
    pub fn number_from(
        &self,
        table: &str,
        select_column: &str,
        where_column: &str,
        where_value: &dyn ToSql,
    ) -> StoreResult<Option<i64>> {
        self.value_from(table, select_column, where_column, where_value)
    }

    /// Reads one typed column from the first row where
    /// `where_column = where_value`.
    ///
    /// Returns `None` if no row matched or the column is NULL.
    pub fn value_from<T: FromSql>(
        &self,
        table: &str,
        select_column: &str,
        where_column: &str,
        where_value: &dyn ToSql,
    ) -> StoreResult<Option<T>> {
        check_identifier(table)?;
        check_identifier(select_column)?;
        check_identifier(where_column)?;

        let stmt = format!("SELECT {select_column} FROM {table} WHERE {where_column} = ?1 LIMIT 1");
        let value = self.query_one(&stmt, &[where_value], |row| row.get::<_, Option<T>>(0))?;
        Ok(value.flatten())
    }
}

/// Rejects anything but `[A-Za-z_][A-Za-z0-9_]*`, since table and column
/// names are spliced into SQL text.
fn check_identifier(name: &str) -> StoreResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidIdentifier(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert!(check_identifier("transaction_log").is_ok());
        assert!(check_identifier("_x1").is_ok());
        assert!(check_identifier("").is_err());
        assert!(check_identifier("1abc").is_err());
        assert!(check_identifier("t; DROP TABLE t").is_err());
        assert!(check_identifier("a.b").is_err());
    }
}
