#![forbid(unsafe_code)]

use super::super::super::super::StoreError;
use rusqlite::Connection;
use std::collections::HashSet;

fn columns(conn: &Connection, table: &str) -> Result<HashSet<String>, StoreError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    Ok(names.collect::<Result<_, _>>()?)
}

/// Adds `column` to `table` unless it is already declared. Returns whether
/// the column was added, so reruns are no-ops.
pub(super) fn ensure_column(
    conn: &Connection,
    table: &str,
    column: &str,
    decl: &str,
) -> Result<bool, StoreError> {
    if columns(conn, table)?.contains(column) {
        return Ok(false);
    }
    conn.execute_batch(&format!("ALTER TABLE {table} ADD COLUMN {column} {decl};"))?;
    tracing::debug!(table, column, "migration added column");
    Ok(true)
}
