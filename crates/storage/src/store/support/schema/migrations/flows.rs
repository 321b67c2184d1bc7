#![forbid(unsafe_code)]

use super::super::super::super::StoreError;
use super::util::ensure_column;
use rusqlite::Connection;

pub(super) fn apply(conn: &Connection) -> Result<(), StoreError> {
    ensure_column(conn, "flow", "node_id_mapping", "BLOB")?;
    Ok(())
}
