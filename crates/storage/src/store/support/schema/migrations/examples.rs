#![forbid(unsafe_code)]

use super::super::super::super::StoreError;
use super::util::ensure_column;
use rusqlite::Connection;

pub(super) fn apply(conn: &Connection) -> Result<(), StoreError> {
    // Bodies written before this column existed are raw.
    ensure_column(
        conn,
        "item_api_example",
        "body_codec",
        "INTEGER NOT NULL DEFAULT 0",
    )?;
    Ok(())
}
