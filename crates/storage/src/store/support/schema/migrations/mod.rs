#![forbid(unsafe_code)]

mod examples;
mod flows;
mod util;

use super::super::super::StoreError;
use rusqlite::Connection;

pub(super) fn apply(conn: &Connection) -> Result<(), StoreError> {
    examples::apply(conn)?;
    flows::apply(conn)?;
    Ok(())
}
