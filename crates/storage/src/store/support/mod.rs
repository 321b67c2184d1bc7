#![forbid(unsafe_code)]

mod schema;

pub(super) use schema::migrate_sqlite_schema;

use super::StoreError;

pub(crate) fn to_sqlite_i64(value: usize) -> Result<i64, StoreError> {
    i64::try_from(value).map_err(|_| StoreError::InvalidArgument("numeric overflow"))
}

pub(crate) fn bool_to_i64(value: bool) -> i64 {
    if value { 1 } else { 0 }
}

pub(crate) fn require_name(name: &str) -> Result<String, StoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidArgument("name must not be empty"));
    }
    Ok(trimmed.to_string())
}
