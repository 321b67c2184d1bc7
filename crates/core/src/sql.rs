#![forbid(unsafe_code)]

//! SQLite column mappings. Identifiers are stored as 16-byte BLOBs, codecs as
//! their integer tag.

use crate::codec::Codec;
use crate::ids::Id;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

impl ToSql for Id {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Borrowed(ValueRef::Blob(self.as_bytes())))
    }
}

impl FromSql for Id {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let bytes = value.as_blob()?;
        Id::from_bytes(bytes).map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}

impl ToSql for Codec {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_i64()))
    }
}

impl FromSql for Codec {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let tag = value.as_i64()?;
        Codec::from_i64(tag).map_err(|err| FromSqlError::Other(Box::new(err)))
    }
}
