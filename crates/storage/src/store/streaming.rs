#![forbid(unsafe_code)]

//! Read modes for sync consumers: a pageable snapshot, an incremental window,
//! and per-table change counts. All three read rows that carry
//! `workspace_id` and `updated_at`.

use super::db::bound_service;
use super::support::to_sqlite_i64;
use super::{Db, StoreError};
use rusqlite::{Row, params_from_iter, types::Value};
use serde::Serialize;
use std::collections::BTreeMap;
use wb_core::Id;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamTable {
    Collections,
    Folders,
    Endpoints,
    Examples,
    Flows,
}

impl StreamTable {
    pub const ALL: [StreamTable; 5] = [
        StreamTable::Collections,
        StreamTable::Folders,
        StreamTable::Endpoints,
        StreamTable::Examples,
        StreamTable::Flows,
    ];

    pub fn table_name(self) -> &'static str {
        match self {
            Self::Collections => "collections",
            Self::Folders => "item_folder",
            Self::Endpoints => "item_api",
            Self::Examples => "item_api_example",
            Self::Flows => "flow",
        }
    }

    fn tag(self) -> i64 {
        match self {
            Self::Collections => 0,
            Self::Folders => 1,
            Self::Endpoints => 2,
            Self::Examples => 3,
            Self::Flows => 4,
        }
    }

    fn from_tag(tag: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|table| table.tag() == tag)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StreamRow {
    pub table: StreamTable,
    pub id: Id,
    pub name: String,
    pub updated_at: i64,
}

/// Resume point of a snapshot. Rows newer than `as_of_time` are left to the
/// incremental reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SnapshotCursor {
    pub as_of_time: i64,
    pub last_updated_at: i64,
    pub last_id: Id,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SnapshotPage {
    pub rows: Vec<StreamRow>,
    /// `None` once the snapshot is exhausted.
    pub next: Option<SnapshotCursor>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StreamMetrics {
    pub since_time: i64,
    pub counts: BTreeMap<StreamTable, u64>,
}

impl StreamMetrics {
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

#[derive(Clone, Debug)]
pub struct StreamStore<'a> {
    db: Db<'a>,
}

bound_service!(StreamStore);

impl StreamStore<'_> {
    /// First page of rows with `updated_at <= as_of_time`, newest first.
    pub fn snapshot_page(
        &self,
        workspace_id: Id,
        as_of_time: i64,
        limit: usize,
    ) -> Result<SnapshotPage, StoreError> {
        self.page(workspace_id, as_of_time, None, limit)
    }

    pub fn next_page(
        &self,
        workspace_id: Id,
        cursor: &SnapshotCursor,
        limit: usize,
    ) -> Result<SnapshotPage, StoreError> {
        self.page(workspace_id, cursor.as_of_time, Some(cursor), limit)
    }

    /// Rows modified in `(since_time, upto_time]`, oldest first.
    pub fn incremental(
        &self,
        workspace_id: Id,
        since_time: i64,
        upto_time: i64,
    ) -> Result<Vec<StreamRow>, StoreError> {
        if since_time > upto_time {
            return Err(StoreError::InvalidArgument("since_time is after upto_time"));
        }
        let sql = format!(
            "SELECT tag, id, name, updated_at FROM ({}) \
             WHERE workspace_id = ?1 AND updated_at > ?2 AND updated_at <= ?3 \
             ORDER BY updated_at ASC, id ASC",
            union_sql()
        );
        let params = vec![
            Value::Blob(workspace_id.as_bytes().to_vec()),
            Value::Integer(since_time),
            Value::Integer(upto_time),
        ];
        self.query_rows(&sql, params)
    }

    /// Rows per table modified after `since_time`.
    pub fn metrics(&self, workspace_id: Id, since_time: i64) -> Result<StreamMetrics, StoreError> {
        let conn = self.db.reader()?;
        let mut metrics = StreamMetrics {
            since_time,
            counts: BTreeMap::new(),
        };
        for table in StreamTable::ALL {
            let sql = format!(
                "SELECT COUNT(*) FROM {} WHERE workspace_id = ?1 AND updated_at > ?2",
                table.table_name()
            );
            let count: i64 = conn.query_row(
                &sql,
                rusqlite::params![workspace_id, since_time],
                |row| row.get(0),
            )?;
            metrics.counts.insert(table, count.max(0) as u64);
        }
        Ok(metrics)
    }

    fn page(
        &self,
        workspace_id: Id,
        as_of_time: i64,
        after: Option<&SnapshotCursor>,
        limit: usize,
    ) -> Result<SnapshotPage, StoreError> {
        if limit == 0 {
            return Err(StoreError::InvalidArgument("limit must be positive"));
        }
        let mut params = vec![
            Value::Blob(workspace_id.as_bytes().to_vec()),
            Value::Integer(as_of_time),
        ];
        let mut resume = String::new();
        if let Some(cursor) = after {
            params.push(Value::Integer(cursor.last_updated_at));
            params.push(Value::Blob(cursor.last_id.as_bytes().to_vec()));
            resume.push_str(" AND (updated_at, id) < (?3, ?4)");
        }
        // One extra row tells whether another page exists.
        params.push(Value::Integer(to_sqlite_i64(limit)? + 1));
        let sql = format!(
            "SELECT tag, id, name, updated_at FROM ({}) \
             WHERE workspace_id = ?1 AND updated_at <= ?2{resume} \
             ORDER BY updated_at DESC, id DESC LIMIT ?{}",
            union_sql(),
            params.len()
        );
        let mut rows = self.query_rows(&sql, params)?;
        let more = rows.len() > limit;
        rows.truncate(limit);
        let next = match rows.last() {
            Some(last) if more => Some(SnapshotCursor {
                as_of_time,
                last_updated_at: last.updated_at,
                last_id: last.id,
            }),
            _ => None,
        };
        Ok(SnapshotPage { rows, next })
    }

    fn query_rows(&self, sql: &str, params: Vec<Value>) -> Result<Vec<StreamRow>, StoreError> {
        let conn = self.db.reader()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(params), read_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }
}

fn union_sql() -> String {
    StreamTable::ALL
        .iter()
        .map(|table| {
            format!(
                "SELECT {} AS tag, id, workspace_id, name, updated_at FROM {}",
                table.tag(),
                table.table_name()
            )
        })
        .collect::<Vec<_>>()
        .join(" UNION ALL ")
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<StreamRow> {
    let tag: i64 = row.get(0)?;
    let table =
        StreamTable::from_tag(tag).ok_or(rusqlite::Error::IntegralValueOutOfRange(0, tag))?;
    Ok(StreamRow {
        table,
        id: row.get(1)?,
        name: row.get(2)?,
        updated_at: row.get(3)?,
    })
}
