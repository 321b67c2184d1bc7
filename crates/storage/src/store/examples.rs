#![forbid(unsafe_code)]

use super::db::bound_service;
use super::movable::{ENDPOINT_EXAMPLES, LinkedRepository};
use super::support::{bool_to_i64, require_name};
use super::{Db, StoreError};
use rusqlite::{OptionalExtension, Row, params};
use serde::Serialize;
use std::collections::HashMap;
use wb_core::movable::Scope;
use wb_core::time::now_ms;
use wb_core::{Codec, Id, codec};

/// A saved request of an endpoint. Delta examples override a parent example
/// and are kept out of the endpoint's ordered list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Example {
    pub id: Id,
    pub endpoint_id: Id,
    pub collection_id: Id,
    pub workspace_id: Id,
    pub parent_example_id: Option<Id>,
    pub is_default: bool,
    pub name: String,
    #[serde(skip)]
    pub body: Vec<u8>,
    pub body_codec: Codec,
    pub updated_at: i64,
}

impl Example {
    pub fn is_delta(&self) -> bool {
        self.parent_example_id.is_some()
    }

    pub fn body_bytes(&self) -> Result<Vec<u8>, StoreError> {
        Ok(codec::decompress(&self.body, self.body_codec)?)
    }
}

const EXAMPLE_COLUMNS: &str = "id, item_api_id, collection_id, workspace_id, parent_example_id, \
     is_default, name, body, body_codec, updated_at";

fn read_example(row: &Row<'_>) -> rusqlite::Result<Example> {
    Ok(Example {
        id: row.get(0)?,
        endpoint_id: row.get(1)?,
        collection_id: row.get(2)?,
        workspace_id: row.get(3)?,
        parent_example_id: row.get(4)?,
        is_default: row.get::<_, i64>(5)? != 0,
        name: row.get(6)?,
        body: row.get(7)?,
        body_codec: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

#[derive(Clone, Debug)]
pub struct ExampleStore<'a> {
    db: Db<'a>,
}

bound_service!(ExampleStore);

impl<'a> ExampleStore<'a> {
    pub fn ordering(&self) -> LinkedRepository<'a> {
        LinkedRepository::new(self.db.clone(), ENDPOINT_EXAMPLES)
    }

    /// Creates a base example at the tail of the endpoint's list.
    pub fn create(
        &self,
        endpoint_id: Id,
        name: &str,
        body: &[u8],
        is_default: bool,
    ) -> Result<Example, StoreError> {
        let example = self.insert(endpoint_id, None, name, body, is_default)?;
        self.ordering()
            .append(Scope::root(endpoint_id), example.id)?;
        Ok(example)
    }

    /// Creates a delta over `parent_example_id`. Deltas are never linked.
    pub fn create_delta(
        &self,
        parent_example_id: Id,
        name: &str,
        body: &[u8],
    ) -> Result<Example, StoreError> {
        let parent = self.get(parent_example_id)?;
        if parent.is_delta() {
            return Err(StoreError::InvalidArgument(
                "delta examples cannot have deltas",
            ));
        }
        self.insert(parent.endpoint_id, Some(parent.id), name, body, false)
    }

    pub fn get(&self, id: Id) -> Result<Example, StoreError> {
        let conn = self.db.reader()?;
        let sql = format!("SELECT {EXAMPLE_COLUMNS} FROM item_api_example WHERE id=?1");
        conn.query_row(&sql, params![id], read_example)
            .optional()?
            .ok_or(StoreError::NotFound("example"))
    }

    /// Newest delta of a base example, if any.
    pub fn latest_delta(&self, parent_example_id: Id) -> Result<Option<Example>, StoreError> {
        let conn = self.db.reader()?;
        let sql = format!(
            "SELECT {EXAMPLE_COLUMNS} FROM item_api_example \
             WHERE parent_example_id=?1 AND is_delta=1 \
             ORDER BY updated_at DESC, id DESC LIMIT 1"
        );
        Ok(conn
            .query_row(&sql, params![parent_example_id], read_example)
            .optional()?)
    }

    /// Base examples of an endpoint in list order.
    pub fn list(&self, endpoint_id: Id) -> Result<Vec<Example>, StoreError> {
        let order = self.ordering().list_under(Scope::root(endpoint_id))?;
        let conn = self.db.reader()?;
        let sql = format!(
            "SELECT {EXAMPLE_COLUMNS} FROM item_api_example WHERE item_api_id=?1 AND is_delta=0"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut by_id: HashMap<Id, Example> = stmt
            .query_map(params![endpoint_id], read_example)?
            .map(|row| row.map(|example| (example.id, example)))
            .collect::<Result<_, _>>()?;
        Ok(order
            .iter()
            .filter_map(|item| by_id.remove(&item.id))
            .collect())
    }

    pub fn update_body(&self, id: Id, body: &[u8]) -> Result<(), StoreError> {
        let (data, codec) = codec::set_compressed(body);
        let changed = self.db.writer()?.execute(
            "UPDATE item_api_example SET body=?2, body_codec=?3, updated_at=?4 WHERE id=?1",
            params![id, data, codec, now_ms()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound("example"));
        }
        Ok(())
    }

    pub fn move_before(&self, id: Id, target_id: Id) -> Result<(), StoreError> {
        let ordering = self.ordering();
        ordering.move_before(ordering.scope_of(id)?, id, target_id)
    }

    pub fn move_after(&self, id: Id, target_id: Id) -> Result<(), StoreError> {
        let ordering = self.ordering();
        ordering.move_after(ordering.scope_of(id)?, id, target_id)
    }

    /// Deletes an example; a base example takes its deltas with it.
    pub fn delete(&self, id: Id) -> Result<(), StoreError> {
        let example = self.get(id)?;
        let delete = |conn: &rusqlite::Connection| -> Result<(), StoreError> {
            conn.execute("DELETE FROM item_api_example WHERE id=?1", params![id])?;
            Ok(())
        };
        if example.is_delta() {
            return delete(self.db.writer()?);
        }
        self.ordering()
            .safe_delete(Scope::root(example.endpoint_id), id, delete)
    }

    fn insert(
        &self,
        endpoint_id: Id,
        parent_example_id: Option<Id>,
        name: &str,
        body: &[u8],
        is_default: bool,
    ) -> Result<Example, StoreError> {
        let conn = self.db.writer()?;
        let name = require_name(name)?;
        let endpoint: Option<(Id, Id)> = conn
            .query_row(
                "SELECT collection_id, workspace_id FROM item_api WHERE id=?1",
                params![endpoint_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((collection_id, workspace_id)) = endpoint else {
            return Err(StoreError::ParentNotFound("endpoint"));
        };
        let (data, body_codec) = codec::set_compressed(body);
        let example = Example {
            id: Id::new_now(),
            endpoint_id,
            collection_id,
            workspace_id,
            parent_example_id,
            is_default,
            name,
            body: data,
            body_codec,
            updated_at: now_ms(),
        };
        conn.execute(
            "INSERT INTO item_api_example(id, item_api_id, collection_id, workspace_id, \
             parent_example_id, is_delta, is_default, name, body, body_codec, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                example.id,
                example.endpoint_id,
                example.collection_id,
                example.workspace_id,
                example.parent_example_id,
                bool_to_i64(example.is_delta()),
                bool_to_i64(example.is_default),
                example.name,
                example.body,
                example.body_codec,
                example.updated_at
            ],
        )?;
        Ok(example)
    }
}
