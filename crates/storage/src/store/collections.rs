#![forbid(unsafe_code)]

use super::db::bound_service;
use super::movable::{COLLECTIONS, LinkedRepository};
use super::support::require_name;
use super::{Db, StoreError};
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use std::collections::HashMap;
use wb_core::Id;
use wb_core::movable::Scope;
use wb_core::time::now_ms;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Collection {
    pub id: Id,
    pub workspace_id: Id,
    pub name: String,
    pub updated_at: i64,
}

/// Collections of a workspace, ordered per workspace.
#[derive(Clone, Debug)]
pub struct CollectionStore<'a> {
    db: Db<'a>,
}

bound_service!(CollectionStore);

impl<'a> CollectionStore<'a> {
    pub fn ordering(&self) -> LinkedRepository<'a> {
        LinkedRepository::new(self.db.clone(), COLLECTIONS)
    }

    pub fn create(&self, workspace_id: Id, name: &str) -> Result<Collection, StoreError> {
        let collection = self.insert_unlinked(workspace_id, name)?;
        self.ordering()
            .append(Scope::root(workspace_id), collection.id)?;
        Ok(collection)
    }

    pub fn create_at(
        &self,
        workspace_id: Id,
        name: &str,
        position: i64,
    ) -> Result<Collection, StoreError> {
        let collection = self.insert_unlinked(workspace_id, name)?;
        self.ordering()
            .insert_at(Scope::root(workspace_id), collection.id, position)?;
        Ok(collection)
    }

    pub fn get(&self, id: Id) -> Result<Collection, StoreError> {
        let conn = self.db.reader()?;
        conn.query_row(
            "SELECT id, workspace_id, name, updated_at FROM collections WHERE id=?1",
            params![id],
            |row| {
                Ok(Collection {
                    id: row.get(0)?,
                    workspace_id: row.get(1)?,
                    name: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            },
        )
        .optional()?
        .ok_or(StoreError::NotFound("collection"))
    }

    pub fn list(&self, workspace_id: Id) -> Result<Vec<Collection>, StoreError> {
        let order = self.ordering().list_under(Scope::root(workspace_id))?;
        let conn = self.db.reader()?;
        let mut stmt = conn.prepare(
            "SELECT id, workspace_id, name, updated_at FROM collections WHERE workspace_id=?1",
        )?;
        let mut rows = stmt.query(params![workspace_id])?;
        let mut by_id = HashMap::new();
        while let Some(row) = rows.next()? {
            let collection = Collection {
                id: row.get(0)?,
                workspace_id: row.get(1)?,
                name: row.get(2)?,
                updated_at: row.get(3)?,
            };
            by_id.insert(collection.id, collection);
        }
        Ok(order
            .iter()
            .filter_map(|item| by_id.remove(&item.id))
            .collect())
    }

    pub fn rename(&self, id: Id, name: &str) -> Result<(), StoreError> {
        let name = require_name(name)?;
        let changed = self.db.writer()?.execute(
            "UPDATE collections SET name=?2, updated_at=?3 WHERE id=?1",
            params![id, name, now_ms()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound("collection"));
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

    /// Unlinks, then deletes the collection; its items cascade.
    pub fn delete(&self, id: Id) -> Result<(), StoreError> {
        let ordering = self.ordering();
        let scope = ordering.scope_of(id)?;
        ordering.safe_delete(scope, id, |conn| {
            conn.execute("DELETE FROM collections WHERE id=?1", params![id])?;
            Ok(())
        })
    }

    pub fn workspace_of(&self, id: Id) -> Result<Id, StoreError> {
        Ok(self.get(id)?.workspace_id)
    }

    fn insert_unlinked(&self, workspace_id: Id, name: &str) -> Result<Collection, StoreError> {
        let conn = self.db.writer()?;
        let name = require_name(name)?;
        workspace_id.ensure_valid()?;
        if !self.ordering().parent_exists(Scope::root(workspace_id))? {
            return Err(StoreError::ParentNotFound("workspace"));
        }
        let collection = Collection {
            id: Id::new_now(),
            workspace_id,
            name,
            updated_at: now_ms(),
        };
        conn.execute(
            "INSERT INTO collections(id, workspace_id, name, updated_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                collection.id,
                collection.workspace_id,
                collection.name,
                collection.updated_at
            ],
        )?;
        Ok(collection)
    }
}
