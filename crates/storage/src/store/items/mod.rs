#![forbid(unsafe_code)]

//! Collection items: the ordered, mixed folder/endpoint tree of a collection.
//!
//! Each item points at one legacy row (`item_folder` or `item_api`). The item
//! chain is scoped by `(collection_id, parent_folder_id)`, where the parent is
//! always another collection item, never a legacy folder id.

mod moves;
mod reconcile;

pub use moves::Destination;
pub use reconcile::ReconcileReport;

use super::db::bound_service;
use super::movable::{COLLECTION_ITEMS, LinkedRepository, MovableRepository};
use super::support::require_name;
use super::{Db, StoreError};
use rusqlite::{OptionalExtension, Row, params};
use serde::Serialize;
use std::collections::HashMap;
use wb_core::movable::{IntegrityReport, ListKind, Scope};
use wb_core::time::now_ms;
use wb_core::{CoreError, Id};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Folder,
    Endpoint,
}

impl ItemType {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Folder => 0,
            Self::Endpoint => 1,
        }
    }

    pub fn try_from_i64(value: i64) -> Result<Self, CoreError> {
        match value {
            0 => Ok(Self::Folder),
            1 => Ok(Self::Endpoint),
            _ => Err(CoreError::InvalidState {
                field: "item_type",
                value,
                max: 1,
            }),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CollectionItem {
    pub id: Id,
    pub collection_id: Id,
    pub parent_folder_id: Option<Id>,
    pub item_type: ItemType,
    pub folder_id: Option<Id>,
    pub endpoint_id: Option<Id>,
    pub name: String,
    pub prev_id: Option<Id>,
    pub next_id: Option<Id>,
}

impl CollectionItem {
    pub fn scope(&self) -> Scope {
        Scope::nested(self.collection_id, self.parent_folder_id)
    }

    /// Id of the legacy row this item stands for.
    pub fn legacy_id(&self) -> Option<Id> {
        match self.item_type {
            ItemType::Folder => self.folder_id,
            ItemType::Endpoint => self.endpoint_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewFolder {
    pub collection_id: Id,
    /// Collection-item id of the enclosing folder; `None` is the root.
    pub parent_folder_id: Option<Id>,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewEndpoint {
    pub collection_id: Id,
    pub parent_folder_id: Option<Id>,
    pub name: String,
    pub url: String,
    pub method: String,
}

const ITEM_COLUMNS: &str = "id, collection_id, parent_folder_id, item_type, folder_id, \
     endpoint_id, name, prev_id, next_id";

fn read_item(row: &Row<'_>) -> rusqlite::Result<CollectionItem> {
    let item_type = row.get::<_, i64>(3)?;
    let item_type = ItemType::try_from_i64(item_type).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Integer, Box::new(err))
    })?;
    Ok(CollectionItem {
        id: row.get(0)?,
        collection_id: row.get(1)?,
        parent_folder_id: row.get(2)?,
        item_type,
        folder_id: row.get(4)?,
        endpoint_id: row.get(5)?,
        name: row.get(6)?,
        prev_id: row.get(7)?,
        next_id: row.get(8)?,
    })
}

#[derive(Clone, Debug)]
pub struct CollectionItemStore<'a> {
    db: Db<'a>,
}

bound_service!(CollectionItemStore);

impl<'a> CollectionItemStore<'a> {
    pub fn ordering(&self) -> LinkedRepository<'a> {
        LinkedRepository::new(self.db.clone(), COLLECTION_ITEMS)
    }

    pub fn get(&self, id: Id) -> Result<CollectionItem, StoreError> {
        let conn = self.db.reader()?;
        let sql = format!("SELECT {ITEM_COLUMNS} FROM collection_items WHERE id=?1");
        conn.query_row(&sql, params![id], read_item)
            .optional()?
            .ok_or(StoreError::NotFound(ListKind::CollectionItems.as_str()))
    }

    /// Items of one `(collection, parent folder)` scope in chain order.
    pub fn list(
        &self,
        collection_id: Id,
        parent_folder_id: Option<Id>,
    ) -> Result<Vec<CollectionItem>, StoreError> {
        let scope = Scope::nested(collection_id, parent_folder_id);
        let order = self.ordering().list_under(scope)?;
        let conn = self.db.reader()?;
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM collection_items \
             WHERE collection_id=?1 AND parent_folder_id IS ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut by_id: HashMap<Id, CollectionItem> = stmt
            .query_map(params![collection_id, parent_folder_id], read_item)?
            .map(|row| row.map(|item| (item.id, item)))
            .collect::<Result<_, _>>()?;
        Ok(order
            .iter()
            .filter_map(|item| by_id.remove(&item.id))
            .collect())
    }

    /// Folder-only or endpoint-only view of a scope, keeping chain order.
    pub fn list_kind(
        &self,
        collection_id: Id,
        parent_folder_id: Option<Id>,
        item_type: ItemType,
    ) -> Result<Vec<CollectionItem>, StoreError> {
        Ok(self
            .list(collection_id, parent_folder_id)?
            .into_iter()
            .filter(|item| item.item_type == item_type)
            .collect())
    }

    /// Inserts the legacy folder row, then links a new item at the tail.
    pub fn create_folder(&self, folder: &NewFolder) -> Result<CollectionItem, StoreError> {
        let conn = self.db.writer()?;
        let name = require_name(&folder.name)?;
        let workspace_id = self.collection_workspace(folder.collection_id)?;
        let legacy_parent = self.legacy_parent(folder.collection_id, folder.parent_folder_id)?;
        let folder_id = Id::new_now();
        conn.execute(
            "INSERT INTO item_folder(id, collection_id, workspace_id, parent_id, name, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                folder_id,
                folder.collection_id,
                workspace_id,
                legacy_parent,
                name,
                now_ms()
            ],
        )?;
        self.link_new(
            folder.collection_id,
            folder.parent_folder_id,
            ItemType::Folder,
            folder_id,
            &name,
        )
    }

    /// Inserts the legacy endpoint row, then links a new item at the tail.
    pub fn create_endpoint(&self, endpoint: &NewEndpoint) -> Result<CollectionItem, StoreError> {
        let conn = self.db.writer()?;
        let name = require_name(&endpoint.name)?;
        let workspace_id = self.collection_workspace(endpoint.collection_id)?;
        let legacy_parent = self.legacy_parent(endpoint.collection_id, endpoint.parent_folder_id)?;
        let endpoint_id = Id::new_now();
        conn.execute(
            "INSERT INTO item_api(id, collection_id, workspace_id, folder_id, name, url, method, \
             updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                endpoint_id,
                endpoint.collection_id,
                workspace_id,
                legacy_parent,
                name,
                endpoint.url,
                endpoint.method,
                now_ms()
            ],
        )?;
        self.link_new(
            endpoint.collection_id,
            endpoint.parent_folder_id,
            ItemType::Endpoint,
            endpoint_id,
            &name,
        )
    }

    /// Unlinks and deletes the item; child items go with it. With
    /// `cascade_legacy` the legacy rows of the whole subtree are deleted too.
    pub fn delete(&self, id: Id, cascade_legacy: bool) -> Result<(), StoreError> {
        let item = self.get(id)?;
        let subtree = if cascade_legacy {
            self.subtree(id)?
        } else {
            Vec::new()
        };
        self.ordering().safe_delete(item.scope(), id, |conn| {
            conn.execute("DELETE FROM collection_items WHERE id=?1", params![id])?;
            for node in &subtree {
                match (node.item_type, node.legacy_id()) {
                    (ItemType::Folder, Some(folder_id)) => {
                        conn.execute("DELETE FROM item_folder WHERE id=?1", params![folder_id])?;
                    }
                    (ItemType::Endpoint, Some(endpoint_id)) => {
                        conn.execute("DELETE FROM item_api WHERE id=?1", params![endpoint_id])?;
                    }
                    _ => {}
                }
            }
            Ok(())
        })
    }

    /// `item -> collection -> workspace`, for authorization.
    pub fn workspace_of(&self, id: Id) -> Result<Id, StoreError> {
        let conn = self.db.reader()?;
        conn.query_row(
            "SELECT c.workspace_id FROM collection_items ci \
             JOIN collections c ON c.id = ci.collection_id WHERE ci.id=?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(StoreError::NotFound(ListKind::CollectionItems.as_str()))
    }

    pub fn check_integrity(
        &self,
        collection_id: Id,
        parent_folder_id: Option<Id>,
    ) -> Result<IntegrityReport, StoreError> {
        self.ordering()
            .check_integrity(Scope::nested(collection_id, parent_folder_id))
    }

    /// The item and every item below it, parents before children.
    pub(crate) fn subtree(&self, id: Id) -> Result<Vec<CollectionItem>, StoreError> {
        let conn = self.db.reader()?;
        let columns = ITEM_COLUMNS
            .split(", ")
            .map(|column| format!("ci.{column}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "WITH RECURSIVE subtree(id, depth) AS ( \
               SELECT id, 0 FROM collection_items WHERE id=?1 \
               UNION ALL \
               SELECT c.id, s.depth + 1 FROM collection_items c \
               JOIN subtree s ON c.parent_folder_id = s.id \
             ) \
             SELECT {columns} FROM collection_items ci JOIN subtree s ON s.id = ci.id \
             ORDER BY s.depth ASC, ci.id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![id], read_item)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub(crate) fn collection_workspace(&self, collection_id: Id) -> Result<Id, StoreError> {
        let conn = self.db.reader()?;
        conn.query_row(
            "SELECT workspace_id FROM collections WHERE id=?1",
            params![collection_id],
            |row| row.get(0),
        )
        .optional()?
        .ok_or(StoreError::ParentNotFound("collection"))
    }

    /// Resolves a parent collection item to its legacy folder id. The parent
    /// must be a folder item of `collection_id`.
    pub(crate) fn legacy_parent(
        &self,
        collection_id: Id,
        parent_folder_id: Option<Id>,
    ) -> Result<Option<Id>, StoreError> {
        let Some(parent_id) = parent_folder_id else {
            return Ok(None);
        };
        let parent = match self.get(parent_id) {
            Ok(parent) => parent,
            Err(StoreError::NotFound(_)) => {
                return Err(StoreError::ParentNotFound(
                    ListKind::CollectionFolders.as_str(),
                ));
            }
            Err(err) => return Err(err),
        };
        if parent.item_type != ItemType::Folder {
            return Err(StoreError::InvalidArgument("parent item must be a folder"));
        }
        if parent.collection_id != collection_id {
            return Err(StoreError::InvalidArgument(
                "parent folder belongs to another collection",
            ));
        }
        Ok(parent.folder_id)
    }

    /// Inserts an unlinked item row and links it at `max(position) + 1`.
    fn link_new(
        &self,
        collection_id: Id,
        parent_folder_id: Option<Id>,
        item_type: ItemType,
        legacy_id: Id,
        name: &str,
    ) -> Result<CollectionItem, StoreError> {
        let conn = self.db.writer()?;
        let scope = Scope::nested(collection_id, parent_folder_id);
        let ordering = self.ordering();
        let append_position = ordering
            .max_position(scope)?
            .map_or(0, |position| position + 1);
        let (folder_id, endpoint_id) = match item_type {
            ItemType::Folder => (Some(legacy_id), None),
            ItemType::Endpoint => (None, Some(legacy_id)),
        };
        let id = Id::new_now();
        conn.execute(
            "INSERT INTO collection_items(id, collection_id, parent_folder_id, item_type, \
             folder_id, endpoint_id, name) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id,
                collection_id,
                parent_folder_id,
                item_type.as_i64(),
                folder_id,
                endpoint_id,
                name
            ],
        )?;
        ordering.insert_at(scope, id, append_position)?;
        self.get(id)
    }
}
