#![forbid(unsafe_code)]

use super::{CollectionItem, CollectionItemStore, ItemType};
use crate::store::StoreError;
use rusqlite::params;
use wb_core::Id;
use wb_core::movable::{Placement, Scope};
use wb_core::time::now_ms;

/// Where a same-scope move lands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Destination {
    Relative { target_id: Id, placement: Placement },
    /// Zero-based index, clamped to the chain bounds.
    Index(i64),
}

impl CollectionItemStore<'_> {
    /// Reorders an item inside its own scope. A target from another scope
    /// sends the item to the tail.
    pub fn move_within(&self, id: Id, destination: Destination) -> Result<(), StoreError> {
        let item = self.get(id)?;
        let ordering = self.ordering();
        match destination {
            Destination::Relative {
                target_id,
                placement,
            } => {
                self.get(target_id)?;
                ordering.move_to_scope(item.scope(), item.scope(), id, Some(target_id), placement)
            }
            Destination::Index(index) => ordering.move_to_index(item.scope(), id, index),
        }
    }

    /// Moves an item to another folder of the same collection (or its root).
    pub fn move_to_folder(
        &self,
        id: Id,
        target_parent_id: Option<Id>,
        target_item_id: Option<Id>,
        placement: Placement,
    ) -> Result<(), StoreError> {
        let item = self.get(id)?;
        let collection_id = item.collection_id;
        self.move_across(
            item,
            collection_id,
            target_parent_id,
            target_item_id,
            placement,
        )
    }

    /// Moves an item, with its subtree, into another collection of the same
    /// workspace. Legacy rows follow last.
    pub fn move_across_collection(
        &self,
        id: Id,
        target_collection_id: Id,
        target_parent_id: Option<Id>,
        target_item_id: Option<Id>,
        placement: Placement,
    ) -> Result<(), StoreError> {
        let item = self.get(id)?;
        let from_workspace = self.collection_workspace(item.collection_id)?;
        let to_workspace = match self.collection_workspace(target_collection_id) {
            Ok(workspace) => workspace,
            Err(StoreError::ParentNotFound(what)) => return Err(StoreError::NotFound(what)),
            Err(err) => return Err(err),
        };
        if from_workspace != to_workspace {
            return Err(StoreError::CrossWorkspaceMove {
                from_workspace,
                to_workspace,
            });
        }
        self.move_across(
            item,
            target_collection_id,
            target_parent_id,
            target_item_id,
            placement,
        )
    }

    fn move_across(
        &self,
        item: CollectionItem,
        target_collection_id: Id,
        target_parent_id: Option<Id>,
        target_item_id: Option<Id>,
        placement: Placement,
    ) -> Result<(), StoreError> {
        self.db.writer()?;
        if target_parent_id == Some(item.id) || target_item_id == Some(item.id) {
            return Err(StoreError::InvalidArgument(
                "item cannot be moved relative to itself",
            ));
        }
        let legacy_parent = self.legacy_parent(target_collection_id, target_parent_id)?;
        let subtree = self.subtree(item.id)?;
        if let Some(parent) = target_parent_id {
            if subtree.iter().any(|node| node.id == parent) {
                return Err(StoreError::InvalidArgument(
                    "folder cannot be moved into its own subtree",
                ));
            }
        }
        let to = Scope::nested(target_collection_id, target_parent_id);
        if let Some(target) = target_item_id {
            if !self.ordering().contains(to, target)? {
                return Err(StoreError::InvalidArgument(
                    "target item is not in the destination folder",
                ));
            }
        }

        self.ordering()
            .move_to_scope(item.scope(), to, item.id, target_item_id, placement)?;

        let moved_subtree = if target_collection_id != item.collection_id {
            self.carry_descendants(&subtree[1..], target_collection_id)?;
            Some(&subtree[..])
        } else {
            None
        };
        self.sync_legacy(&item, legacy_parent, moved_subtree, target_collection_id)
    }

    /// Descendant items keep their parents; only their collection changes.
    fn carry_descendants(
        &self,
        descendants: &[CollectionItem],
        target_collection_id: Id,
    ) -> Result<(), StoreError> {
        let conn = self.db.writer()?;
        let mut stmt = conn.prepare("UPDATE collection_items SET collection_id=?2 WHERE id=?1")?;
        for node in descendants {
            self.db.check_cancel()?;
            stmt.execute(params![node.id, target_collection_id])?;
        }
        Ok(())
    }

    /// Points the moved item's legacy row at its new legacy parent and, when
    /// the collection changed, rewrites `collection_id` on every legacy row of
    /// the subtree, endpoint examples included.
    fn sync_legacy(
        &self,
        item: &CollectionItem,
        legacy_parent: Option<Id>,
        moved_subtree: Option<&[CollectionItem]>,
        target_collection_id: Id,
    ) -> Result<(), StoreError> {
        let conn = self.db.writer()?;
        let now = now_ms();
        for node in moved_subtree.unwrap_or_default() {
            match (node.item_type, node.legacy_id()) {
                (ItemType::Folder, Some(folder_id)) => {
                    conn.execute(
                        "UPDATE item_folder SET collection_id=?2, updated_at=?3 WHERE id=?1",
                        params![folder_id, target_collection_id, now],
                    )?;
                }
                (ItemType::Endpoint, Some(endpoint_id)) => {
                    conn.execute(
                        "UPDATE item_api SET collection_id=?2, updated_at=?3 WHERE id=?1",
                        params![endpoint_id, target_collection_id, now],
                    )?;
                    conn.execute(
                        "UPDATE item_api_example SET collection_id=?2, updated_at=?3 \
                         WHERE item_api_id=?1",
                        params![endpoint_id, target_collection_id, now],
                    )?;
                }
                _ => {}
            }
        }
        match (item.item_type, item.legacy_id()) {
            (ItemType::Folder, Some(folder_id)) => {
                conn.execute(
                    "UPDATE item_folder SET parent_id=?2, updated_at=?3 WHERE id=?1",
                    params![folder_id, legacy_parent, now],
                )?;
            }
            (ItemType::Endpoint, Some(endpoint_id)) => {
                conn.execute(
                    "UPDATE item_api SET folder_id=?2, updated_at=?3 WHERE id=?1",
                    params![endpoint_id, legacy_parent, now],
                )?;
            }
            _ => {}
        }
        Ok(())
    }
}
