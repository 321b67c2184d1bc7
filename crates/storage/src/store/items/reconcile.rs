#![forbid(unsafe_code)]

use super::{CollectionItemStore, ItemType};
use crate::store::StoreError;
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use wb_core::Id;
use wb_core::movable::Scope;

/// What a reconciliation pass changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub created_items: usize,
    pub fixed_collection_ids: usize,
    pub repaired_chains: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

struct LegacyRow {
    id: Id,
    parent_id: Option<Id>,
    name: String,
}

impl CollectionItemStore<'_> {
    /// Brings a collection's legacy rows and its item tree back in line:
    /// legacy `collection_id` drift is corrected, damaged chains are relinked,
    /// and legacy rows without an item get one appended under the matching
    /// parent.
    pub fn reconcile_legacy(&self, collection_id: Id) -> Result<ReconcileReport, StoreError> {
        self.db.writer()?;
        self.collection_workspace(collection_id)?;
        let mut report = ReconcileReport {
            fixed_collection_ids: self.fix_collection_drift(collection_id)?,
            ..ReconcileReport::default()
        };
        report.repaired_chains = self.repair_chains(collection_id)?;
        report.created_items = self.adopt_orphan_folders(collection_id)?;
        report.created_items += self.adopt_orphan_endpoints(collection_id)?;

        if !report.is_clean() {
            tracing::warn!(
                collection = %collection_id,
                created = report.created_items,
                fixed = report.fixed_collection_ids,
                repaired = report.repaired_chains,
                "legacy reconciliation changed rows"
            );
        }
        Ok(report)
    }

    fn fix_collection_drift(&self, collection_id: Id) -> Result<usize, StoreError> {
        let conn = self.db.writer()?;
        let folders = conn.execute(
            "UPDATE item_folder SET collection_id=?1 WHERE collection_id <> ?1 AND id IN ( \
               SELECT folder_id FROM collection_items \
               WHERE collection_id=?1 AND folder_id IS NOT NULL)",
            params![collection_id],
        )?;
        let endpoints = conn.execute(
            "UPDATE item_api SET collection_id=?1 WHERE collection_id <> ?1 AND id IN ( \
               SELECT endpoint_id FROM collection_items \
               WHERE collection_id=?1 AND endpoint_id IS NOT NULL)",
            params![collection_id],
        )?;
        let examples = conn.execute(
            "UPDATE item_api_example SET collection_id=?1 WHERE collection_id <> ?1 \
             AND item_api_id IN ( \
               SELECT endpoint_id FROM collection_items \
               WHERE collection_id=?1 AND endpoint_id IS NOT NULL)",
            params![collection_id],
        )?;
        Ok(folders + endpoints + examples)
    }

    fn repair_chains(&self, collection_id: Id) -> Result<usize, StoreError> {
        let conn = self.db.reader()?;
        let mut parents: Vec<Option<Id>> = {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT parent_folder_id FROM collection_items \
                 WHERE collection_id=?1 AND parent_folder_id IS NOT NULL \
                 ORDER BY parent_folder_id",
            )?;
            let rows = stmt.query_map(params![collection_id], |row| row.get::<_, Option<Id>>(0))?;
            rows.collect::<Result<_, _>>()?
        };
        parents.insert(0, None);

        let ordering = self.ordering();
        let mut repaired = 0;
        for parent in parents {
            let written = ordering.repair_chain(Scope::nested(collection_id, parent))?;
            if written > 0 {
                tracing::warn!(
                    collection = %collection_id,
                    parent = ?parent,
                    rows = written,
                    "relinked damaged item chain"
                );
                repaired += 1;
            }
        }
        Ok(repaired)
    }

    /// Creates items for legacy folders that have none. Parents are placed
    /// before children; a legacy parent outside the collection puts the
    /// folder at the root.
    fn adopt_orphan_folders(&self, collection_id: Id) -> Result<usize, StoreError> {
        let mut pending = self.orphans(
            "SELECT f.id, f.parent_id, f.name FROM item_folder f \
             WHERE f.collection_id=?1 AND NOT EXISTS ( \
               SELECT 1 FROM collection_items ci WHERE ci.folder_id = f.id) \
             ORDER BY f.id",
            collection_id,
        )?;
        let mut created = 0;
        while !pending.is_empty() {
            let mut waiting = Vec::new();
            let mut progressed = false;
            for folder in pending.iter() {
                let parent = match folder.parent_id {
                    None => Some(None),
                    Some(legacy_parent) => {
                        match self.item_for_folder(collection_id, legacy_parent)? {
                            Some(item) => Some(Some(item)),
                            None if pending.iter().any(|other| other.id == legacy_parent) => None,
                            None => Some(None),
                        }
                    }
                };
                match parent {
                    Some(parent) => {
                        self.link_new(
                            collection_id,
                            parent,
                            ItemType::Folder,
                            folder.id,
                            &folder.name,
                        )?;
                        created += 1;
                        progressed = true;
                    }
                    None => waiting.push(folder.id),
                }
            }
            pending.retain(|folder| waiting.contains(&folder.id));
            if !progressed {
                // Legacy parent cycle: break it at the root.
                for folder in pending.drain(..) {
                    self.link_new(
                        collection_id,
                        None,
                        ItemType::Folder,
                        folder.id,
                        &folder.name,
                    )?;
                    created += 1;
                }
            }
        }
        Ok(created)
    }

    fn adopt_orphan_endpoints(&self, collection_id: Id) -> Result<usize, StoreError> {
        let orphans = self.orphans(
            "SELECT a.id, a.folder_id, a.name FROM item_api a \
             WHERE a.collection_id=?1 AND NOT EXISTS ( \
               SELECT 1 FROM collection_items ci WHERE ci.endpoint_id = a.id) \
             ORDER BY a.id",
            collection_id,
        )?;
        for endpoint in &orphans {
            let parent = match endpoint.parent_id {
                Some(folder_id) => self.item_for_folder(collection_id, folder_id)?,
                None => None,
            };
            self.link_new(
                collection_id,
                parent,
                ItemType::Endpoint,
                endpoint.id,
                &endpoint.name,
            )?;
        }
        Ok(orphans.len())
    }

    fn orphans(&self, sql: &str, collection_id: Id) -> Result<Vec<LegacyRow>, StoreError> {
        let conn = self.db.reader()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![collection_id], |row| {
            Ok(LegacyRow {
                id: row.get(0)?,
                parent_id: row.get(1)?,
                name: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    fn item_for_folder(&self, collection_id: Id, folder_id: Id) -> Result<Option<Id>, StoreError> {
        let conn = self.db.reader()?;
        Ok(conn
            .query_row(
                "SELECT id FROM collection_items WHERE collection_id=?1 AND folder_id=?2",
                params![collection_id, folder_id],
                |row| row.get(0),
            )
            .optional()?)
    }
}
