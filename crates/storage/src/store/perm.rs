#![forbid(unsafe_code)]

use super::db::bound_service;
use super::{Db, StoreError};
use rusqlite::{OptionalExtension, params};
use wb_core::Id;

/// Anything a caller can ask permission for. Every resource resolves to the
/// workspace that owns it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Resource {
    Workspace(Id),
    Collection(Id),
    CollectionItem(Id),
    Example(Id),
    Flow(Id),
    Node(Id),
}

impl Resource {
    fn owner_query(self) -> (&'static str, Id, &'static str) {
        match self {
            Self::Workspace(id) => ("SELECT id FROM workspaces WHERE id=?1", id, "workspace"),
            Self::Collection(id) => (
                "SELECT workspace_id FROM collections WHERE id=?1",
                id,
                "collection",
            ),
            Self::CollectionItem(id) => (
                "SELECT c.workspace_id FROM collection_items ci \
                 JOIN collections c ON c.id = ci.collection_id WHERE ci.id=?1",
                id,
                "collection_items",
            ),
            Self::Example(id) => (
                "SELECT workspace_id FROM item_api_example WHERE id=?1",
                id,
                "example",
            ),
            Self::Flow(id) => ("SELECT workspace_id FROM flow WHERE id=?1", id, "flow"),
            Self::Node(id) => (
                "SELECT f.workspace_id FROM flow_node n JOIN flow f ON f.id = n.flow_id \
                 WHERE n.id=?1",
                id,
                "node",
            ),
        }
    }
}

/// Authorization seam in front of mutating calls.
pub trait CheckPerm {
    fn check_perm(&self, resource: Resource, user_id: Id) -> Result<(), StoreError>;
}

/// Grants access to members of the owning workspace.
#[derive(Clone, Debug)]
pub struct MembershipPerm<'a> {
    db: Db<'a>,
}

bound_service!(MembershipPerm);

impl MembershipPerm<'_> {
    pub fn workspace_of(&self, resource: Resource) -> Result<Id, StoreError> {
        let (sql, id, what) = resource.owner_query();
        self.db
            .reader()?
            .query_row(sql, params![id], |row| row.get(0))
            .optional()?
            .ok_or(StoreError::NotFound(what))
    }
}

impl CheckPerm for MembershipPerm<'_> {
    fn check_perm(&self, resource: Resource, user_id: Id) -> Result<(), StoreError> {
        let workspace_id = self.workspace_of(resource)?;
        let member: Option<i64> = self
            .db
            .reader()?
            .query_row(
                "SELECT 1 FROM workspaces_users WHERE workspace_id=?1 AND user_id=?2",
                params![workspace_id, user_id],
                |row| row.get(0),
            )
            .optional()?;
        match member {
            Some(_) => Ok(()),
            None => Err(StoreError::PermissionDenied {
                user_id,
                workspace_id,
            }),
        }
    }
}
