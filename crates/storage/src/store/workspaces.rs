#![forbid(unsafe_code)]

use super::db::bound_service;
use super::error::is_constraint_violation;
use super::movable::{LinkedRepository, WORKSPACES};
use super::support::require_name;
use super::{Db, StoreError};
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use std::collections::HashMap;
use wb_core::{CoreError, Id};
use wb_core::movable::Scope;
use wb_core::time::now_ms;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Workspace {
    pub id: Id,
    pub name: String,
    pub updated_at: i64,
}

/// Users, workspaces and membership. Each user's workspace list is ordered
/// through the membership rows.
#[derive(Clone, Debug)]
pub struct WorkspaceStore<'a> {
    db: Db<'a>,
}

bound_service!(WorkspaceStore);

impl<'a> WorkspaceStore<'a> {
    pub fn ordering(&self) -> LinkedRepository<'a> {
        LinkedRepository::new(self.db.clone(), WORKSPACES)
    }

    pub fn create_user(&self, email: &str) -> Result<Id, StoreError> {
        let id = Id::new_now();
        self.db.writer()?.execute(
            "INSERT INTO users(id, email) VALUES (?1, ?2)",
            params![id, email.trim()],
        )?;
        Ok(id)
    }

    /// Creates a workspace and appends it to the owner's list.
    pub fn create(&self, owner_id: Id, name: &str) -> Result<Workspace, StoreError> {
        let conn = self.db.writer()?;
        let name = require_name(name)?;
        let workspace = Workspace {
            id: Id::new_now(),
            name,
            updated_at: now_ms(),
        };
        conn.execute(
            "INSERT INTO workspaces(id, name, updated_at) VALUES (?1, ?2, ?3)",
            params![workspace.id, workspace.name, workspace.updated_at],
        )?;
        self.add_member(workspace.id, owner_id)?;
        Ok(workspace)
    }

    pub fn get(&self, id: Id) -> Result<Workspace, StoreError> {
        self.db
            .reader()?
            .query_row(
                "SELECT id, name, updated_at FROM workspaces WHERE id=?1",
                params![id],
                |row| {
                    Ok(Workspace {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                },
            )
            .optional()?
            .ok_or(StoreError::NotFound("workspace"))
    }

    pub fn add_member(&self, workspace_id: Id, user_id: Id) -> Result<(), StoreError> {
        let conn = self.db.writer()?;
        let ordering = self.ordering();
        if !ordering.parent_exists(Scope::root(user_id))? {
            return Err(StoreError::ParentNotFound("user"));
        }
        self.get(workspace_id)?;
        conn.execute(
            "INSERT INTO workspaces_users(workspace_id, user_id) VALUES (?1, ?2)",
            params![workspace_id, user_id],
        )
        .map_err(|err| {
            if is_constraint_violation(&err) {
                StoreError::from(CoreError::Duplicate(workspace_id))
            } else {
                err.into()
            }
        })?;
        ordering.append(Scope::root(user_id), workspace_id)?;
        Ok(())
    }

    pub fn is_member(&self, workspace_id: Id, user_id: Id) -> Result<bool, StoreError> {
        self.ordering().contains(Scope::root(user_id), workspace_id)
    }

    /// The user's workspaces in their chosen order.
    pub fn list_for_user(&self, user_id: Id) -> Result<Vec<Workspace>, StoreError> {
        let order = self.ordering().list_under(Scope::root(user_id))?;
        let conn = self.db.reader()?;
        let mut stmt = conn.prepare(
            "SELECT w.id, w.name, w.updated_at FROM workspaces w \
             JOIN workspaces_users wu ON wu.workspace_id = w.id \
             WHERE wu.user_id=?1",
        )?;
        let mut rows = stmt.query(params![user_id])?;
        let mut by_id = HashMap::new();
        while let Some(row) = rows.next()? {
            let workspace = Workspace {
                id: row.get(0)?,
                name: row.get(1)?,
                updated_at: row.get(2)?,
            };
            by_id.insert(workspace.id, workspace);
        }
        Ok(order
            .iter()
            .filter_map(|item| by_id.remove(&item.id))
            .collect())
    }

    pub fn move_before(
        &self,
        user_id: Id,
        workspace_id: Id,
        target_id: Id,
    ) -> Result<(), StoreError> {
        self.ordering()
            .move_before(Scope::root(user_id), workspace_id, target_id)
    }

    pub fn move_after(
        &self,
        user_id: Id,
        workspace_id: Id,
        target_id: Id,
    ) -> Result<(), StoreError> {
        self.ordering()
            .move_after(Scope::root(user_id), workspace_id, target_id)
    }

    pub fn remove_member(&self, workspace_id: Id, user_id: Id) -> Result<(), StoreError> {
        self.ordering()
            .safe_delete(Scope::root(user_id), workspace_id, |conn| {
                conn.execute(
                    "DELETE FROM workspaces_users WHERE workspace_id=?1 AND user_id=?2",
                    params![workspace_id, user_id],
                )?;
                Ok(())
            })
    }

    /// Unlinks the workspace from every member's list, then deletes it.
    pub fn delete(&self, workspace_id: Id) -> Result<(), StoreError> {
        let conn = self.db.writer()?;
        self.get(workspace_id)?;
        let members: Vec<Id> = {
            let mut stmt =
                conn.prepare("SELECT user_id FROM workspaces_users WHERE workspace_id=?1")?;
            let rows = stmt.query_map(params![workspace_id], |row| row.get::<_, Id>(0))?;
            rows.collect::<Result<_, _>>()?
        };
        let ordering = self.ordering();
        for user_id in members {
            ordering.remove(Scope::root(user_id), workspace_id)?;
        }
        conn.execute("DELETE FROM workspaces WHERE id=?1", params![workspace_id])?;
        Ok(())
    }
}
