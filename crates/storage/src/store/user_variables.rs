#![forbid(unsafe_code)]

use super::db::bound_service;
use super::movable::{LinkedRepository, USER_VARIABLES};
use super::support::require_name;
use super::{Db, StoreError};
use rusqlite::params;
use serde::Serialize;
use std::collections::HashMap;
use wb_core::Id;
use wb_core::movable::Scope;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UserVariable {
    pub id: Id,
    pub user_id: Id,
    pub name: String,
    pub value: String,
}

/// Per-user environment variables, ordered per user.
#[derive(Clone, Debug)]
pub struct UserVariableStore<'a> {
    db: Db<'a>,
}

bound_service!(UserVariableStore);

impl<'a> UserVariableStore<'a> {
    pub fn ordering(&self) -> LinkedRepository<'a> {
        LinkedRepository::new(self.db.clone(), USER_VARIABLES)
    }

    pub fn create(&self, user_id: Id, name: &str, value: &str) -> Result<UserVariable, StoreError> {
        let conn = self.db.writer()?;
        let ordering = self.ordering();
        if !ordering.parent_exists(Scope::root(user_id))? {
            return Err(StoreError::ParentNotFound("user"));
        }
        let variable = UserVariable {
            id: Id::new_now(),
            user_id,
            name: require_name(name)?,
            value: value.to_string(),
        };
        conn.execute(
            "INSERT INTO user_variables(id, user_id, name, value) VALUES (?1, ?2, ?3, ?4)",
            params![variable.id, variable.user_id, variable.name, variable.value],
        )?;
        ordering.append(Scope::root(user_id), variable.id)?;
        Ok(variable)
    }

    pub fn list(&self, user_id: Id) -> Result<Vec<UserVariable>, StoreError> {
        let order = self.ordering().list_under(Scope::root(user_id))?;
        let conn = self.db.reader()?;
        let mut stmt =
            conn.prepare("SELECT id, user_id, name, value FROM user_variables WHERE user_id=?1")?;
        let mut rows = stmt.query(params![user_id])?;
        let mut by_id = HashMap::new();
        while let Some(row) = rows.next()? {
            let variable = UserVariable {
                id: row.get(0)?,
                user_id: row.get(1)?,
                name: row.get(2)?,
                value: row.get(3)?,
            };
            by_id.insert(variable.id, variable);
        }
        Ok(order
            .iter()
            .filter_map(|item| by_id.remove(&item.id))
            .collect())
    }

    pub fn move_before(&self, id: Id, target_id: Id) -> Result<(), StoreError> {
        let ordering = self.ordering();
        ordering.move_before(ordering.scope_of(id)?, id, target_id)
    }

    pub fn move_after(&self, id: Id, target_id: Id) -> Result<(), StoreError> {
        let ordering = self.ordering();
        ordering.move_after(ordering.scope_of(id)?, id, target_id)
    }

    pub fn delete(&self, id: Id) -> Result<(), StoreError> {
        let ordering = self.ordering();
        let scope = ordering.scope_of(id)?;
        ordering.safe_delete(scope, id, |conn| {
            conn.execute("DELETE FROM user_variables WHERE id=?1", params![id])?;
            Ok(())
        })
    }
}
