#![forbid(unsafe_code)]

use crate::store::db::bound_service;
use crate::store::movable::SortKeyRepository;
use crate::store::support::{bool_to_i64, require_name};
use crate::store::{Db, StoreError};
use rusqlite::{OptionalExtension, Row, params};
use wb_core::Id;
use wb_core::flow::FlowVariable;
use wb_core::movable::{ListKind, Placement};
use wb_core::time::now_ms;

const VARIABLE_COLUMNS: &str = "id, flow_id, name, value, enabled, description, display_order";

fn read_variable(row: &Row<'_>) -> rusqlite::Result<FlowVariable> {
    Ok(FlowVariable {
        id: row.get(0)?,
        flow_id: row.get(1)?,
        name: row.get(2)?,
        value: row.get(3)?,
        enabled: row.get::<_, i64>(4)? != 0,
        description: row.get(5)?,
        order: row.get(6)?,
    })
}

/// Variables of a flow, ordered by a REAL `display_order` key.
#[derive(Clone, Debug)]
pub struct FlowVariableStore<'a> {
    db: Db<'a>,
}

bound_service!(FlowVariableStore);

impl<'a> FlowVariableStore<'a> {
    pub fn ordering(&self) -> SortKeyRepository<'a> {
        SortKeyRepository::new(
            self.db.clone(),
            ListKind::FlowVariables,
            "flow_variable",
            "flow_id",
            "display_order",
        )
    }

    /// Appends a variable after the current last one.
    pub fn create_variable(
        &self,
        flow_id: Id,
        name: &str,
        value: &str,
        description: &str,
    ) -> Result<FlowVariable, StoreError> {
        let conn = self.db.writer()?;
        let flow: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM flow WHERE id=?1",
                params![flow_id],
                |row| row.get(0),
            )
            .optional()?;
        if flow.is_none() {
            return Err(StoreError::ParentNotFound("flow"));
        }
        let variable = FlowVariable {
            id: Id::new_now(),
            flow_id,
            name: require_name(name)?,
            value: value.to_string(),
            enabled: true,
            description: description.to_string(),
            order: self.ordering().append_key(flow_id)?,
        };
        conn.execute(
            "INSERT INTO flow_variable(id, flow_id, name, value, enabled, description, \
             display_order) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                variable.id,
                variable.flow_id,
                variable.name,
                variable.value,
                bool_to_i64(variable.enabled),
                variable.description,
                variable.order
            ],
        )?;
        self.touch_flow(flow_id)?;
        Ok(variable)
    }

    pub fn get_variable(&self, id: Id) -> Result<FlowVariable, StoreError> {
        let conn = self.db.reader()?;
        let sql = format!("SELECT {VARIABLE_COLUMNS} FROM flow_variable WHERE id=?1");
        conn.query_row(&sql, params![id], read_variable)
            .optional()?
            .ok_or(StoreError::NotFound(ListKind::FlowVariables.as_str()))
    }

    /// Rewrites name, value, enabled and description. The order key is left
    /// alone.
    pub fn update_variable(&self, variable: &FlowVariable) -> Result<(), StoreError> {
        let name = require_name(&variable.name)?;
        let changed = self.db.writer()?.execute(
            "UPDATE flow_variable SET name=?2, value=?3, enabled=?4, description=?5 WHERE id=?1",
            params![
                variable.id,
                name,
                variable.value,
                bool_to_i64(variable.enabled),
                variable.description
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(ListKind::FlowVariables.as_str()));
        }
        self.touch_flow(variable.flow_id)
    }

    pub fn move_variable(
        &self,
        id: Id,
        target_id: Id,
        placement: Placement,
    ) -> Result<(), StoreError> {
        let variable = self.get_variable(id)?;
        self.ordering()
            .move_relative(variable.flow_id, id, target_id, placement)
    }

    /// Bulk reorder: `ids` must name every variable of the flow once.
    pub fn reorder_variables(&self, flow_id: Id, ids: &[Id]) -> Result<(), StoreError> {
        self.ordering().rewrite(flow_id, ids)
    }

    pub fn delete_variable(&self, id: Id) -> Result<(), StoreError> {
        let changed = self
            .db
            .writer()?
            .execute("DELETE FROM flow_variable WHERE id=?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::NotFound(ListKind::FlowVariables.as_str()));
        }
        Ok(())
    }

    pub fn variables(&self, flow_id: Id) -> Result<Vec<FlowVariable>, StoreError> {
        let conn = self.db.reader()?;
        let sql = format!(
            "SELECT {VARIABLE_COLUMNS} FROM flow_variable WHERE flow_id=?1 \
             ORDER BY display_order ASC, id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![flow_id], read_variable)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    fn touch_flow(&self, flow_id: Id) -> Result<(), StoreError> {
        self.db.writer()?.execute(
            "UPDATE flow SET updated_at=?2 WHERE id=?1",
            params![flow_id, now_ms()],
        )?;
        Ok(())
    }
}
