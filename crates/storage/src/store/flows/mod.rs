#![forbid(unsafe_code)]

//! Flow graphs: flow headers and versions, typed nodes, edges, and the
//! float-ordered flow variables.

mod edges;
mod nodes;
mod variables;

pub use variables::FlowVariableStore;

use super::db::bound_service;
use super::support::require_name;
use super::{Db, StoreError};
use rusqlite::{OptionalExtension, Row, params};
use wb_core::Id;
use wb_core::flow::{Flow, FlowGraph};
use wb_core::time::now_ms;

const FLOW_COLUMNS: &str = "id, workspace_id, name, version_parent_id, updated_at";

fn read_flow(row: &Row<'_>) -> rusqlite::Result<Flow> {
    Ok(Flow {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        name: row.get(2)?,
        version_parent_id: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

#[derive(Clone, Debug)]
pub struct FlowStore<'a> {
    db: Db<'a>,
}

bound_service!(FlowStore);

impl FlowStore<'_> {
    pub fn create_flow(&self, workspace_id: Id, name: &str) -> Result<Flow, StoreError> {
        let conn = self.db.writer()?;
        let name = require_name(name)?;
        let workspace: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM workspaces WHERE id=?1",
                params![workspace_id],
                |row| row.get(0),
            )
            .optional()?;
        if workspace.is_none() {
            return Err(StoreError::ParentNotFound("workspace"));
        }
        let flow = Flow {
            id: Id::new_now(),
            workspace_id,
            name,
            version_parent_id: None,
            updated_at: now_ms(),
        };
        self.insert_flow(&flow)?;
        Ok(flow)
    }

    pub fn get_flow(&self, id: Id) -> Result<Flow, StoreError> {
        let conn = self.db.reader()?;
        let sql = format!("SELECT {FLOW_COLUMNS} FROM flow WHERE id=?1");
        conn.query_row(&sql, params![id], read_flow)
            .optional()?
            .ok_or(StoreError::NotFound("flow"))
    }

    /// Live flows of a workspace; version snapshots are excluded.
    pub fn list_flows(&self, workspace_id: Id) -> Result<Vec<Flow>, StoreError> {
        self.query_flows(
            "WHERE workspace_id=?1 AND version_parent_id IS NULL",
            workspace_id,
        )
    }

    /// Version snapshots of a live flow, oldest first.
    pub fn list_versions(&self, flow_id: Id) -> Result<Vec<Flow>, StoreError> {
        self.query_flows("WHERE version_parent_id=?1", flow_id)
    }

    /// Deletes a flow with its nodes, edges, variables and versions.
    pub fn delete_flow(&self, id: Id) -> Result<(), StoreError> {
        let changed = self
            .db
            .writer()?
            .execute("DELETE FROM flow WHERE id=?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::NotFound("flow"));
        }
        Ok(())
    }

    /// Copies the live flow's header into a new version row. Nodes, edges and
    /// variables are left for the caller to populate.
    pub fn create_version(&self, live_flow_id: Id) -> Result<Flow, StoreError> {
        self.db.writer()?;
        let live = self.get_flow(live_flow_id)?;
        if live.is_version() {
            return Err(StoreError::InvalidArgument(
                "versions are taken from live flows",
            ));
        }
        let version = Flow {
            id: Id::new_now(),
            workspace_id: live.workspace_id,
            name: live.name,
            version_parent_id: Some(live.id),
            updated_at: now_ms(),
        };
        self.insert_flow(&version)?;
        Ok(version)
    }

    /// Attaches the opaque live-to-version id mapping to a version.
    pub fn update_version_node_mapping(
        &self,
        version_id: Id,
        mapping: &[u8],
    ) -> Result<(), StoreError> {
        let conn = self.db.writer()?;
        if !self.get_flow(version_id)?.is_version() {
            return Err(StoreError::InvalidArgument("flow is not a version"));
        }
        conn.execute(
            "UPDATE flow SET node_id_mapping=?2, updated_at=?3 WHERE id=?1",
            params![version_id, mapping, now_ms()],
        )?;
        Ok(())
    }

    pub fn version_node_mapping(&self, version_id: Id) -> Result<Option<Vec<u8>>, StoreError> {
        let conn = self.db.reader()?;
        conn.query_row(
            "SELECT node_id_mapping FROM flow WHERE id=?1",
            params![version_id],
            |row| row.get::<_, Option<Vec<u8>>>(0),
        )
        .optional()?
        .ok_or(StoreError::NotFound("flow"))
    }

    /// Nodes and edges of a flow with the edge index built.
    pub fn load_graph(&self, flow_id: Id) -> Result<FlowGraph, StoreError> {
        let flow = self.get_flow(flow_id)?;
        let nodes = self.nodes(flow_id)?;
        let edges = self.edges(flow_id)?;
        Ok(FlowGraph::new(flow, nodes, edges)?)
    }

    fn insert_flow(&self, flow: &Flow) -> Result<(), StoreError> {
        self.db.writer()?.execute(
            "INSERT INTO flow(id, workspace_id, version_parent_id, name, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                flow.id,
                flow.workspace_id,
                flow.version_parent_id,
                flow.name,
                flow.updated_at
            ],
        )?;
        Ok(())
    }

    fn query_flows(&self, filter: &str, id: Id) -> Result<Vec<Flow>, StoreError> {
        let conn = self.db.reader()?;
        let sql = format!("SELECT {FLOW_COLUMNS} FROM flow {filter} ORDER BY id ASC");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![id], read_flow)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Bumps `updated_at` so streaming readers see graph edits.
    fn touch(&self, flow_id: Id) -> Result<(), StoreError> {
        self.db.writer()?.execute(
            "UPDATE flow SET updated_at=?2 WHERE id=?1",
            params![flow_id, now_ms()],
        )?;
        Ok(())
    }
}
