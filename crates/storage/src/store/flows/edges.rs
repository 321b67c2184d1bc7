#![forbid(unsafe_code)]

use super::FlowStore;
use crate::store::StoreError;
use rusqlite::params;
use wb_core::Id;
use wb_core::flow::{Edge, EdgeHandle, EdgeIndex, NodeState};

impl FlowStore<'_> {
    /// Wires `source -> target` on `handle`. Both nodes must belong to
    /// `flow_id`; self loops and edges closing a cycle are refused.
    pub fn create_edge(
        &self,
        flow_id: Id,
        source_id: Id,
        target_id: Id,
        handle: EdgeHandle,
    ) -> Result<Edge, StoreError> {
        let conn = self.db.writer()?;
        if self.node_flow(source_id)? != flow_id || self.node_flow(target_id)? != flow_id {
            return Err(StoreError::InvalidArgument(
                "edge endpoints must belong to the flow",
            ));
        }
        if source_id == target_id {
            return Err(StoreError::InvalidArgument("edge cannot loop on one node"));
        }
        let existing = self.edges(flow_id)?;
        if EdgeIndex::from_edges(&existing).would_create_cycle(source_id, target_id) {
            return Err(StoreError::InvalidArgument("edge would create a cycle"));
        }
        let edge = Edge {
            id: Id::new_now(),
            flow_id,
            source_id,
            target_id,
            handle,
            state: NodeState::Unspecified,
        };
        conn.execute(
            "INSERT INTO flow_edge(id, flow_id, source_id, target_id, source_handle, state) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                edge.id,
                edge.flow_id,
                edge.source_id,
                edge.target_id,
                edge.handle.as_i64(),
                edge.state.as_i64()
            ],
        )?;
        self.touch(flow_id)?;
        Ok(edge)
    }

    pub fn edges(&self, flow_id: Id) -> Result<Vec<Edge>, StoreError> {
        let conn = self.db.reader()?;
        let mut stmt = conn.prepare(
            "SELECT id, flow_id, source_id, target_id, source_handle, state \
             FROM flow_edge WHERE flow_id=?1 ORDER BY id ASC",
        )?;
        let mut rows = stmt.query(params![flow_id])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(Edge {
                id: row.get(0)?,
                flow_id: row.get(1)?,
                source_id: row.get(2)?,
                target_id: row.get(3)?,
                handle: EdgeHandle::try_from_i64(row.get(4)?)?,
                state: NodeState::try_from_i64(row.get(5)?)?,
            });
        }
        Ok(out)
    }

    /// Range-checked before the row is touched.
    pub fn set_edge_state(&self, id: Id, state: i64) -> Result<NodeState, StoreError> {
        let state = NodeState::try_from_i64(state)?;
        let changed = self.db.writer()?.execute(
            "UPDATE flow_edge SET state=?2 WHERE id=?1",
            params![id, state.as_i64()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound("edge"));
        }
        Ok(state)
    }

    pub fn delete_edge(&self, id: Id) -> Result<(), StoreError> {
        let conn = self.db.writer()?;
        let changed = conn.execute("DELETE FROM flow_edge WHERE id=?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::NotFound("edge"));
        }
        Ok(())
    }
}
