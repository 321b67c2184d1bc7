#![forbid(unsafe_code)]

use super::FlowStore;
use crate::store::StoreError;
use rusqlite::{Connection, OptionalExtension, params};
use wb_core::flow::{
    AiMemoryPayload, AiPayload, AiProviderPayload, ConditionPayload, ErrorPolicy, ForEachPayload,
    ForPayload, JsPayload, Node, NodeKind, NodePayload, NodeState, Position, RequestPayload,
};
use wb_core::{Codec, CoreError, Id, codec};

impl FlowStore<'_> {
    /// Writes the base node row and its kind-specific payload row.
    pub fn create_node(
        &self,
        flow_id: Id,
        name: &str,
        position: Position,
        payload: NodePayload,
    ) -> Result<Node, StoreError> {
        let conn = self.db.writer()?;
        self.get_flow(flow_id)?;
        let node = Node {
            id: Id::new_now(),
            flow_id,
            name: name.trim().to_string(),
            position,
            state: NodeState::Unspecified,
            payload,
        };
        conn.execute(
            "INSERT INTO flow_node(id, flow_id, name, kind, position_x, position_y, state) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                node.id,
                node.flow_id,
                node.name,
                node.kind().as_i64(),
                node.position.x,
                node.position.y,
                node.state.as_i64()
            ],
        )?;
        write_payload(conn, node.id, &node.payload)?;
        self.touch(flow_id)?;
        Ok(node)
    }

    pub fn get_node(&self, id: Id) -> Result<Node, StoreError> {
        let conn = self.db.reader()?;
        let base = conn
            .query_row(
                "SELECT id, flow_id, name, kind, position_x, position_y, state \
                 FROM flow_node WHERE id=?1",
                params![id],
                read_base,
            )
            .optional()?
            .ok_or(StoreError::NotFound("node"))?;
        base.into_node(conn)
    }

    pub fn nodes(&self, flow_id: Id) -> Result<Vec<Node>, StoreError> {
        let conn = self.db.reader()?;
        let mut stmt = conn.prepare(
            "SELECT id, flow_id, name, kind, position_x, position_y, state \
             FROM flow_node WHERE flow_id=?1 ORDER BY id ASC",
        )?;
        let bases = stmt
            .query_map(params![flow_id], read_base)?
            .collect::<Result<Vec<_>, _>>()?;
        bases.into_iter().map(|base| base.into_node(conn)).collect()
    }

    pub fn update_node_position(&self, id: Id, position: Position) -> Result<(), StoreError> {
        let flow_id = self.node_flow(id)?;
        self.db.writer()?.execute(
            "UPDATE flow_node SET position_x=?2, position_y=?3 WHERE id=?1",
            params![id, position.x, position.y],
        )?;
        self.touch(flow_id)
    }

    /// Range-checked before the row is touched.
    pub fn set_node_state(&self, id: Id, state: i64) -> Result<NodeState, StoreError> {
        let state = NodeState::try_from_i64(state)?;
        let conn = self.db.writer()?;
        let changed = conn.execute(
            "UPDATE flow_node SET state=?2 WHERE id=?1",
            params![id, state.as_i64()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound("node"));
        }
        Ok(state)
    }

    /// Deletes the node with its payload, its executions and every edge
    /// touching it.
    pub fn delete_node(&self, id: Id) -> Result<(), StoreError> {
        let flow_id = self.node_flow(id)?;
        let conn = self.db.writer()?;
        conn.execute(
            "DELETE FROM flow_edge WHERE source_id=?1 OR target_id=?1",
            params![id],
        )?;
        conn.execute("DELETE FROM node_execution WHERE node_id=?1", params![id])?;
        conn.execute("DELETE FROM flow_node WHERE id=?1", params![id])?;
        self.touch(flow_id)
    }

    pub(super) fn node_flow(&self, id: Id) -> Result<Id, StoreError> {
        self.db
            .reader()?
            .query_row(
                "SELECT flow_id FROM flow_node WHERE id=?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::NotFound("node"))
    }
}

struct NodeBase {
    id: Id,
    flow_id: Id,
    name: String,
    kind: i64,
    position: Position,
    state: i64,
}

fn read_base(row: &rusqlite::Row<'_>) -> rusqlite::Result<NodeBase> {
    Ok(NodeBase {
        id: row.get(0)?,
        flow_id: row.get(1)?,
        name: row.get(2)?,
        kind: row.get(3)?,
        position: Position {
            x: row.get(4)?,
            y: row.get(5)?,
        },
        state: row.get(6)?,
    })
}

impl NodeBase {
    fn into_node(self, conn: &Connection) -> Result<Node, StoreError> {
        let kind = NodeKind::try_from_i64(self.kind)?;
        Ok(Node {
            payload: read_payload(conn, self.id, kind)?,
            id: self.id,
            flow_id: self.flow_id,
            name: self.name,
            position: self.position,
            state: NodeState::try_from_i64(self.state)?,
        })
    }
}

fn write_payload(conn: &Connection, node_id: Id, payload: &NodePayload) -> Result<(), StoreError> {
    match payload {
        NodePayload::ManualStart => {}
        NodePayload::Request(request) => {
            conn.execute(
                "INSERT INTO flow_node_request(node_id, endpoint_id, example_id, delta_example_id) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    node_id,
                    request.endpoint_id,
                    request.example_id,
                    request.delta_example_id
                ],
            )?;
        }
        NodePayload::Condition(condition) => {
            conn.execute(
                "INSERT INTO flow_node_condition(node_id, expression) VALUES (?1, ?2)",
                params![node_id, condition.expression],
            )?;
        }
        NodePayload::For(for_loop) => {
            if for_loop.iterations < 0 {
                return Err(StoreError::InvalidArgument(
                    "iterations must not be negative",
                ));
            }
            conn.execute(
                "INSERT INTO flow_node_for(node_id, iterations, condition, error_policy) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    node_id,
                    for_loop.iterations,
                    for_loop.condition,
                    for_loop.error_policy.as_i64()
                ],
            )?;
        }
        NodePayload::ForEach(for_each) => {
            conn.execute(
                "INSERT INTO flow_node_for_each(node_id, iter_expression, condition, error_policy) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    node_id,
                    for_each.iter_expression,
                    for_each.condition,
                    for_each.error_policy.as_i64()
                ],
            )?;
        }
        NodePayload::Js(js) => {
            let (code, code_codec) = codec::set_compressed(js.code.as_bytes());
            conn.execute(
                "INSERT INTO flow_node_js(node_id, code, code_codec) VALUES (?1, ?2, ?3)",
                params![node_id, code, code_codec],
            )?;
        }
        NodePayload::Ai(ai) => {
            conn.execute(
                "INSERT INTO flow_node_ai(node_id, prompt, max_iterations) VALUES (?1, ?2, ?3)",
                params![node_id, ai.prompt, ai.max_iterations],
            )?;
        }
        NodePayload::AiProvider(provider) => {
            conn.execute(
                "INSERT INTO flow_node_ai_provider(node_id, provider, model, temperature) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    node_id,
                    provider.provider,
                    provider.model,
                    provider.temperature
                ],
            )?;
        }
        NodePayload::AiMemory(memory) => {
            conn.execute(
                "INSERT INTO flow_node_ai_memory(node_id, memory_kind, window_size) \
                 VALUES (?1, ?2, ?3)",
                params![node_id, memory.memory_kind, memory.window_size],
            )?;
        }
    }
    Ok(())
}

fn read_payload(conn: &Connection, node_id: Id, kind: NodeKind) -> Result<NodePayload, StoreError> {
    let missing = || StoreError::NotFound("node payload");
    let payload = match kind {
        NodeKind::ManualStart => NodePayload::ManualStart,
        NodeKind::Request => conn
            .query_row(
                "SELECT endpoint_id, example_id, delta_example_id FROM flow_node_request \
                 WHERE node_id=?1",
                params![node_id],
                |row| {
                    Ok(RequestPayload {
                        endpoint_id: row.get(0)?,
                        example_id: row.get(1)?,
                        delta_example_id: row.get(2)?,
                    })
                },
            )
            .optional()?
            .map(NodePayload::Request)
            .ok_or_else(missing)?,
        NodeKind::Condition => conn
            .query_row(
                "SELECT expression FROM flow_node_condition WHERE node_id=?1",
                params![node_id],
                |row| {
                    Ok(ConditionPayload {
                        expression: row.get(0)?,
                    })
                },
            )
            .optional()?
            .map(NodePayload::Condition)
            .ok_or_else(missing)?,
        NodeKind::For => {
            let row = conn
                .query_row(
                    "SELECT iterations, condition, error_policy FROM flow_node_for \
                     WHERE node_id=?1",
                    params![node_id],
                    |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, i64>(2)?,
                        ))
                    },
                )
                .optional()?
                .ok_or_else(missing)?;
            NodePayload::For(ForPayload {
                iterations: row.0,
                condition: row.1,
                error_policy: ErrorPolicy::try_from_i64(row.2)?,
            })
        }
        NodeKind::ForEach => {
            let row = conn
                .query_row(
                    "SELECT iter_expression, condition, error_policy FROM flow_node_for_each \
                     WHERE node_id=?1",
                    params![node_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, i64>(2)?,
                        ))
                    },
                )
                .optional()?
                .ok_or_else(missing)?;
            NodePayload::ForEach(ForEachPayload {
                iter_expression: row.0,
                condition: row.1,
                error_policy: ErrorPolicy::try_from_i64(row.2)?,
            })
        }
        NodeKind::Js => {
            let (code, code_codec) = conn
                .query_row(
                    "SELECT code, code_codec FROM flow_node_js WHERE node_id=?1",
                    params![node_id],
                    |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Codec>(1)?)),
                )
                .optional()?
                .ok_or_else(missing)?;
            let code = codec::decompress(&code, code_codec)?;
            let code = String::from_utf8(code)
                .map_err(|_| CoreError::InvalidArgument("js code is not utf-8"))?;
            NodePayload::Js(JsPayload { code })
        }
        NodeKind::Ai => conn
            .query_row(
                "SELECT prompt, max_iterations FROM flow_node_ai WHERE node_id=?1",
                params![node_id],
                |row| {
                    Ok(AiPayload {
                        prompt: row.get(0)?,
                        max_iterations: row.get(1)?,
                    })
                },
            )
            .optional()?
            .map(NodePayload::Ai)
            .ok_or_else(missing)?,
        NodeKind::AiProvider => conn
            .query_row(
                "SELECT provider, model, temperature FROM flow_node_ai_provider WHERE node_id=?1",
                params![node_id],
                |row| {
                    Ok(AiProviderPayload {
                        provider: row.get(0)?,
                        model: row.get(1)?,
                        temperature: row.get(2)?,
                    })
                },
            )
            .optional()?
            .map(NodePayload::AiProvider)
            .ok_or_else(missing)?,
        NodeKind::AiMemory => conn
            .query_row(
                "SELECT memory_kind, window_size FROM flow_node_ai_memory WHERE node_id=?1",
                params![node_id],
                |row| {
                    Ok(AiMemoryPayload {
                        memory_kind: row.get(0)?,
                        window_size: row.get(1)?,
                    })
                },
            )
            .optional()?
            .map(NodePayload::AiMemory)
            .ok_or_else(missing)?,
    };
    Ok(payload)
}
