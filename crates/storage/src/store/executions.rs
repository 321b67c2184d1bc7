#![forbid(unsafe_code)]

use super::db::bound_service;
use super::{Db, StoreError};
use rusqlite::{OptionalExtension, Row, params};
use serde_json::Value;
use wb_core::flow::{NodeExecution, NodeState};
use wb_core::time::now_ms;
use wb_core::{Id, codec};

/// Terminal update for a running execution. `state` arrives as the raw wire
/// value and is range-checked first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CompleteExecution {
    pub state: i64,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub response_id: Option<Id>,
    pub graphql_response_id: Option<Id>,
}

const EXECUTION_COLUMNS: &str = "id, node_id, name, state, error, input_data, input_codec, \
     output_data, output_codec, response_id, graphql_response_id, completed_at";

fn read_execution(row: &Row<'_>) -> rusqlite::Result<NodeExecution> {
    let state = row.get::<_, i64>(3)?;
    let state = NodeState::try_from_i64(state).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Integer, Box::new(err))
    })?;
    Ok(NodeExecution {
        id: row.get(0)?,
        node_id: row.get(1)?,
        name: row.get(2)?,
        state,
        error: row.get(4)?,
        input_data: row.get(5)?,
        input_codec: row.get(6)?,
        output_data: row.get(7)?,
        output_codec: row.get(8)?,
        response_id: row.get(9)?,
        graphql_response_id: row.get(10)?,
        completed_at: row.get(11)?,
    })
}

/// Node-execution records. A row starts `running` and moves once to a
/// terminal state.
#[derive(Clone, Debug)]
pub struct ExecutionStore<'a> {
    db: Db<'a>,
}

bound_service!(ExecutionStore);

impl ExecutionStore<'_> {
    /// Inserts a running row with the node name snapshotted and the input
    /// stored through the compression policy.
    pub fn begin_execution(
        &self,
        node_id: Id,
        name: &str,
        input: &Value,
    ) -> Result<NodeExecution, StoreError> {
        let conn = self.db.writer()?;
        let node: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM flow_node WHERE id=?1",
                params![node_id],
                |row| row.get(0),
            )
            .optional()?;
        if node.is_none() {
            return Err(StoreError::ParentNotFound("node"));
        }
        let bytes = serde_json::to_vec(input)
            .map_err(|_| StoreError::InvalidArgument("input is not serializable"))?;
        let (input_data, input_codec) = codec::set_compressed(&bytes);
        let execution = NodeExecution {
            id: Id::new_now(),
            node_id,
            name: name.to_string(),
            state: NodeState::Running,
            error: None,
            input_data,
            input_codec,
            output_data: None,
            output_codec: Default::default(),
            response_id: None,
            graphql_response_id: None,
            completed_at: None,
        };
        self.write(&execution, false)?;
        Ok(execution)
    }

    /// The single allowed transition: running to success, failure or
    /// canceled.
    pub fn complete_execution(
        &self,
        id: Id,
        update: CompleteExecution,
    ) -> Result<NodeExecution, StoreError> {
        let state = NodeState::try_from_i64(update.state)?;
        if !state.is_terminal() {
            return Err(StoreError::InvalidArgument(
                "completion state must be success, failure or canceled",
            ));
        }
        self.db.writer()?;
        let mut execution = self.get(id)?;
        if execution.state != NodeState::Running {
            return Err(StoreError::InvalidArgument("execution already completed"));
        }
        if let Some(output) = &update.output {
            let bytes = serde_json::to_vec(output)
                .map_err(|_| StoreError::InvalidArgument("output is not serializable"))?;
            let (data, output_codec) = codec::set_compressed(&bytes);
            execution.output_data = Some(data);
            execution.output_codec = output_codec;
        }
        execution.state = state;
        execution.error = update.error;
        execution.response_id = update.response_id;
        execution.graphql_response_id = update.graphql_response_id;
        execution.completed_at = Some(now_ms());
        execution.validate_lifecycle()?;
        self.write(&execution, true)?;
        Ok(execution)
    }

    pub fn get(&self, id: Id) -> Result<NodeExecution, StoreError> {
        let conn = self.db.reader()?;
        let sql = format!("SELECT {EXECUTION_COLUMNS} FROM node_execution WHERE id=?1");
        conn.query_row(&sql, params![id], read_execution)
            .optional()?
            .ok_or(StoreError::NotFound("execution"))
    }

    /// Most recent execution of a node. Ids are time ordered.
    pub fn latest_execution(&self, node_id: Id) -> Result<Option<NodeExecution>, StoreError> {
        let conn = self.db.reader()?;
        let sql = format!(
            "SELECT {EXECUTION_COLUMNS} FROM node_execution WHERE node_id=?1 \
             ORDER BY id DESC LIMIT 1"
        );
        Ok(conn
            .query_row(&sql, params![node_id], read_execution)
            .optional()?)
    }

    /// Every execution of a node, oldest first.
    pub fn executions(&self, node_id: Id) -> Result<Vec<NodeExecution>, StoreError> {
        let conn = self.db.reader()?;
        let sql = format!(
            "SELECT {EXECUTION_COLUMNS} FROM node_execution WHERE node_id=?1 ORDER BY id ASC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![node_id], read_execution)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Insert-or-replace keyed by the execution id. A finished row never
    /// goes back to running.
    pub fn upsert_execution(&self, execution: &NodeExecution) -> Result<(), StoreError> {
        execution.validate_lifecycle()?;
        let stored: Option<i64> = self
            .db
            .writer()?
            .query_row(
                "SELECT state FROM node_execution WHERE id=?1",
                params![execution.id],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(state) = stored {
            if NodeState::try_from_i64(state)?.is_terminal()
                && execution.state == NodeState::Running
            {
                return Err(StoreError::InvalidArgument(
                    "completed execution cannot return to running",
                ));
            }
        }
        self.write(execution, true)
    }

    /// Deletes every execution of the given nodes. Returns the row count.
    pub fn delete_executions(&self, node_ids: &[Id]) -> Result<usize, StoreError> {
        let conn = self.db.writer()?;
        let mut stmt = conn.prepare("DELETE FROM node_execution WHERE node_id=?1")?;
        let mut deleted = 0;
        for node_id in node_ids {
            self.db.check_cancel()?;
            deleted += stmt.execute(params![node_id])?;
        }
        Ok(deleted)
    }

    fn write(&self, execution: &NodeExecution, upsert: bool) -> Result<(), StoreError> {
        let conn = self.db.writer()?;
        let conflict = if upsert {
            " ON CONFLICT(id) DO UPDATE SET \
               node_id=excluded.node_id, name=excluded.name, state=excluded.state, \
               error=excluded.error, input_data=excluded.input_data, \
               input_codec=excluded.input_codec, output_data=excluded.output_data, \
               output_codec=excluded.output_codec, response_id=excluded.response_id, \
               graphql_response_id=excluded.graphql_response_id, \
               completed_at=excluded.completed_at"
        } else {
            ""
        };
        let sql = format!(
            "INSERT INTO node_execution({EXECUTION_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12){conflict}"
        );
        conn.execute(
            &sql,
            params![
                execution.id,
                execution.node_id,
                execution.name,
                execution.state.as_i64(),
                execution.error,
                execution.input_data,
                execution.input_codec,
                execution.output_data,
                execution.output_codec,
                execution.response_id,
                execution.graphql_response_id,
                execution.completed_at
            ],
        )?;
        Ok(())
    }
}
