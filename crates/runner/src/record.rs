#![forbid(unsafe_code)]

use crate::RunError;
use serde_json::Value;
use wb_core::Id;
use wb_core::flow::{Node, NodeState};
use wb_storage::{CompleteExecution, SqliteStore, StoreError};

/// Writes execution rows and node states for one run, one short transaction
/// per transition. Runs on the scheduling thread only.
/// No cancel token is attached; canceled nodes still get terminal rows.
pub(crate) struct Recorder<'s> {
    store: &'s SqliteStore,
}

impl<'s> Recorder<'s> {
    pub(crate) fn new(store: &'s SqliteStore) -> Self {
        Self { store }
    }

    /// Running row plus node state. Returns the execution id.
    pub(crate) fn begin(&self, node: &Node, input: &Value) -> Result<Id, RunError> {
        let tx = self.store.begin()?;
        let execution = self
            .store
            .executions()
            .with_tx(&tx)
            .begin_execution(node.id, &node.name, input)?;
        self.store
            .flows()
            .with_tx(&tx)
            .set_node_state(node.id, NodeState::Running.as_i64())?;
        tx.commit().map_err(StoreError::from)?;
        tracing::debug!(node_id = %node.id, node = %node.name, "node running");
        Ok(execution.id)
    }

    pub(crate) fn complete(
        &self,
        node: &Node,
        execution_id: Id,
        state: NodeState,
        output: Option<Value>,
        error: Option<String>,
    ) -> Result<(), RunError> {
        let tx = self.store.begin()?;
        self.store.executions().with_tx(&tx).complete_execution(
            execution_id,
            CompleteExecution {
                state: state.as_i64(),
                output,
                error: error.clone(),
                ..CompleteExecution::default()
            },
        )?;
        self.store
            .flows()
            .with_tx(&tx)
            .set_node_state(node.id, state.as_i64())?;
        tx.commit().map_err(StoreError::from)?;
        match state {
            NodeState::Failure => tracing::warn!(
                node_id = %node.id,
                node = %node.name,
                error = error.as_deref().unwrap_or(""),
                "node failed"
            ),
            NodeState::Canceled => {
                tracing::warn!(node_id = %node.id, node = %node.name, "node canceled")
            }
            _ => tracing::debug!(
                node_id = %node.id,
                node = %node.name,
                state = state.as_str(),
                "node finished"
            ),
        }
        Ok(())
    }

    /// A node that never started: running and canceled in one go.
    pub(crate) fn cancel_unstarted(&self, node: &Node, input: &Value) -> Result<(), RunError> {
        let execution_id = self.begin(node, input)?;
        self.complete(node, execution_id, NodeState::Canceled, None, None)
    }
}
