#![forbid(unsafe_code)]

//! Flow graph data model: flows, typed nodes, handle-tagged edges, variables
//! and node-execution records.

mod graph;
mod kinds;

pub use graph::*;
pub use kinds::*;

use crate::codec::{self, Codec};
use crate::error::CoreError;
use crate::ids::Id;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Flow {
    pub id: Id,
    pub workspace_id: Id,
    pub name: String,
    /// Set on version snapshots; points at the live flow they were taken from.
    pub version_parent_id: Option<Id>,
    pub updated_at: i64,
}

impl Flow {
    pub fn is_version(&self) -> bool {
        self.version_parent_id.is_some()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: Id,
    pub flow_id: Id,
    pub name: String,
    pub position: Position,
    pub state: NodeState,
    pub payload: NodePayload,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        self.payload.kind()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: Id,
    pub flow_id: Id,
    pub source_id: Id,
    pub target_id: Id,
    pub handle: EdgeHandle,
    pub state: NodeState,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlowVariable {
    pub id: Id,
    pub flow_id: Id,
    pub name: String,
    pub value: String,
    pub enabled: bool,
    pub description: String,
    /// Sort key among the variables of one flow.
    pub order: f64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeExecution {
    pub id: Id,
    pub node_id: Id,
    /// Node name at the time the execution started.
    pub name: String,
    pub state: NodeState,
    pub error: Option<String>,
    pub input_data: Vec<u8>,
    pub input_codec: Codec,
    pub output_data: Option<Vec<u8>>,
    pub output_codec: Codec,
    pub response_id: Option<Id>,
    pub graphql_response_id: Option<Id>,
    pub completed_at: Option<i64>,
}

impl NodeExecution {
    pub fn input_bytes(&self) -> Result<Vec<u8>, CoreError> {
        codec::decompress(&self.input_data, self.input_codec)
    }

    pub fn output_bytes(&self) -> Result<Option<Vec<u8>>, CoreError> {
        self.output_data
            .as_deref()
            .map(|data| codec::decompress(data, self.output_codec))
            .transpose()
    }

    pub fn input_json(&self) -> Result<serde_json::Value, CoreError> {
        let bytes = self.input_bytes()?;
        serde_json::from_slice(&bytes).map_err(|_| CoreError::InvalidArgument("input is not json"))
    }

    pub fn output_json(&self) -> Result<Option<serde_json::Value>, CoreError> {
        match self.output_bytes()? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|_| CoreError::InvalidArgument("output is not json")),
            None => Ok(None),
        }
    }

    /// Running rows have no completion time; completed rows carry one and a
    /// terminal state.
    pub fn validate_lifecycle(&self) -> Result<(), CoreError> {
        match (self.state, self.completed_at) {
            (NodeState::Running, None) => Ok(()),
            (state, Some(_)) if state.is_terminal() => Ok(()),
            (NodeState::Running, Some(_)) => Err(CoreError::InvalidArgument(
                "running execution must not have completed_at",
            )),
            (state, None) if state.is_terminal() => Err(CoreError::InvalidArgument(
                "completed execution requires completed_at",
            )),
            _ => Err(CoreError::InvalidArgument(
                "execution state must be running or terminal",
            )),
        }
    }
}
