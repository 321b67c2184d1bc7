#![forbid(unsafe_code)]

use crate::error::CoreError;
use crate::ids::Id;
use serde::{Deserialize, Serialize};

/// Runtime state of a node, an edge, or a node execution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    #[default]
    Unspecified,
    Running,
    Success,
    Failure,
    Canceled,
}

impl NodeState {
    pub const ALL: [NodeState; 5] = [
        NodeState::Unspecified,
        NodeState::Running,
        NodeState::Success,
        NodeState::Failure,
        NodeState::Canceled,
    ];
    pub const MAX: i64 = (Self::ALL.len() - 1) as i64;

    pub fn as_i64(self) -> i64 {
        match self {
            Self::Unspecified => 0,
            Self::Running => 1,
            Self::Success => 2,
            Self::Failure => 3,
            Self::Canceled => 4,
        }
    }

    /// Range guard for values arriving from the wire or from storage.
    pub fn try_from_i64(value: i64) -> Result<Self, CoreError> {
        usize::try_from(value)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .ok_or(CoreError::InvalidState {
                field: "state",
                value,
                max: Self::MAX,
            })
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Canceled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Canceled => "canceled",
        }
    }
}

/// Output port of a source node.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EdgeHandle {
    #[default]
    Unspecified,
    Then,
    Else,
    Loop,
    AiProvider,
    AiMemory,
    AiTools,
}

impl EdgeHandle {
    /// Every handle in declaration order. Traversals iterate this list, so a
    /// new variant is picked up without touching them.
    pub const ALL: [EdgeHandle; 7] = [
        EdgeHandle::Unspecified,
        EdgeHandle::Then,
        EdgeHandle::Else,
        EdgeHandle::Loop,
        EdgeHandle::AiProvider,
        EdgeHandle::AiMemory,
        EdgeHandle::AiTools,
    ];
    pub const MAX: i64 = (Self::ALL.len() - 1) as i64;

    pub fn iter() -> impl Iterator<Item = EdgeHandle> {
        Self::ALL.into_iter()
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Self::Unspecified => 0,
            Self::Then => 1,
            Self::Else => 2,
            Self::Loop => 3,
            Self::AiProvider => 4,
            Self::AiMemory => 5,
            Self::AiTools => 6,
        }
    }

    pub fn try_from_i64(value: i64) -> Result<Self, CoreError> {
        usize::try_from(value)
            .ok()
            .and_then(|index| Self::ALL.get(index).copied())
            .ok_or(CoreError::InvalidState {
                field: "source_handle",
                value,
                max: Self::MAX,
            })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    ManualStart,
    Request,
    Condition,
    For,
    ForEach,
    Js,
    Ai,
    AiProvider,
    AiMemory,
}

impl NodeKind {
    pub const ALL: [NodeKind; 9] = [
        NodeKind::ManualStart,
        NodeKind::Request,
        NodeKind::Condition,
        NodeKind::For,
        NodeKind::ForEach,
        NodeKind::Js,
        NodeKind::Ai,
        NodeKind::AiProvider,
        NodeKind::AiMemory,
    ];

    pub fn as_i64(self) -> i64 {
        match self {
            Self::ManualStart => 1,
            Self::Request => 2,
            Self::Condition => 3,
            Self::For => 4,
            Self::ForEach => 5,
            Self::Js => 6,
            Self::Ai => 7,
            Self::AiProvider => 8,
            Self::AiMemory => 9,
        }
    }

    pub fn try_from_i64(value: i64) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_i64() == value)
            .ok_or(CoreError::InvalidArgument("unknown node kind"))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ManualStart => "manual_start",
            Self::Request => "request",
            Self::Condition => "condition",
            Self::For => "for",
            Self::ForEach => "for_each",
            Self::Js => "js",
            Self::Ai => "ai",
            Self::AiProvider => "ai_provider",
            Self::AiMemory => "ai_memory",
        }
    }
}

/// What a loop node does when one iteration fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Fail the loop node.
    #[default]
    Fail,
    /// Keep iterating.
    Ignore,
    /// Stop iterating and continue on the `then` handle.
    Break,
}

impl ErrorPolicy {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Fail => 0,
            Self::Ignore => 1,
            Self::Break => 2,
        }
    }

    pub fn try_from_i64(value: i64) -> Result<Self, CoreError> {
        match value {
            0 => Ok(Self::Fail),
            1 => Ok(Self::Ignore),
            2 => Ok(Self::Break),
            _ => Err(CoreError::InvalidArgument("unknown error policy")),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPayload {
    pub endpoint_id: Option<Id>,
    pub example_id: Option<Id>,
    pub delta_example_id: Option<Id>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionPayload {
    pub expression: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForPayload {
    pub iterations: i64,
    /// Optional early-exit expression evaluated by the handler.
    pub condition: String,
    pub error_policy: ErrorPolicy,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForEachPayload {
    pub iter_expression: String,
    pub condition: String,
    pub error_policy: ErrorPolicy,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsPayload {
    pub code: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiPayload {
    pub prompt: String,
    pub max_iterations: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AiProviderPayload {
    pub provider: String,
    pub model: String,
    pub temperature: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiMemoryPayload {
    pub memory_kind: String,
    pub window_size: i64,
}

/// Kind-specific half of a node, stored one-to-one with the base row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodePayload {
    ManualStart,
    Request(RequestPayload),
    Condition(ConditionPayload),
    For(ForPayload),
    ForEach(ForEachPayload),
    Js(JsPayload),
    Ai(AiPayload),
    AiProvider(AiProviderPayload),
    AiMemory(AiMemoryPayload),
}

impl NodePayload {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::ManualStart => NodeKind::ManualStart,
            Self::Request(_) => NodeKind::Request,
            Self::Condition(_) => NodeKind::Condition,
            Self::For(_) => NodeKind::For,
            Self::ForEach(_) => NodeKind::ForEach,
            Self::Js(_) => NodeKind::Js,
            Self::Ai(_) => NodeKind::Ai,
            Self::AiProvider(_) => NodeKind::AiProvider,
            Self::AiMemory(_) => NodeKind::AiMemory,
        }
    }
}
