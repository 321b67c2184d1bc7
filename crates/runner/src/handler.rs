#![forbid(unsafe_code)]

use crate::HandlerError;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use wb_core::CancelToken;
use wb_core::flow::{Node, NodeKind};

/// Position inside a `for` / `for-each` loop body.
#[derive(Clone, Debug, PartialEq)]
pub struct Iteration {
    pub index: usize,
    /// The current element for `for-each`; the index as a number for `for`.
    pub item: Value,
}

/// What a handler sees for one node run.
#[derive(Debug)]
pub struct NodeContext<'a> {
    pub node: &'a Node,
    /// Output of the node that activated this one. A join receives an object
    /// keyed by predecessor name.
    pub input: &'a Value,
    /// Enabled flow variables, by name.
    pub variables: &'a BTreeMap<String, String>,
    pub iteration: Option<&'a Iteration>,
    pub cancel: &'a CancelToken,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeOutput {
    pub value: Value,
    /// Condition nodes pick `then` (true) or `else` (false).
    pub branch: Option<bool>,
    /// For-each nodes list the elements to iterate.
    pub items: Option<Vec<Value>>,
}

impl NodeOutput {
    pub fn value(value: Value) -> Self {
        Self {
            value,
            ..Self::default()
        }
    }

    pub fn branch(value: Value, branch: bool) -> Self {
        Self {
            value,
            branch: Some(branch),
            items: None,
        }
    }

    pub fn items(items: Vec<Value>) -> Self {
        Self {
            value: Value::Array(items.clone()),
            branch: None,
            items: Some(items),
        }
    }
}

/// Work for one node kind: an HTTP request, a script, an AI call. Handlers
/// run on worker threads and should return promptly once `cancel` fires.
pub trait NodeHandler: Send + Sync {
    fn run(&self, ctx: &NodeContext<'_>) -> Result<NodeOutput, HandlerError>;
}

impl<F> NodeHandler for F
where
    F: Fn(&NodeContext<'_>) -> Result<NodeOutput, HandlerError> + Send + Sync,
{
    fn run(&self, ctx: &NodeContext<'_>) -> Result<NodeOutput, HandlerError> {
        self(ctx)
    }
}

#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<NodeKind, Box<dyn NodeHandler>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&str> = self.handlers.keys().map(|kind| kind.as_str()).collect();
        kinds.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any handler already registered for `kind`.
    pub fn register(&mut self, kind: NodeKind, handler: impl NodeHandler + 'static) {
        self.handlers.insert(kind, Box::new(handler));
    }

    pub fn with(mut self, kind: NodeKind, handler: impl NodeHandler + 'static) -> Self {
        self.register(kind, handler);
        self
    }

    pub fn get(&self, kind: NodeKind) -> Option<&dyn NodeHandler> {
        self.handlers.get(&kind).map(|handler| handler.as_ref())
    }

    pub fn contains(&self, kind: NodeKind) -> bool {
        self.handlers.contains_key(&kind)
    }
}
