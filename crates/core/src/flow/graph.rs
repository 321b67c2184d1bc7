#![forbid(unsafe_code)]

use super::{Edge, EdgeHandle, Flow, Node, NodeKind};
use crate::error::CoreError;
use crate::ids::Id;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Relative order of two nodes in a flow graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reachability {
    /// `from` reaches `to`.
    Before,
    /// `to` reaches `from`.
    After,
    Unrelated,
}

/// `source -> handle -> [target]`, the only shape graph traversals use.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EdgeIndex {
    by_source: HashMap<Id, HashMap<EdgeHandle, Vec<Id>>>,
}

impl EdgeIndex {
    pub fn from_edges<'a>(edges: impl IntoIterator<Item = &'a Edge>) -> Self {
        let mut index = Self::default();
        for edge in edges {
            index.insert(edge.source_id, edge.handle, edge.target_id);
        }
        index
    }

    pub fn insert(&mut self, source: Id, handle: EdgeHandle, target: Id) {
        self.by_source
            .entry(source)
            .or_default()
            .entry(handle)
            .or_default()
            .push(target);
    }

    pub fn successors(&self, source: Id, handle: EdgeHandle) -> &[Id] {
        self.by_source
            .get(&source)
            .and_then(|handles| handles.get(&handle))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every direct successor over all handles, in handle declaration order.
    pub fn all_successors(&self, source: Id) -> Vec<Id> {
        let Some(handles) = self.by_source.get(&source) else {
            return Vec::new();
        };
        EdgeHandle::iter()
            .filter_map(|handle| handles.get(&handle))
            .flatten()
            .copied()
            .collect()
    }

    /// Breadth-first search from `from`; true when `to` is strictly downstream.
    pub fn reaches(&self, from: Id, to: Id) -> bool {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(from);
        queue.push_back(from);
        while let Some(current) = queue.pop_front() {
            for next in self.all_successors(current) {
                if next == to {
                    return true;
                }
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        false
    }

    pub fn reachability(&self, from: Id, to: Id) -> Reachability {
        if from == to {
            return Reachability::Unrelated;
        }
        if self.reaches(from, to) {
            return Reachability::Before;
        }
        if self.reaches(to, from) {
            return Reachability::After;
        }
        Reachability::Unrelated
    }

    /// An edge `source -> target` closes a cycle when target already reaches
    /// source, or when it is a self loop.
    pub fn would_create_cycle(&self, source: Id, target: Id) -> bool {
        source == target || self.reaches(target, source)
    }

    pub fn predecessors(&self, target: Id) -> Vec<(Id, EdgeHandle)> {
        let mut out: Vec<(Id, EdgeHandle)> = self
            .by_source
            .iter()
            .flat_map(|(source, handles)| {
                handles
                    .iter()
                    .filter(|(_, targets)| targets.contains(&target))
                    .map(|(handle, _)| (*source, *handle))
            })
            .collect();
        out.sort();
        out
    }
}

/// A flow with its nodes and edges loaded and indexed.
#[derive(Clone, Debug)]
pub struct FlowGraph {
    pub flow: Flow,
    pub nodes: BTreeMap<Id, Node>,
    pub edges: Vec<Edge>,
    pub index: EdgeIndex,
}

impl FlowGraph {
    pub fn new(flow: Flow, nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self, CoreError> {
        let mut by_id = BTreeMap::new();
        for node in nodes {
            if node.flow_id != flow.id {
                return Err(CoreError::InvalidArgument("node belongs to another flow"));
            }
            by_id.insert(node.id, node);
        }
        for edge in &edges {
            if edge.flow_id != flow.id {
                return Err(CoreError::InvalidArgument("edge belongs to another flow"));
            }
            if !by_id.contains_key(&edge.source_id) || !by_id.contains_key(&edge.target_id) {
                return Err(CoreError::InvalidArgument(
                    "edge endpoints must be nodes of the same flow",
                ));
            }
        }
        let index = EdgeIndex::from_edges(&edges);
        Ok(Self {
            flow,
            nodes: by_id,
            edges,
            index,
        })
    }

    pub fn node(&self, id: Id) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn start_node(&self) -> Option<&Node> {
        self.nodes
            .values()
            .find(|node| node.kind() == NodeKind::ManualStart)
    }

    pub fn successors(&self, source: Id, handle: EdgeHandle) -> &[Id] {
        self.index.successors(source, handle)
    }

    pub fn reachability(&self, from: Id, to: Id) -> Reachability {
        self.index.reachability(from, to)
    }
}
