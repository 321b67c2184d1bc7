#![forbid(unsafe_code)]

use crate::handler::{HandlerRegistry, Iteration, NodeContext, NodeHandler, NodeOutput};
use crate::record::Recorder;
use crate::snapshot::{VersionSnapshot, snapshot_version};
use crate::{HandlerError, RunError, RunnerConfig};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::{Duration, Instant};
use wb_core::flow::{
    EdgeHandle, ErrorPolicy, FlowGraph, Node, NodeKind, NodePayload, NodeState, Reachability,
};
use wb_core::{CancelToken, Id};
use wb_storage::SqliteStore;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Result of one flow run. Node maps are keyed by version node id.
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub flow_id: Id,
    pub snapshot: VersionSnapshot,
    pub state: NodeState,
    /// Last terminal state of every node that was started.
    pub node_states: BTreeMap<Id, NodeState>,
    /// Last successful output of every node. Loop bodies keep the final
    /// iteration.
    pub outputs: BTreeMap<Id, Value>,
}

impl RunReport {
    pub fn version_id(&self) -> Id {
        self.snapshot.version.id
    }

    pub fn live_state(&self, live_node_id: Id) -> Option<NodeState> {
        let version_node = self.snapshot.node_mapping.get(&live_node_id)?;
        self.node_states.get(version_node).copied()
    }

    pub fn live_output(&self, live_node_id: Id) -> Option<&Value> {
        let version_node = self.snapshot.node_mapping.get(&live_node_id)?;
        self.outputs.get(version_node)
    }
}

#[derive(Debug)]
pub struct FlowRunner {
    config: RunnerConfig,
    handlers: HandlerRegistry,
}

impl FlowRunner {
    pub fn new(config: RunnerConfig, handlers: HandlerRegistry) -> Self {
        Self { config, handlers }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Snapshots `flow_id` into a version and executes the version. Handler
    /// failures end up in the report; only store errors abort the run.
    pub fn run(
        &self,
        store: &SqliteStore,
        flow_id: Id,
        input: Value,
        cancel: &CancelToken,
    ) -> Result<RunReport, RunError> {
        let started = Instant::now();
        tracing::info!(flow_id = %flow_id, "flow run started");
        let snapshot = snapshot_version(store, flow_id, cancel)?;
        let graph = store.flows().load_graph(snapshot.version.id)?;
        let start = graph
            .start_node()
            .map(|node| node.id)
            .ok_or(RunError::NoStartNode(flow_id))?;
        let variables: BTreeMap<String, String> = store
            .flow_variables()
            .variables(snapshot.version.id)?
            .into_iter()
            .filter(|variable| variable.enabled)
            .map(|variable| (variable.name, variable.value))
            .collect();

        let mut run = Run {
            handlers: &self.handlers,
            config: &self.config,
            graph: &graph,
            variables: &variables,
            cancel,
            recorder: Recorder::new(store),
            node_states: BTreeMap::new(),
            outputs: BTreeMap::new(),
        };
        let outcome = run.region(vec![(start, input)], None, None, self.config.parallelism())?;
        let state = if outcome.canceled {
            NodeState::Canceled
        } else if outcome.failed {
            NodeState::Failure
        } else {
            NodeState::Success
        };
        let Run {
            node_states,
            outputs,
            ..
        } = run;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        if state == NodeState::Canceled {
            tracing::warn!(
                flow_id = %flow_id,
                version_id = %snapshot.version.id,
                elapsed_ms,
                "flow run canceled"
            );
        } else {
            tracing::info!(
                flow_id = %flow_id,
                version_id = %snapshot.version.id,
                state = state.as_str(),
                nodes = node_states.len(),
                elapsed_ms,
                "flow run finished"
            );
        }
        Ok(RunReport {
            flow_id,
            snapshot,
            state,
            node_states,
            outputs,
        })
    }
}

#[derive(Debug, Default)]
struct RegionOutcome {
    failed: bool,
    canceled: bool,
}

/// Activated nodes waiting to start, with the activating predecessor and its
/// output. `None` marks a region entry.
type Pending = BTreeMap<Id, Vec<(Option<Id>, Value)>>;

struct InFlight {
    execution_id: Id,
    started: Instant,
}

struct Finished {
    node_id: Id,
    result: Result<NodeOutput, HandlerError>,
}

struct Run<'r> {
    handlers: &'r HandlerRegistry,
    config: &'r RunnerConfig,
    graph: &'r FlowGraph,
    variables: &'r BTreeMap<String, String>,
    cancel: &'r CancelToken,
    recorder: Recorder<'r>,
    node_states: BTreeMap<Id, NodeState>,
    outputs: BTreeMap<Id, Value>,
}

impl<'r> Run<'r> {
    /// Runs everything reachable from `seeds`, staying inside `members` when
    /// given. Handler nodes run on scoped threads, at most `capacity` at a
    /// time; start and loop nodes run on this thread.
    fn region(
        &mut self,
        seeds: Vec<(Id, Value)>,
        members: Option<&HashSet<Id>>,
        iteration: Option<&Iteration>,
        capacity: usize,
    ) -> Result<RegionOutcome, RunError> {
        let graph = self.graph;
        let handlers = self.handlers;
        let variables = self.variables;
        let cancel = self.cancel;
        let capacity = capacity.max(1);

        let mut outcome = RegionOutcome::default();
        let mut pending = Pending::new();
        for (node_id, input) in seeds {
            pending.entry(node_id).or_default().push((None, input));
        }

        std::thread::scope(|scope| -> Result<RegionOutcome, RunError> {
            let (sender, receiver) = mpsc::channel::<Finished>();
            let mut running: BTreeMap<Id, InFlight> = BTreeMap::new();

            loop {
                if cancel.is_canceled() {
                    outcome.canceled = true;
                    for (node_id, flight) in std::mem::take(&mut running) {
                        if let Some(node) = graph.node(node_id) {
                            let state = NodeState::Canceled;
                            self.settle(node, flight.execution_id, state, None, None)?;
                        }
                    }
                    for (node_id, inputs) in std::mem::take(&mut pending) {
                        if let Some(node) = graph.node(node_id) {
                            let input = self.join_input(inputs);
                            self.recorder.cancel_unstarted(node, &input)?;
                            self.node_states.insert(node_id, NodeState::Canceled);
                        }
                    }
                    break;
                }

                while running.len() < capacity {
                    let Some(node_id) = self.next_ready(&pending, &running) else {
                        break;
                    };
                    let inputs = pending.remove(&node_id).unwrap_or_default();
                    let input = self.join_input(inputs);
                    let Some(node) = graph.node(node_id) else {
                        continue;
                    };
                    match node.kind() {
                        NodeKind::ManualStart => {
                            let execution_id = self.recorder.begin(node, &input)?;
                            let output = NodeOutput::value(input);
                            self.settle(
                                node,
                                execution_id,
                                NodeState::Success,
                                Some(output.value.clone()),
                                None,
                            )?;
                            self.advance(node, &output, &mut pending, members);
                        }
                        NodeKind::For | NodeKind::ForEach => {
                            let spare = capacity.saturating_sub(running.len());
                            let (state, output) = self.run_loop(node, input, iteration, spare)?;
                            match state {
                                NodeState::Success => {
                                    let output = NodeOutput::value(output);
                                    self.advance(node, &output, &mut pending, members);
                                }
                                NodeState::Canceled => outcome.canceled = true,
                                _ => outcome.failed = true,
                            }
                        }
                        kind => {
                            let execution_id = self.recorder.begin(node, &input)?;
                            let Some(handler) = handlers.get(kind) else {
                                let error = format!("no handler registered for {}", kind.as_str());
                                let state = NodeState::Failure;
                                self.settle(node, execution_id, state, None, Some(error))?;
                                outcome.failed = true;
                                continue;
                            };
                            let sender = sender.clone();
                            scope.spawn(move || {
                                let result =
                                    invoke(handler, node, &input, variables, iteration, cancel);
                                // Nobody listens once the region gave up on this node.
                                let _ = sender.send(Finished { node_id, result });
                            });
                            running.insert(
                                node_id,
                                InFlight {
                                    execution_id,
                                    started: Instant::now(),
                                },
                            );
                        }
                    }
                }

                if running.is_empty() {
                    break;
                }

                match receiver.recv_timeout(POLL_INTERVAL) {
                    Ok(Finished { node_id, result }) => {
                        if let Some(flight) = running.remove(&node_id) {
                            if let Some(node) = graph.node(node_id) {
                                self.finish(
                                    node,
                                    flight,
                                    result,
                                    &mut pending,
                                    members,
                                    &mut outcome,
                                )?;
                            }
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
                self.expire(&mut running, &mut outcome)?;
            }
            Ok(outcome)
        })
    }

    /// First pending node that no other pending or in-flight node can still
    /// reach. Joins wait until every upstream branch has settled.
    fn next_ready(&self, pending: &Pending, running: &BTreeMap<Id, InFlight>) -> Option<Id> {
        pending.keys().copied().find(|&candidate| {
            pending
                .keys()
                .chain(running.keys())
                .filter(|&&other| other != candidate)
                .all(|&other| self.graph.reachability(other, candidate) != Reachability::Before)
        })
    }

    fn join_input(&self, inputs: Vec<(Option<Id>, Value)>) -> Value {
        match <[(Option<Id>, Value); 1]>::try_from(inputs) {
            Ok([(_, value)]) => value,
            Err(inputs) => {
                let joined = inputs
                    .into_iter()
                    .map(|(from, value)| {
                        let key = from
                            .and_then(|id| self.graph.node(id))
                            .map(|node| node.name.clone())
                            .unwrap_or_else(|| "input".to_string());
                        (key, value)
                    })
                    .collect();
                Value::Object(joined)
            }
        }
    }

    /// Activates the successors of a node that succeeded.
    fn advance(
        &self,
        node: &Node,
        output: &NodeOutput,
        pending: &mut Pending,
        members: Option<&HashSet<Id>>,
    ) {
        let handles: &[EdgeHandle] = match node.kind() {
            NodeKind::Condition if output.branch == Some(false) => &[EdgeHandle::Else],
            NodeKind::Condition => &[EdgeHandle::Then],
            _ => &[EdgeHandle::Unspecified, EdgeHandle::Then],
        };
        for &handle in handles {
            for &target in self.graph.successors(node.id, handle) {
                if members.is_some_and(|members| !members.contains(&target)) {
                    continue;
                }
                pending
                    .entry(target)
                    .or_default()
                    .push((Some(node.id), output.value.clone()));
            }
        }
    }

    fn finish(
        &mut self,
        node: &Node,
        flight: InFlight,
        result: Result<NodeOutput, HandlerError>,
        pending: &mut Pending,
        members: Option<&HashSet<Id>>,
        outcome: &mut RegionOutcome,
    ) -> Result<(), RunError> {
        match result {
            Ok(output) if node.kind() == NodeKind::Condition && output.branch.is_none() => {
                let error = "condition handler returned no branch".to_string();
                let state = NodeState::Failure;
                self.settle(
                    node,
                    flight.execution_id,
                    state,
                    Some(output.value),
                    Some(error),
                )?;
                outcome.failed = true;
            }
            Ok(output) => {
                let value = Some(output.value.clone());
                self.settle(node, flight.execution_id, NodeState::Success, value, None)?;
                self.advance(node, &output, pending, members);
            }
            Err(HandlerError::Canceled) => {
                self.settle(node, flight.execution_id, NodeState::Canceled, None, None)?;
                outcome.canceled = true;
            }
            Err(HandlerError::Failed(message)) => {
                self.settle(
                    node,
                    flight.execution_id,
                    NodeState::Failure,
                    None,
                    Some(message),
                )?;
                outcome.failed = true;
            }
        }
        Ok(())
    }

    /// Fails nodes that outlived the configured timeout. Their threads keep
    /// running; late results are dropped.
    fn expire(
        &mut self,
        running: &mut BTreeMap<Id, InFlight>,
        outcome: &mut RegionOutcome,
    ) -> Result<(), RunError> {
        let Some(timeout) = self.config.node_timeout else {
            return Ok(());
        };
        let expired: Vec<Id> = running
            .iter()
            .filter(|(_, flight)| flight.started.elapsed() >= timeout)
            .map(|(&node_id, _)| node_id)
            .collect();
        for node_id in expired {
            let Some(flight) = running.remove(&node_id) else {
                continue;
            };
            if let Some(node) = self.graph.node(node_id) {
                let error = format!("timed out after {} ms", timeout.as_millis());
                self.settle(
                    node,
                    flight.execution_id,
                    NodeState::Failure,
                    None,
                    Some(error),
                )?;
                outcome.failed = true;
            }
        }
        Ok(())
    }

    fn settle(
        &mut self,
        node: &Node,
        execution_id: Id,
        state: NodeState,
        output: Option<Value>,
        error: Option<String>,
    ) -> Result<(), RunError> {
        if state == NodeState::Success {
            if let Some(output) = &output {
                self.outputs.insert(node.id, output.clone());
            }
        }
        self.recorder
            .complete(node, execution_id, state, output, error)?;
        self.node_states.insert(node.id, state);
        Ok(())
    }

    /// Repeats the loop body once per iteration. The body is every node
    /// reachable from the `loop` handle that is not also downstream of the
    /// loop's exit.
    fn run_loop(
        &mut self,
        node: &Node,
        input: Value,
        outer: Option<&Iteration>,
        capacity: usize,
    ) -> Result<(NodeState, Value), RunError> {
        let execution_id = self.recorder.begin(node, &input)?;
        let (items, policy): (Vec<Value>, ErrorPolicy) = match &node.payload {
            NodePayload::For(payload) => (
                (0..payload.iterations.max(0)).map(Value::from).collect(),
                payload.error_policy,
            ),
            NodePayload::ForEach(payload) => match self.loop_items(node, &input, outer) {
                Ok(items) => (items, payload.error_policy),
                Err(HandlerError::Canceled) => {
                    self.settle(node, execution_id, NodeState::Canceled, None, None)?;
                    return Ok((NodeState::Canceled, Value::Null));
                }
                Err(HandlerError::Failed(message)) => {
                    self.settle(node, execution_id, NodeState::Failure, None, Some(message))?;
                    return Ok((NodeState::Failure, Value::Null));
                }
            },
            _ => (Vec::new(), ErrorPolicy::default()),
        };

        let entries: Vec<Id> = self.graph.successors(node.id, EdgeHandle::Loop).to_vec();
        let body = self.loop_body(node.id);
        let mut completed = 0usize;
        let mut failures = 0usize;
        let mut failed_at = None;
        let mut canceled = false;
        for (index, item) in items.into_iter().enumerate() {
            if self.cancel.is_canceled() {
                canceled = true;
                break;
            }
            let seeds = entries.iter().map(|&id| (id, item.clone())).collect();
            let iteration = Iteration { index, item };
            let outcome = self.region(seeds, Some(&body), Some(&iteration), capacity)?;
            if outcome.canceled {
                canceled = true;
                break;
            }
            completed += 1;
            if outcome.failed {
                failures += 1;
                match policy {
                    ErrorPolicy::Ignore => {}
                    ErrorPolicy::Break => break,
                    ErrorPolicy::Fail => {
                        failed_at = Some(index);
                        break;
                    }
                }
            }
        }

        let output = json!({ "iterations": completed, "failures": failures });
        let (state, error) = match (canceled, failed_at) {
            (true, _) => (NodeState::Canceled, None),
            (false, Some(i)) => (NodeState::Failure, Some(format!("iteration {i} failed"))),
            (false, None) => (NodeState::Success, None),
        };
        self.settle(node, execution_id, state, Some(output.clone()), error)?;
        Ok((state, output))
    }

    /// Elements for a for-each node, produced by its handler on this thread.
    fn loop_items(
        &self,
        node: &Node,
        input: &Value,
        outer: Option<&Iteration>,
    ) -> Result<Vec<Value>, HandlerError> {
        let handler = self.handlers.get(NodeKind::ForEach).ok_or_else(|| {
            let kind = NodeKind::ForEach.as_str();
            HandlerError::failed(format!("no handler registered for {kind}"))
        })?;
        invoke(handler, node, input, self.variables, outer, self.cancel)?
            .items
            .ok_or_else(|| HandlerError::failed("for-each handler returned no items"))
    }

    fn loop_body(&self, loop_id: Id) -> HashSet<Id> {
        let exits: Vec<Id> = [EdgeHandle::Unspecified, EdgeHandle::Then]
            .into_iter()
            .flat_map(|handle| self.graph.successors(loop_id, handle).iter().copied())
            .collect();
        let mut body = HashSet::new();
        let mut queue: VecDeque<Id> = self
            .graph
            .successors(loop_id, EdgeHandle::Loop)
            .iter()
            .copied()
            .collect();
        while let Some(id) = queue.pop_front() {
            let after_exit = exits.iter().any(|&exit| {
                exit == id || self.graph.reachability(exit, id) == Reachability::Before
            });
            if after_exit || !body.insert(id) {
                continue;
            }
            queue.extend(self.graph.index.all_successors(id));
        }
        body
    }
}

fn invoke(
    handler: &dyn NodeHandler,
    node: &Node,
    input: &Value,
    variables: &BTreeMap<String, String>,
    iteration: Option<&Iteration>,
    cancel: &CancelToken,
) -> Result<NodeOutput, HandlerError> {
    if cancel.is_canceled() {
        return Err(HandlerError::Canceled);
    }
    handler.run(&NodeContext {
        node,
        input,
        variables,
        iteration,
        cancel,
    })
}
