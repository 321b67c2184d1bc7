#![forbid(unsafe_code)]

use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use wb_core::flow::{
    ConditionPayload, EdgeHandle, ErrorPolicy, ForEachPayload, ForPayload, JsPayload, NodeKind,
    NodePayload, NodeState, Position, RequestPayload,
};
use wb_core::{CancelToken, ErrorKind, Id};
use wb_runner::{
    FlowRunner, HandlerError, HandlerRegistry, NodeContext, NodeHandler, NodeOutput, RunReport,
    RunnerConfig,
};
use wb_storage::{FlowStore, SqliteStore};

fn open() -> (SqliteStore, Id) {
    let store = SqliteStore::open_in_memory().expect("open store");
    let tx = store.begin().expect("begin");
    let workspaces = store.workspaces().with_tx(&tx);
    let user = workspaces.create_user("runner@example.com").expect("user");
    let workspace = workspaces.create(user, "Runs").expect("workspace");
    tx.commit().expect("commit");
    (store, workspace.id)
}

fn node(flows: &FlowStore<'_>, flow_id: Id, name: &str, payload: NodePayload) -> Id {
    flows
        .create_node(flow_id, name, Position::default(), payload)
        .expect("create node")
        .id
}

fn edge(flows: &FlowStore<'_>, flow_id: Id, from: Id, to: Id, handle: EdgeHandle) {
    flows
        .create_edge(flow_id, from, to, handle)
        .expect("create edge");
}

fn request() -> NodePayload {
    NodePayload::Request(RequestPayload::default())
}

fn js() -> NodePayload {
    NodePayload::Js(JsPayload {
        code: "return input;".to_string(),
    })
}

fn condition() -> NodePayload {
    NodePayload::Condition(ConditionPayload {
        expression: "input.ok".to_string(),
    })
}

fn for_loop(iterations: i64, error_policy: ErrorPolicy) -> NodePayload {
    NodePayload::For(ForPayload {
        iterations,
        condition: String::new(),
        error_policy,
    })
}

fn echo(ctx: &NodeContext<'_>) -> Result<NodeOutput, HandlerError> {
    Ok(NodeOutput::value(json!({
        "node": ctx.node.name,
        "input": ctx.input,
    })))
}

fn route(ctx: &NodeContext<'_>) -> Result<NodeOutput, HandlerError> {
    let ok = ctx.input["ok"].as_bool().unwrap_or(false);
    Ok(NodeOutput::branch(ctx.input.clone(), ok))
}

fn fail_second_iteration(ctx: &NodeContext<'_>) -> Result<NodeOutput, HandlerError> {
    match ctx.iteration {
        Some(iteration) if iteration.index == 1 => Err(HandlerError::failed("boom")),
        Some(iteration) => Ok(NodeOutput::value(json!(iteration.index))),
        None => Err(HandlerError::failed("outside a loop")),
    }
}

fn split(ctx: &NodeContext<'_>) -> Result<NodeOutput, HandlerError> {
    let items = ctx
        .input
        .get("items")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    Ok(NodeOutput::items(items))
}

fn current_item(ctx: &NodeContext<'_>) -> Result<NodeOutput, HandlerError> {
    let item = ctx.iteration.map(|iteration| iteration.item.clone());
    let value = json!({ "item": item, "input": ctx.input });
    Ok(NodeOutput::value(value))
}

/// Sleeps in small steps and gives up once the run is canceled.
struct Sleep(Duration);

impl NodeHandler for Sleep {
    fn run(&self, ctx: &NodeContext<'_>) -> Result<NodeOutput, HandlerError> {
        let deadline = Instant::now() + self.0;
        while Instant::now() < deadline {
            if ctx.cancel.is_canceled() {
                return Err(HandlerError::Canceled);
            }
            thread::sleep(Duration::from_millis(5));
        }
        Ok(NodeOutput::value(json!(ctx.node.name)))
    }
}

/// Tracks how many handler calls overlap.
#[derive(Clone, Default)]
struct Overlap {
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl NodeHandler for Overlap {
    fn run(&self, _ctx: &NodeContext<'_>) -> Result<NodeOutput, HandlerError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(30));
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(NodeOutput::default())
    }
}

fn runner(handlers: HandlerRegistry) -> FlowRunner {
    FlowRunner::new(RunnerConfig::default(), handlers)
}

fn version_node(report: &RunReport, live: Id) -> Id {
    report.snapshot.node_mapping[&live]
}

#[test]
fn linear_flow_records_one_execution_per_node() {
    let (store, workspace_id) = open();
    let tx = store.begin().expect("begin");
    let flows = store.flows().with_tx(&tx);
    let flow_id = flows.create_flow(workspace_id, "linear").expect("flow").id;
    let start = node(&flows, flow_id, "start", NodePayload::ManualStart);
    let fetch = node(&flows, flow_id, "fetch", request());
    let shape = node(&flows, flow_id, "shape", js());
    edge(&flows, flow_id, start, fetch, EdgeHandle::Unspecified);
    edge(&flows, flow_id, fetch, shape, EdgeHandle::Then);
    tx.commit().expect("commit");

    let handlers = HandlerRegistry::new()
        .with(NodeKind::Request, echo)
        .with(NodeKind::Js, echo);
    let report = runner(handlers)
        .run(&store, flow_id, json!({"page": 1}), &CancelToken::new())
        .expect("run");

    assert_eq!(report.state, NodeState::Success);
    assert_eq!(report.live_state(start), Some(NodeState::Success));
    assert_eq!(report.live_state(shape), Some(NodeState::Success));
    assert_eq!(
        report.live_output(shape),
        Some(&json!({
            "node": "shape",
            "input": {"node": "fetch", "input": {"page": 1}},
        }))
    );

    let executions = store
        .executions()
        .executions(version_node(&report, fetch))
        .expect("executions");
    assert_eq!(executions.len(), 1);
    assert_eq!(executions[0].state, NodeState::Success);
    assert_eq!(executions[0].name, "fetch");
    assert_eq!(
        executions[0].input_json().expect("input"),
        json!({"page": 1})
    );
    assert!(executions[0].completed_at.is_some());

    let summary = serde_json::to_value(&report).expect("report json");
    assert_eq!(summary["state"], json!("success"));
    assert_eq!(summary["flow_id"], json!(flow_id.to_text()));
    assert_eq!(
        summary["snapshot"]["node_mapping"][fetch.to_text()],
        json!(version_node(&report, fetch).to_text())
    );

    // Live nodes are untouched; the version carries the run state.
    let flows = store.flows();
    assert_eq!(
        flows.get_node(fetch).expect("live").state,
        NodeState::Unspecified
    );
    assert_eq!(
        flows
            .get_node(version_node(&report, fetch))
            .expect("version")
            .state,
        NodeState::Success
    );
}

#[test]
fn snapshot_copies_graph_and_records_mapping() {
    let (store, workspace_id) = open();
    let tx = store.begin().expect("begin");
    let flows = store.flows().with_tx(&tx);
    let flow_id = flows.create_flow(workspace_id, "snap").expect("flow").id;
    let start = node(&flows, flow_id, "start", NodePayload::ManualStart);
    let fetch = node(&flows, flow_id, "fetch", request());
    edge(&flows, flow_id, start, fetch, EdgeHandle::Then);
    let variables = store.flow_variables().with_tx(&tx);
    variables
        .create_variable(flow_id, "base", "https://api.example.com", "")
        .expect("variable");
    let mut hidden = variables
        .create_variable(flow_id, "secret", "s3cr3t", "")
        .expect("variable");
    hidden.enabled = false;
    variables.update_variable(&hidden).expect("disable");
    tx.commit().expect("commit");

    fn base_url(ctx: &NodeContext<'_>) -> Result<NodeOutput, HandlerError> {
        Ok(NodeOutput::value(json!({
            "base": ctx.variables.get("base"),
            "secret": ctx.variables.get("secret"),
        })))
    }
    let report = runner(HandlerRegistry::new().with(NodeKind::Request, base_url))
        .run(&store, flow_id, Value::Null, &CancelToken::new())
        .expect("run");
    assert_eq!(
        report.live_output(fetch),
        Some(&json!({"base": "https://api.example.com", "secret": null}))
    );

    let flows = store.flows();
    let versions = flows.list_versions(flow_id).expect("versions");
    assert_eq!(versions.len(), 1);
    assert_eq!(versions[0].id, report.version_id());
    let graph = flows
        .load_graph(report.version_id())
        .expect("version graph");
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.edges.len(), 1);
    let copied = store
        .flow_variables()
        .variables(report.version_id())
        .expect("variables");
    let copied: Vec<(&str, bool)> = copied
        .iter()
        .map(|variable| (variable.name.as_str(), variable.enabled))
        .collect();
    assert_eq!(copied, [("base", true), ("secret", false)]);

    let mapping = flows
        .version_node_mapping(report.version_id())
        .expect("mapping")
        .expect("mapping blob");
    let mapping: Value = serde_json::from_slice(&mapping).expect("mapping json");
    assert_eq!(
        mapping[start.to_text()],
        json!(version_node(&report, start).to_text())
    );
    assert_eq!(mapping, report.snapshot.mapping_json());
}

#[test]
fn condition_follows_one_branch() {
    let (store, workspace_id) = open();
    let tx = store.begin().expect("begin");
    let flows = store.flows().with_tx(&tx);
    let flow_id = flows.create_flow(workspace_id, "branch").expect("flow").id;
    let start = node(&flows, flow_id, "start", NodePayload::ManualStart);
    let check = node(&flows, flow_id, "check", condition());
    let yes = node(&flows, flow_id, "yes", request());
    let no = node(&flows, flow_id, "no", request());
    edge(&flows, flow_id, start, check, EdgeHandle::Then);
    edge(&flows, flow_id, check, yes, EdgeHandle::Then);
    edge(&flows, flow_id, check, no, EdgeHandle::Else);
    tx.commit().expect("commit");

    let runner = runner(
        HandlerRegistry::new()
            .with(NodeKind::Condition, route)
            .with(NodeKind::Request, echo),
    );
    let taken = runner
        .run(&store, flow_id, json!({"ok": true}), &CancelToken::new())
        .expect("run");
    assert_eq!(taken.state, NodeState::Success);
    assert_eq!(taken.live_state(yes), Some(NodeState::Success));
    assert_eq!(taken.live_state(no), None);

    let other = runner
        .run(&store, flow_id, json!({"ok": false}), &CancelToken::new())
        .expect("run");
    assert_eq!(other.live_state(yes), None);
    assert_eq!(other.live_state(no), Some(NodeState::Success));
    assert_ne!(taken.version_id(), other.version_id());
}

#[test]
fn condition_without_branch_fails() {
    let (store, workspace_id) = open();
    let tx = store.begin().expect("begin");
    let flows = store.flows().with_tx(&tx);
    let flow_id = flows.create_flow(workspace_id, "branch").expect("flow").id;
    let start = node(&flows, flow_id, "start", NodePayload::ManualStart);
    let check = node(&flows, flow_id, "check", condition());
    edge(&flows, flow_id, start, check, EdgeHandle::Then);
    tx.commit().expect("commit");

    let report = runner(HandlerRegistry::new().with(NodeKind::Condition, echo))
        .run(&store, flow_id, Value::Null, &CancelToken::new())
        .expect("run");
    assert_eq!(report.state, NodeState::Failure);
    let latest = store
        .executions()
        .latest_execution(version_node(&report, check))
        .expect("latest")
        .expect("row");
    assert_eq!(latest.state, NodeState::Failure);
    assert_eq!(
        latest.error.as_deref(),
        Some("condition handler returned no branch")
    );
}

#[test]
fn join_waits_for_every_upstream_branch() {
    let (store, workspace_id) = open();
    let tx = store.begin().expect("begin");
    let flows = store.flows().with_tx(&tx);
    let flow_id = flows.create_flow(workspace_id, "join").expect("flow").id;
    let start = node(&flows, flow_id, "start", NodePayload::ManualStart);
    let fast = node(&flows, flow_id, "fast", js());
    let slow = node(&flows, flow_id, "slow", request());
    let join = node(&flows, flow_id, "join", js());
    edge(&flows, flow_id, start, fast, EdgeHandle::Then);
    edge(&flows, flow_id, start, slow, EdgeHandle::Then);
    edge(&flows, flow_id, fast, join, EdgeHandle::Then);
    edge(&flows, flow_id, slow, join, EdgeHandle::Then);
    tx.commit().expect("commit");

    let handlers = HandlerRegistry::new()
        .with(NodeKind::Js, echo)
        .with(NodeKind::Request, Sleep(Duration::from_millis(60)));
    let report = runner(handlers)
        .run(&store, flow_id, json!("go"), &CancelToken::new())
        .expect("run");
    assert_eq!(report.state, NodeState::Success);

    let executions = store
        .executions()
        .executions(version_node(&report, join))
        .expect("executions");
    assert_eq!(executions.len(), 1, "join runs once");
    let input = executions[0].input_json().expect("input");
    assert_eq!(input["slow"], json!("slow"));
    assert_eq!(input["fast"], json!({"node": "fast", "input": "go"}));
}

#[test]
fn for_loop_honors_error_policy() {
    let cases = [
        (ErrorPolicy::Ignore, NodeState::Success, 3, 1, true),
        (ErrorPolicy::Break, NodeState::Success, 2, 1, true),
        (ErrorPolicy::Fail, NodeState::Failure, 2, 1, false),
    ];
    for (policy, loop_state, iterations, failures, after_runs) in cases {
        let (store, workspace_id) = open();
        let tx = store.begin().expect("begin");
        let flows = store.flows().with_tx(&tx);
        let flow_id = flows.create_flow(workspace_id, "loop").expect("flow").id;
        let start = node(&flows, flow_id, "start", NodePayload::ManualStart);
        let repeat = node(&flows, flow_id, "repeat", for_loop(3, policy));
        let body = node(&flows, flow_id, "body", js());
        let after = node(&flows, flow_id, "after", request());
        edge(&flows, flow_id, start, repeat, EdgeHandle::Then);
        edge(&flows, flow_id, repeat, body, EdgeHandle::Loop);
        edge(&flows, flow_id, repeat, after, EdgeHandle::Then);
        tx.commit().expect("commit");

        let handlers = HandlerRegistry::new()
            .with(NodeKind::Js, fail_second_iteration)
            .with(NodeKind::Request, echo);
        let report = runner(handlers)
            .run(&store, flow_id, Value::Null, &CancelToken::new())
            .expect("run");

        assert_eq!(report.live_state(repeat), Some(loop_state), "{policy:?}");
        let loop_row = store
            .executions()
            .latest_execution(version_node(&report, repeat))
            .expect("latest")
            .expect("row");
        if loop_state == NodeState::Success {
            assert_eq!(
                loop_row.output_json().expect("output"),
                Some(json!({"iterations": iterations, "failures": failures})),
                "{policy:?}"
            );
        } else {
            assert_eq!(loop_row.error.as_deref(), Some("iteration 1 failed"));
        }
        let body_runs = store
            .executions()
            .executions(version_node(&report, body))
            .expect("executions");
        assert_eq!(body_runs.len(), iterations, "{policy:?}");
        assert_eq!(report.live_state(after).is_some(), after_runs, "{policy:?}");
        let expected = if after_runs {
            NodeState::Success
        } else {
            NodeState::Failure
        };
        assert_eq!(report.state, expected, "{policy:?}");
    }
}

#[test]
fn for_each_iterates_handler_items() {
    let (store, workspace_id) = open();
    let tx = store.begin().expect("begin");
    let flows = store.flows().with_tx(&tx);
    let flow_id = flows.create_flow(workspace_id, "each").expect("flow").id;
    let start = node(&flows, flow_id, "start", NodePayload::ManualStart);
    let each = node(
        &flows,
        flow_id,
        "each",
        NodePayload::ForEach(ForEachPayload {
            iter_expression: "input.items".to_string(),
            condition: String::new(),
            error_policy: ErrorPolicy::Fail,
        }),
    );
    let first = node(&flows, flow_id, "first", js());
    let second = node(&flows, flow_id, "second", js());
    edge(&flows, flow_id, start, each, EdgeHandle::Then);
    edge(&flows, flow_id, each, first, EdgeHandle::Loop);
    edge(&flows, flow_id, first, second, EdgeHandle::Then);
    tx.commit().expect("commit");

    let handlers = HandlerRegistry::new()
        .with(NodeKind::ForEach, split)
        .with(NodeKind::Js, current_item);
    let report = runner(handlers)
        .run(
            &store,
            flow_id,
            json!({"items": ["a", "b"]}),
            &CancelToken::new(),
        )
        .expect("run");
    assert_eq!(report.state, NodeState::Success);

    let runs = store
        .executions()
        .executions(version_node(&report, second))
        .expect("executions");
    let items: Vec<Value> = runs
        .iter()
        .map(|run| {
            let output = run.output_json().expect("output").expect("value");
            output["item"].clone()
        })
        .collect();
    assert_eq!(items, [json!("a"), json!("b")]);
    assert_eq!(
        report.live_output(second).expect("output")["item"],
        json!("b")
    );
}

#[test]
fn for_each_without_handler_fails_the_loop() {
    let (store, workspace_id) = open();
    let tx = store.begin().expect("begin");
    let flows = store.flows().with_tx(&tx);
    let flow_id = flows.create_flow(workspace_id, "each").expect("flow").id;
    let start = node(&flows, flow_id, "start", NodePayload::ManualStart);
    let each = node(
        &flows,
        flow_id,
        "each",
        NodePayload::ForEach(ForEachPayload::default()),
    );
    edge(&flows, flow_id, start, each, EdgeHandle::Then);
    tx.commit().expect("commit");

    let report = runner(HandlerRegistry::new())
        .run(&store, flow_id, Value::Null, &CancelToken::new())
        .expect("run");
    assert_eq!(report.state, NodeState::Failure);
    assert_eq!(report.live_state(each), Some(NodeState::Failure));
}

#[test]
fn missing_handler_fails_the_node() {
    let (store, workspace_id) = open();
    let tx = store.begin().expect("begin");
    let flows = store.flows().with_tx(&tx);
    let flow_id = flows.create_flow(workspace_id, "bare").expect("flow").id;
    let start = node(&flows, flow_id, "start", NodePayload::ManualStart);
    let fetch = node(&flows, flow_id, "fetch", request());
    let after = node(&flows, flow_id, "after", js());
    edge(&flows, flow_id, start, fetch, EdgeHandle::Then);
    edge(&flows, flow_id, fetch, after, EdgeHandle::Then);
    tx.commit().expect("commit");

    let report = runner(HandlerRegistry::new().with(NodeKind::Js, echo))
        .run(&store, flow_id, Value::Null, &CancelToken::new())
        .expect("run");
    assert_eq!(report.state, NodeState::Failure);
    assert_eq!(report.live_state(fetch), Some(NodeState::Failure));
    assert_eq!(report.live_state(after), None);
    let row = store
        .executions()
        .latest_execution(version_node(&report, fetch))
        .expect("latest")
        .expect("row");
    assert_eq!(
        row.error.as_deref(),
        Some("no handler registered for request")
    );
}

#[test]
fn cancel_stops_running_and_pending_nodes() {
    let (store, workspace_id) = open();
    let tx = store.begin().expect("begin");
    let flows = store.flows().with_tx(&tx);
    let flow_id = flows.create_flow(workspace_id, "cancel").expect("flow").id;
    let start = node(&flows, flow_id, "start", NodePayload::ManualStart);
    let slow = node(&flows, flow_id, "slow", request());
    let quick = node(&flows, flow_id, "quick", js());
    let join = node(&flows, flow_id, "join", js());
    let after = node(&flows, flow_id, "after", js());
    edge(&flows, flow_id, start, slow, EdgeHandle::Then);
    edge(&flows, flow_id, start, quick, EdgeHandle::Then);
    edge(&flows, flow_id, slow, join, EdgeHandle::Then);
    edge(&flows, flow_id, quick, join, EdgeHandle::Then);
    edge(&flows, flow_id, join, after, EdgeHandle::Then);
    tx.commit().expect("commit");

    let handlers = HandlerRegistry::new()
        .with(NodeKind::Request, Sleep(Duration::from_secs(10)))
        .with(NodeKind::Js, echo);
    let runner = runner(handlers);
    let cancel = CancelToken::new();
    let report = thread::scope(|scope| {
        let token = cancel.clone();
        scope.spawn(move || {
            thread::sleep(Duration::from_millis(100));
            token.cancel();
        });
        runner.run(&store, flow_id, Value::Null, &cancel)
    })
    .expect("run");

    assert_eq!(report.state, NodeState::Canceled);
    assert_eq!(report.live_state(quick), Some(NodeState::Success));
    assert_eq!(report.live_state(slow), Some(NodeState::Canceled));
    assert_eq!(report.live_state(join), Some(NodeState::Canceled));
    assert_eq!(report.live_state(after), None);
    for live in [slow, join] {
        let rows = store
            .executions()
            .executions(version_node(&report, live))
            .expect("executions");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].state, NodeState::Canceled);
        rows[0].validate_lifecycle().expect("lifecycle");
    }
}

#[test]
fn canceled_before_start_writes_nothing() {
    let (store, workspace_id) = open();
    let tx = store.begin().expect("begin");
    let flows = store.flows().with_tx(&tx);
    let flow_id = flows.create_flow(workspace_id, "early").expect("flow").id;
    node(&flows, flow_id, "start", NodePayload::ManualStart);
    tx.commit().expect("commit");

    let cancel = CancelToken::new();
    cancel.cancel();
    let err = runner(HandlerRegistry::new())
        .run(&store, flow_id, Value::Null, &cancel)
        .expect_err("canceled");
    assert_eq!(err.kind(), ErrorKind::Canceled);
    let versions = store.flows().list_versions(flow_id).expect("versions");
    assert!(versions.is_empty());
}

#[test]
fn node_timeout_fails_the_node() {
    let (store, workspace_id) = open();
    let tx = store.begin().expect("begin");
    let flows = store.flows().with_tx(&tx);
    let flow_id = flows.create_flow(workspace_id, "timeout").expect("flow").id;
    let start = node(&flows, flow_id, "start", NodePayload::ManualStart);
    let slow = node(&flows, flow_id, "slow", request());
    edge(&flows, flow_id, start, slow, EdgeHandle::Then);
    tx.commit().expect("commit");

    let config = RunnerConfig {
        node_timeout: Some(Duration::from_millis(30)),
        ..RunnerConfig::default()
    };
    let handlers =
        HandlerRegistry::new().with(NodeKind::Request, Sleep(Duration::from_millis(300)));
    let report = FlowRunner::new(config, handlers)
        .run(&store, flow_id, Value::Null, &CancelToken::new())
        .expect("run");
    assert_eq!(report.state, NodeState::Failure);
    let row = store
        .executions()
        .latest_execution(version_node(&report, slow))
        .expect("latest")
        .expect("row");
    assert_eq!(row.state, NodeState::Failure);
    assert_eq!(row.error.as_deref(), Some("timed out after 30 ms"));
}

#[test]
fn max_parallel_bounds_handler_threads() {
    let (store, workspace_id) = open();
    let tx = store.begin().expect("begin");
    let flows = store.flows().with_tx(&tx);
    let flow_id = flows.create_flow(workspace_id, "fan").expect("flow").id;
    let start = node(&flows, flow_id, "start", NodePayload::ManualStart);
    for name in ["a", "b", "c", "d"] {
        let target = node(&flows, flow_id, name, request());
        edge(&flows, flow_id, start, target, EdgeHandle::Then);
    }
    tx.commit().expect("commit");

    let overlap = Overlap::default();
    let config = RunnerConfig {
        max_parallel: 1,
        ..RunnerConfig::default()
    };
    let report = FlowRunner::new(
        config,
        HandlerRegistry::new().with(NodeKind::Request, overlap.clone()),
    )
    .run(&store, flow_id, Value::Null, &CancelToken::new())
    .expect("run");
    assert_eq!(report.state, NodeState::Success);
    assert_eq!(report.node_states.len(), 5);
    assert_eq!(overlap.peak.load(Ordering::SeqCst), 1);
}

#[test]
fn flows_without_start_or_live_parent_are_refused() {
    let (store, workspace_id) = open();
    let tx = store.begin().expect("begin");
    let flows = store.flows().with_tx(&tx);
    let flow_id = flows
        .create_flow(workspace_id, "headless")
        .expect("flow")
        .id;
    node(&flows, flow_id, "orphan", request());
    let version = flows.create_version(flow_id).expect("version");
    tx.commit().expect("commit");

    let runner = runner(HandlerRegistry::new());
    let err = runner
        .run(&store, flow_id, Value::Null, &CancelToken::new())
        .expect_err("no start");
    match &err {
        wb_runner::RunError::NoStartNode(id) => assert_eq!(*id, flow_id),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = runner
        .run(&store, version.id, Value::Null, &CancelToken::new())
        .expect_err("version");
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}
