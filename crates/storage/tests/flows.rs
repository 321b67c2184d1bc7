#![forbid(unsafe_code)]

mod common;

use common::{open, seed};
use wb_core::flow::{
    ConditionPayload, EdgeHandle, ErrorPolicy, ForPayload, JsPayload, NodeKind, NodePayload,
    NodeState, Position, Reachability, RequestPayload,
};
use wb_core::{ErrorKind, Id};
use wb_storage::{FlowStore, SqliteStore};

fn node(flows: &FlowStore<'_>, flow_id: Id, name: &str, payload: NodePayload) -> Id {
    flows
        .create_node(flow_id, name, Position::default(), payload)
        .expect("create node")
        .id
}

fn condition() -> NodePayload {
    NodePayload::Condition(ConditionPayload {
        expression: "status == 200".to_string(),
    })
}

fn new_flow(store: &SqliteStore, workspace_id: Id) -> Id {
    let tx = store.begin().expect("begin");
    let flow = store
        .flows()
        .with_tx(&tx)
        .create_flow(workspace_id, "checkout")
        .expect("create flow");
    tx.commit().expect("commit");
    flow.id
}

#[test]
fn payloads_are_stored_per_kind() {
    let store = open();
    let seed = seed(&store);
    let flow_id = new_flow(&store, seed.workspace_id);
    let code = "return input;\n".repeat(200);

    let tx = store.begin().expect("begin");
    let flows = store.flows().with_tx(&tx);
    let start = node(&flows, flow_id, "start", NodePayload::ManualStart);
    let request = node(
        &flows,
        flow_id,
        "request",
        NodePayload::Request(RequestPayload {
            endpoint_id: Some(Id::new_now()),
            ..RequestPayload::default()
        }),
    );
    let js = node(
        &flows,
        flow_id,
        "js",
        NodePayload::Js(JsPayload { code: code.clone() }),
    );
    let looped = node(
        &flows,
        flow_id,
        "loop",
        NodePayload::For(ForPayload {
            iterations: 3,
            condition: String::new(),
            error_policy: ErrorPolicy::Break,
        }),
    );
    flows
        .update_node_position(request, Position { x: 10.0, y: -4.5 })
        .expect("move node");
    tx.commit().expect("commit");

    let flows = store.flows();
    assert_eq!(
        flows.get_node(start).expect("start").kind(),
        NodeKind::ManualStart
    );
    let request = flows.get_node(request).expect("request");
    assert_eq!(request.position, Position { x: 10.0, y: -4.5 });
    match &request.payload {
        NodePayload::Request(payload) => assert!(payload.endpoint_id.is_some()),
        other => panic!("unexpected payload: {other:?}"),
    }
    match flows.get_node(js).expect("js").payload {
        NodePayload::Js(payload) => assert_eq!(payload.code, code),
        other => panic!("unexpected payload {other:?}"),
    }
    let codec: i64 = store
        .conn()
        .query_row(
            "SELECT code_codec FROM flow_node_js WHERE node_id=?1",
            [js],
            |row| row.get(0),
        )
        .expect("codec");
    assert_ne!(codec, 0, "large code is compressed");
    match flows.get_node(looped).expect("loop").payload {
        NodePayload::For(payload) => {
            assert_eq!(payload.iterations, 3);
            assert_eq!(payload.error_policy, ErrorPolicy::Break);
        }
        other => panic!("unexpected payload {other:?}"),
    }
    assert_eq!(flows.nodes(flow_id).expect("nodes").len(), 4);
}

#[test]
fn diamond_graph_reachability() {
    let store = open();
    let seed = seed(&store);
    let flow_id = new_flow(&store, seed.workspace_id);

    let tx = store.begin().expect("begin");
    let flows = store.flows().with_tx(&tx);
    let a = node(&flows, flow_id, "A", condition());
    let b = node(&flows, flow_id, "B", NodePayload::ManualStart);
    let c = node(&flows, flow_id, "C", condition());
    let d = node(&flows, flow_id, "D", condition());
    flows
        .create_edge(flow_id, a, b, EdgeHandle::Then)
        .expect("a-b");
    flows
        .create_edge(flow_id, a, c, EdgeHandle::Else)
        .expect("a-c");
    flows
        .create_edge(flow_id, b, d, EdgeHandle::Then)
        .expect("b-d");
    flows
        .create_edge(flow_id, c, d, EdgeHandle::Then)
        .expect("c-d");
    tx.commit().expect("commit");

    let graph = store.flows().load_graph(flow_id).expect("graph");
    assert_eq!(graph.reachability(a, d), Reachability::Before);
    assert_eq!(graph.reachability(d, a), Reachability::After);
    assert_eq!(graph.reachability(b, c), Reachability::Unrelated);
    assert_eq!(graph.reachability(a, a), Reachability::Unrelated);
    assert_eq!(graph.successors(a, EdgeHandle::Else), [c]);
    assert_eq!(graph.start_node().map(|n| n.id), Some(b));
}

#[test]
fn edges_refuse_cycles_and_foreign_nodes() {
    let store = open();
    let seed = seed(&store);
    let flow_id = new_flow(&store, seed.workspace_id);
    let other_flow = new_flow(&store, seed.workspace_id);

    let tx = store.begin().expect("begin");
    let flows = store.flows().with_tx(&tx);
    let a = node(&flows, flow_id, "A", condition());
    let b = node(&flows, flow_id, "B", condition());
    let c = node(&flows, flow_id, "C", condition());
    let foreign = node(&flows, other_flow, "X", condition());
    flows
        .create_edge(flow_id, a, b, EdgeHandle::Then)
        .expect("a-b");
    flows
        .create_edge(flow_id, b, c, EdgeHandle::Then)
        .expect("b-c");

    let cycle = flows
        .create_edge(flow_id, c, a, EdgeHandle::Loop)
        .expect_err("cycle");
    assert_eq!(cycle.kind(), ErrorKind::InvalidArgument);
    let self_loop = flows
        .create_edge(flow_id, a, a, EdgeHandle::Then)
        .expect_err("self loop");
    assert_eq!(self_loop.kind(), ErrorKind::InvalidArgument);
    let cross = flows
        .create_edge(flow_id, a, foreign, EdgeHandle::Then)
        .expect_err("cross flow");
    assert_eq!(cross.kind(), ErrorKind::InvalidArgument);
    let missing = flows
        .create_edge(flow_id, a, Id::new_now(), EdgeHandle::Then)
        .expect_err("missing node");
    assert_eq!(missing.kind(), ErrorKind::NotFound);
    assert_eq!(flows.edges(flow_id).expect("edges").len(), 2);
}

#[test]
fn state_writes_are_range_checked() {
    let store = open();
    let seed = seed(&store);
    let flow_id = new_flow(&store, seed.workspace_id);

    let tx = store.begin().expect("begin");
    let flows = store.flows().with_tx(&tx);
    let a = node(&flows, flow_id, "A", condition());
    let b = node(&flows, flow_id, "B", condition());
    let edge = flows
        .create_edge(flow_id, a, b, EdgeHandle::Then)
        .expect("edge");

    assert_eq!(
        flows.set_node_state(a, 2).expect("state"),
        NodeState::Success
    );
    let err = flows.set_node_state(a, 5).expect_err("out of range");
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    let err = flows.set_node_state(a, -1).expect_err("negative");
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    assert_eq!(flows.get_node(a).expect("node").state, NodeState::Success);

    assert_eq!(
        flows
            .set_edge_state(edge.id, NodeState::MAX)
            .expect("edge state"),
        NodeState::Canceled
    );
    let err = flows
        .set_edge_state(edge.id, 9)
        .expect_err("edge out of range");
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    let err = flows.set_node_state(Id::new_now(), 1).expect_err("missing");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn versions_and_node_mapping() {
    let store = open();
    let seed = seed(&store);
    let flow_id = new_flow(&store, seed.workspace_id);

    let tx = store.begin().expect("begin");
    let flows = store.flows().with_tx(&tx);
    let first = flows.create_version(flow_id).expect("version");
    let second = flows.create_version(flow_id).expect("version");
    flows
        .update_version_node_mapping(second.id, b"{\"a\":\"b\"}")
        .expect("mapping");
    let err = flows
        .update_version_node_mapping(flow_id, b"{}")
        .expect_err("live flow");
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    let err = flows
        .create_version(first.id)
        .expect_err("version of version");
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    tx.commit().expect("commit");

    let flows = store.flows();
    assert_eq!(first.version_parent_id, Some(flow_id));
    let live: Vec<Id> = flows
        .list_flows(seed.workspace_id)
        .expect("live")
        .into_iter()
        .map(|flow| flow.id)
        .collect();
    assert_eq!(live, [flow_id]);
    let versions: Vec<Id> = flows
        .list_versions(flow_id)
        .expect("versions")
        .into_iter()
        .map(|flow| flow.id)
        .collect();
    assert_eq!(versions, [first.id, second.id]);
    assert_eq!(
        flows.version_node_mapping(second.id).expect("mapping"),
        Some(b"{\"a\":\"b\"}".to_vec())
    );
    assert_eq!(flows.version_node_mapping(first.id).expect("mapping"), None);

    let tx = store.begin().expect("begin");
    store
        .flows()
        .with_tx(&tx)
        .delete_flow(flow_id)
        .expect("delete");
    tx.commit().expect("commit");
    let versions = store.flows().list_versions(flow_id).expect("versions");
    assert!(versions.is_empty());
    assert_eq!(
        store.flows().get_flow(first.id).expect_err("gone").kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn deleting_a_node_drops_edges_and_executions() {
    let store = open();
    let seed = seed(&store);
    let flow_id = new_flow(&store, seed.workspace_id);

    let tx = store.begin().expect("begin");
    let flows = store.flows().with_tx(&tx);
    let a = node(&flows, flow_id, "A", condition());
    let b = node(&flows, flow_id, "B", condition());
    let c = node(&flows, flow_id, "C", condition());
    flows
        .create_edge(flow_id, a, b, EdgeHandle::Then)
        .expect("a-b");
    let keep = flows
        .create_edge(flow_id, a, c, EdgeHandle::Else)
        .expect("a-c");
    store
        .executions()
        .with_tx(&tx)
        .begin_execution(b, "B", &serde_json::json!({}))
        .expect("execution");
    flows.delete_node(b).expect("delete node");
    tx.commit().expect("commit");

    let flows = store.flows();
    let edges = flows.edges(flow_id).expect("edges");
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].id, keep.id);
    assert_eq!(
        flows.get_node(b).expect_err("gone").kind(),
        ErrorKind::NotFound
    );
    let runs = store.executions().executions(b).expect("executions");
    assert!(runs.is_empty());
    assert_eq!(flows.load_graph(flow_id).expect("graph").nodes.len(), 2);
}
