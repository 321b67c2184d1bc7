#![forbid(unsafe_code)]

use crate::RunError;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use wb_core::flow::Flow;
use wb_core::{CancelToken, Id};
use wb_storage::SqliteStore;

/// A frozen copy of a live flow, ready to execute.
#[derive(Clone, Debug, Serialize)]
pub struct VersionSnapshot {
    pub version: Flow,
    /// Live node id to version node id.
    pub node_mapping: BTreeMap<Id, Id>,
}

impl VersionSnapshot {
    /// Live ids to version ids as text, the blob stored on the version row.
    pub fn mapping_json(&self) -> Value {
        let map = self
            .node_mapping
            .iter()
            .map(|(live, version)| (live.to_text(), Value::String(version.to_text())))
            .collect();
        Value::Object(map)
    }
}

/// Copies the live flow's nodes, edges and variables into a new version in
/// one transaction and records the node mapping on it.
pub(crate) fn snapshot_version(
    store: &SqliteStore,
    live_flow_id: Id,
    cancel: &CancelToken,
) -> Result<VersionSnapshot, RunError> {
    let flows = store.flows().with_cancel(cancel.clone());
    let variables = store.flow_variables().with_cancel(cancel.clone());
    let live = flows.get_flow(live_flow_id)?;
    if live.is_version() {
        return Err(RunError::VersionNotRunnable(live.id));
    }
    let nodes = flows.nodes(live.id)?;
    let edges = flows.edges(live.id)?;
    let live_variables = variables.variables(live.id)?;

    let tx = store.begin_immediate()?;
    let flows = flows.with_tx(&tx);
    let variables = variables.with_tx(&tx);
    let version = flows.create_version(live.id)?;

    let mut node_mapping = BTreeMap::new();
    for node in &nodes {
        let copy = flows.create_node(version.id, &node.name, node.position, node.payload.clone())?;
        node_mapping.insert(node.id, copy.id);
    }
    for edge in &edges {
        let (Some(&source), Some(&target)) = (
            node_mapping.get(&edge.source_id),
            node_mapping.get(&edge.target_id),
        ) else {
            continue;
        };
        flows.create_edge(version.id, source, target, edge.handle)?;
    }
    for variable in &live_variables {
        let mut copy = variables.create_variable(
            version.id,
            &variable.name,
            &variable.value,
            &variable.description,
        )?;
        if !variable.enabled {
            copy.enabled = false;
            variables.update_variable(&copy)?;
        }
    }

    let snapshot = VersionSnapshot {
        version,
        node_mapping,
    };
    let mapping = serde_json::to_vec(&snapshot.mapping_json())
        .map_err(|_| wb_core::CoreError::InvalidArgument("node mapping is not serializable"))?;
    flows.update_version_node_mapping(snapshot.version.id, &mapping)?;
    tx.commit().map_err(wb_storage::StoreError::from)?;
    tracing::debug!(
        flow_id = %live.id,
        version_id = %snapshot.version.id,
        nodes = snapshot.node_mapping.len(),
        "flow version snapshotted"
    );
    Ok(snapshot)
}
