#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE INDEX IF NOT EXISTS idx_workspaces_users_user ON workspaces_users(user_id);
        CREATE INDEX IF NOT EXISTS idx_user_variables_user ON user_variables(user_id);
        CREATE INDEX IF NOT EXISTS idx_collections_workspace ON collections(workspace_id);
        CREATE INDEX IF NOT EXISTS idx_collections_stream ON collections(workspace_id, updated_at DESC);
        CREATE INDEX IF NOT EXISTS idx_item_folder_stream ON item_folder(workspace_id, updated_at DESC);
        CREATE INDEX IF NOT EXISTS idx_item_api_stream ON item_api(workspace_id, updated_at DESC);
        CREATE INDEX IF NOT EXISTS idx_item_api_example_stream ON item_api_example(workspace_id, updated_at DESC);
        CREATE INDEX IF NOT EXISTS idx_item_api_example_endpoint ON item_api_example(item_api_id, is_delta);
        CREATE INDEX IF NOT EXISTS idx_item_api_example_delta
          ON item_api_example(parent_example_id, is_delta, updated_at DESC);
        CREATE INDEX IF NOT EXISTS idx_collection_items_scope ON collection_items(collection_id, parent_folder_id);
        CREATE UNIQUE INDEX IF NOT EXISTS idx_collection_items_folder ON collection_items(folder_id) WHERE folder_id IS NOT NULL;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_collection_items_endpoint ON collection_items(endpoint_id) WHERE endpoint_id IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_flow_stream ON flow(workspace_id, updated_at DESC);
        CREATE INDEX IF NOT EXISTS idx_flow_versions ON flow(version_parent_id) WHERE version_parent_id IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_flow_node_flow ON flow_node(flow_id);
        CREATE INDEX IF NOT EXISTS idx_flow_edge_flow ON flow_edge(flow_id);
        CREATE INDEX IF NOT EXISTS idx_flow_edge_source ON flow_edge(source_id, source_handle);
        CREATE INDEX IF NOT EXISTS idx_flow_variable_order ON flow_variable(flow_id, display_order);
        CREATE INDEX IF NOT EXISTS idx_node_execution_node ON node_execution(node_id, id);
"#;
