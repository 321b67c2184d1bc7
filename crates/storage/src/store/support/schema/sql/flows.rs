#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS flow (
          id BLOB PRIMARY KEY,
          workspace_id BLOB NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
          version_parent_id BLOB REFERENCES flow(id) ON DELETE CASCADE,
          name TEXT NOT NULL,
          updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS flow_node (
          id BLOB PRIMARY KEY,
          flow_id BLOB NOT NULL REFERENCES flow(id) ON DELETE CASCADE,
          name TEXT NOT NULL,
          kind INTEGER NOT NULL,
          position_x REAL NOT NULL DEFAULT 0,
          position_y REAL NOT NULL DEFAULT 0,
          state INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS flow_node_request (
          node_id BLOB PRIMARY KEY REFERENCES flow_node(id) ON DELETE CASCADE,
          endpoint_id BLOB,
          example_id BLOB,
          delta_example_id BLOB
        );

        CREATE TABLE IF NOT EXISTS flow_node_condition (
          node_id BLOB PRIMARY KEY REFERENCES flow_node(id) ON DELETE CASCADE,
          expression TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS flow_node_for (
          node_id BLOB PRIMARY KEY REFERENCES flow_node(id) ON DELETE CASCADE,
          iterations INTEGER NOT NULL DEFAULT 0,
          condition TEXT NOT NULL DEFAULT '',
          error_policy INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS flow_node_for_each (
          node_id BLOB PRIMARY KEY REFERENCES flow_node(id) ON DELETE CASCADE,
          iter_expression TEXT NOT NULL DEFAULT '',
          condition TEXT NOT NULL DEFAULT '',
          error_policy INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS flow_node_js (
          node_id BLOB PRIMARY KEY REFERENCES flow_node(id) ON DELETE CASCADE,
          code BLOB NOT NULL,
          code_codec INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS flow_node_ai (
          node_id BLOB PRIMARY KEY REFERENCES flow_node(id) ON DELETE CASCADE,
          prompt TEXT NOT NULL DEFAULT '',
          max_iterations INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS flow_node_ai_provider (
          node_id BLOB PRIMARY KEY REFERENCES flow_node(id) ON DELETE CASCADE,
          provider TEXT NOT NULL DEFAULT '',
          model TEXT NOT NULL DEFAULT '',
          temperature REAL
        );

        CREATE TABLE IF NOT EXISTS flow_node_ai_memory (
          node_id BLOB PRIMARY KEY REFERENCES flow_node(id) ON DELETE CASCADE,
          memory_kind TEXT NOT NULL DEFAULT '',
          window_size INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS flow_edge (
          id BLOB PRIMARY KEY,
          flow_id BLOB NOT NULL REFERENCES flow(id) ON DELETE CASCADE,
          source_id BLOB NOT NULL REFERENCES flow_node(id) ON DELETE CASCADE,
          target_id BLOB NOT NULL REFERENCES flow_node(id) ON DELETE CASCADE,
          source_handle INTEGER NOT NULL DEFAULT 0,
          state INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS flow_variable (
          id BLOB PRIMARY KEY,
          flow_id BLOB NOT NULL REFERENCES flow(id) ON DELETE CASCADE,
          name TEXT NOT NULL,
          value TEXT NOT NULL DEFAULT '',
          enabled INTEGER NOT NULL DEFAULT 1,
          description TEXT NOT NULL DEFAULT '',
          display_order REAL NOT NULL
        );
"#;
