#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS node_execution (
          id BLOB PRIMARY KEY,
          node_id BLOB NOT NULL REFERENCES flow_node(id) ON DELETE CASCADE,
          name TEXT NOT NULL,
          state INTEGER NOT NULL,
          error TEXT,
          input_data BLOB NOT NULL,
          input_codec INTEGER NOT NULL DEFAULT 0,
          output_data BLOB,
          output_codec INTEGER NOT NULL DEFAULT 0,
          response_id BLOB,
          graphql_response_id BLOB,
          completed_at INTEGER
        );
"#;
