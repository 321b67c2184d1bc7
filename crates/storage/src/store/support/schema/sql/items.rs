#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS item_folder (
          id BLOB PRIMARY KEY,
          collection_id BLOB NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
          workspace_id BLOB NOT NULL,
          parent_id BLOB REFERENCES item_folder(id) ON DELETE CASCADE,
          name TEXT NOT NULL,
          updated_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS item_api (
          id BLOB PRIMARY KEY,
          collection_id BLOB NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
          workspace_id BLOB NOT NULL,
          folder_id BLOB REFERENCES item_folder(id) ON DELETE SET NULL,
          name TEXT NOT NULL,
          url TEXT NOT NULL DEFAULT '',
          method TEXT NOT NULL DEFAULT 'GET',
          updated_at INTEGER NOT NULL
        );

        -- Non-delta examples of one endpoint form a chain; deltas hang off a
        -- parent example and stay unlinked.
        CREATE TABLE IF NOT EXISTS item_api_example (
          id BLOB PRIMARY KEY,
          item_api_id BLOB NOT NULL REFERENCES item_api(id) ON DELETE CASCADE,
          collection_id BLOB NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
          workspace_id BLOB NOT NULL,
          parent_example_id BLOB REFERENCES item_api_example(id) ON DELETE CASCADE,
          is_delta INTEGER NOT NULL DEFAULT 0,
          is_default INTEGER NOT NULL DEFAULT 0,
          name TEXT NOT NULL,
          body BLOB NOT NULL DEFAULT x'',
          prev_id BLOB,
          next_id BLOB,
          updated_at INTEGER NOT NULL,
          CHECK ((is_delta = 0) = (parent_example_id IS NULL))
        );

        CREATE TABLE IF NOT EXISTS collection_items (
          id BLOB PRIMARY KEY,
          collection_id BLOB NOT NULL REFERENCES collections(id) ON DELETE CASCADE,
          parent_folder_id BLOB REFERENCES collection_items(id) ON DELETE CASCADE,
          item_type INTEGER NOT NULL CHECK (item_type IN (0, 1)),
          folder_id BLOB REFERENCES item_folder(id) ON DELETE CASCADE,
          endpoint_id BLOB REFERENCES item_api(id) ON DELETE CASCADE,
          name TEXT NOT NULL,
          prev_id BLOB,
          next_id BLOB,
          CHECK (
            (item_type = 0 AND folder_id IS NOT NULL AND endpoint_id IS NULL)
            OR (item_type = 1 AND folder_id IS NULL AND endpoint_id IS NOT NULL)
          ),
          CHECK (parent_folder_id IS NULL OR parent_folder_id <> id)
        );
"#;
