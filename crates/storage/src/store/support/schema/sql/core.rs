#![forbid(unsafe_code)]

pub(super) const SQL: &str = r#"

        CREATE TABLE IF NOT EXISTS meta (
          key TEXT PRIMARY KEY,
          value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS users (
          id BLOB PRIMARY KEY,
          email TEXT NOT NULL DEFAULT ''
        );

        CREATE TABLE IF NOT EXISTS workspaces (
          id BLOB PRIMARY KEY,
          name TEXT NOT NULL,
          updated_at INTEGER NOT NULL
        );

        -- Membership rows double as each user's ordered workspace list.
        CREATE TABLE IF NOT EXISTS workspaces_users (
          workspace_id BLOB NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
          user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
          role INTEGER NOT NULL DEFAULT 0,
          prev_id BLOB,
          next_id BLOB,
          PRIMARY KEY (workspace_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS user_variables (
          id BLOB PRIMARY KEY,
          user_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
          name TEXT NOT NULL,
          value TEXT NOT NULL DEFAULT '',
          prev_id BLOB,
          next_id BLOB
        );

        CREATE TABLE IF NOT EXISTS collections (
          id BLOB PRIMARY KEY,
          workspace_id BLOB NOT NULL REFERENCES workspaces(id) ON DELETE CASCADE,
          name TEXT NOT NULL,
          prev_id BLOB,
          next_id BLOB,
          updated_at INTEGER NOT NULL
        );
"#;
