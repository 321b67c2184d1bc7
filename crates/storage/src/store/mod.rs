#![forbid(unsafe_code)]

mod collections;
mod config;
mod db;
mod error;
mod examples;
mod executions;
mod flows;
mod items;
mod movable;
mod perm;
mod streaming;
mod support;
mod user_variables;
mod workspaces;

pub use collections::*;
pub use config::{JournalMode, StoreConfig};
pub use db::Db;
pub use error::StoreError;
pub use examples::*;
pub use executions::*;
pub use flows::*;
pub use items::*;
pub use movable::*;
pub use perm::*;
pub use streaming::*;
pub use user_variables::*;
pub use workspaces::*;

use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior, params};
use std::path::Path;

/// Owner of the single SQLite connection. Services borrow it through [`Db`];
/// writes go through a transaction opened here and committed by the caller.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    config: StoreConfig,
}

impl SqliteStore {
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let conn = match config.path.as_deref() {
            Some(path) => {
                ensure_parent_dir(path)?;
                Connection::open(path)?
            }
            None => Connection::open_in_memory()?,
        };
        conn.busy_timeout(config.busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let journal_mode = conn.pragma_update_and_check(
            None,
            "journal_mode",
            config.journal_mode.as_str(),
            |row| row.get::<_, String>(0),
        )?;

        support::migrate_sqlite_schema(&conn)?;
        tracing::debug!(
            path = ?config.path,
            journal_mode = %journal_mode,
            busy_timeout_ms = config.busy_timeout.as_millis() as u64,
            "sqlite store opened"
        );

        Ok(Self { conn, config })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(StoreConfig::in_memory())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Read-only binding on the shared connection.
    pub fn db(&self) -> Db<'_> {
        Db::conn(&self.conn)
    }

    pub fn begin(&self) -> Result<Transaction<'_>, StoreError> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Deferred,
        )?)
    }

    /// `BEGIN IMMEDIATE`: takes the write lock up front so chain reads and the
    /// rewrites that follow them cannot interleave with another writer.
    pub fn begin_immediate(&self) -> Result<Transaction<'_>, StoreError> {
        Ok(Transaction::new_unchecked(
            &self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    pub fn schema_version(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key=?1",
                params!["schema_version"],
                |row| row.get::<_, String>(0),
            )
            .optional()?)
    }

    pub fn workspaces(&self) -> WorkspaceStore<'_> {
        WorkspaceStore::new(self.db())
    }

    pub fn user_variables(&self) -> UserVariableStore<'_> {
        UserVariableStore::new(self.db())
    }

    pub fn collections(&self) -> CollectionStore<'_> {
        CollectionStore::new(self.db())
    }

    pub fn items(&self) -> CollectionItemStore<'_> {
        CollectionItemStore::new(self.db())
    }

    pub fn examples(&self) -> ExampleStore<'_> {
        ExampleStore::new(self.db())
    }

    pub fn flows(&self) -> FlowStore<'_> {
        FlowStore::new(self.db())
    }

    pub fn flow_variables(&self) -> FlowVariableStore<'_> {
        FlowVariableStore::new(self.db())
    }

    pub fn executions(&self) -> ExecutionStore<'_> {
        ExecutionStore::new(self.db())
    }

    pub fn streams(&self) -> StreamStore<'_> {
        StreamStore::new(self.db())
    }

    pub fn perms(&self) -> MembershipPerm<'_> {
        MembershipPerm::new(self.db())
    }
}

fn ensure_parent_dir(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent)?;
            Ok(())
        }
        _ => Ok(()),
    }
}
