#![forbid(unsafe_code)]

//! Ordered, parent-scoped lists.
//!
//! Rows carry `prev_id` / `next_id` pointers; positions are derived by walking
//! the chain from its head and are never stored. Everything in this module is
//! pure: stores load the rows, call a planner, and write back only the rows
//! the plan names.

mod append;
mod integrity;
mod plan;
mod sort_key;

pub use append::*;
pub use integrity::*;
pub use plan::*;
pub use sort_key::*;

use crate::ids::Id;

/// Which ordered list a row participates in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListKind {
    /// Mixed folders and endpoints under a collection root or a folder.
    CollectionItems,
    /// Folder-only view of the collection-item chain.
    CollectionFolders,
    /// Endpoint-only view of the collection-item chain.
    CollectionEndpoints,
    EndpointExamples,
    Collections,
    Workspaces,
    UserVariables,
    FlowVariables,
}

impl ListKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CollectionItems => "collection_items",
            Self::CollectionFolders => "collection_folders",
            Self::CollectionEndpoints => "collection_endpoints",
            Self::EndpointExamples => "endpoint_examples",
            Self::Collections => "collections",
            Self::Workspaces => "workspaces",
            Self::UserVariables => "user_variables",
            Self::FlowVariables => "flow_variables",
        }
    }
}

/// How an ordered row's parent is resolved from storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParentScope {
    /// The row holds the parent id in `column`.
    DirectFk {
        column: &'static str,
        parent_table: &'static str,
    },
    /// Like `DirectFk`, narrowed by a nullable second column that refers to a
    /// row of the same table (a folder inside the parent). NULL means the root.
    /// Only rows matching `container` may hold a nested chain.
    Nested {
        column: &'static str,
        nested_column: &'static str,
        parent_table: &'static str,
        container: &'static str,
    },
    /// Links live on an n-to-m join row; `parent_column` holds the parent and
    /// the config's `id_column` holds the entity.
    JoinTable {
        parent_column: &'static str,
        parent_table: &'static str,
    },
    /// The row holds a user id directly.
    UserLookup { column: &'static str },
}

impl ParentScope {
    pub fn parent_table(&self) -> &'static str {
        match self {
            Self::DirectFk { parent_table, .. }
            | Self::Nested { parent_table, .. }
            | Self::JoinTable { parent_table, .. } => parent_table,
            Self::UserLookup { .. } => "users",
        }
    }

    pub fn parent_column(&self) -> &'static str {
        match self {
            Self::DirectFk { column, .. }
            | Self::Nested { column, .. }
            | Self::UserLookup { column } => column,
            Self::JoinTable { parent_column, .. } => parent_column,
        }
    }

    pub fn nested_column(&self) -> Option<&'static str> {
        match self {
            Self::Nested { nested_column, .. } => Some(nested_column),
            _ => None,
        }
    }

    pub fn container(&self) -> Option<&'static str> {
        match self {
            Self::Nested { container, .. } => Some(container),
            _ => None,
        }
    }
}

/// Column wiring for one concrete ordered table. Names are compile-time
/// constants; they are interpolated into SQL by the storage layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MovableConfig {
    pub kind: ListKind,
    pub table: &'static str,
    pub id_column: &'static str,
    pub prev_column: &'static str,
    pub next_column: &'static str,
    pub scope: ParentScope,
    /// Static predicate that every chain row must satisfy (for tables that
    /// hold rows outside any chain).
    pub filter: Option<&'static str>,
}

/// The list a row belongs to: the parent id plus, for nested scopes, the
/// folder inside that parent (`None` is the root).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Scope {
    pub parent_id: Id,
    pub nested_id: Option<Id>,
}

impl Scope {
    pub fn root(parent_id: Id) -> Self {
        Self {
            parent_id,
            nested_id: None,
        }
    }

    pub fn nested(parent_id: Id, nested_id: Option<Id>) -> Self {
        Self {
            parent_id,
            nested_id,
        }
    }

    /// The innermost parent: the folder when nested, otherwise the root parent.
    pub fn effective_parent(&self) -> Id {
        self.nested_id.unwrap_or(self.parent_id)
    }
}

/// A row seen through the ordering lens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MovableItem {
    pub id: Id,
    pub parent_id: Id,
    pub prev_id: Option<Id>,
    pub next_id: Option<Id>,
    pub position: i64,
}

/// Raw pointer triple as loaded from a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinkedRow {
    pub id: Id,
    pub prev_id: Option<Id>,
    pub next_id: Option<Id>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    Before,
    After,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PositionUpdate {
    pub item_id: Id,
    pub position: i64,
}
