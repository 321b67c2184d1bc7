#![forbid(unsafe_code)]

//! Ordered lists applied to tables. Every concrete store is a column wiring
//! ([`MovableConfig`]) handed to one of the two repositories here.

mod linked;
mod sort_key;

pub use linked::LinkedRepository;
pub use sort_key::SortKeyRepository;

use super::StoreError;
use wb_core::Id;
use wb_core::movable::{ListKind, MovableConfig, MovableItem, ParentScope, PositionUpdate, Scope};

/// Storage half of an ordered list.
pub trait MovableRepository {
    fn kind(&self) -> ListKind;

    /// The chain under `scope`, head first, with derived positions.
    fn items_by_parent(&self, scope: Scope) -> Result<Vec<MovableItem>, StoreError>;

    fn max_position(&self, scope: Scope) -> Result<Option<i64>, StoreError> {
        Ok(self
            .items_by_parent(scope)?
            .last()
            .map(|item| item.position))
    }

    /// Moves one item to `position`, clamped to the chain bounds.
    fn update_position(&self, scope: Scope, item_id: Id, position: i64) -> Result<(), StoreError>;

    fn update_positions(&self, scope: Scope, updates: &[PositionUpdate])
    -> Result<(), StoreError>;

    /// Takes the item out of the order without deleting its row.
    fn remove(&self, scope: Scope, item_id: Id) -> Result<(), StoreError>;
}

pub const COLLECTIONS: MovableConfig = MovableConfig {
    kind: ListKind::Collections,
    table: "collections",
    id_column: "id",
    prev_column: "prev_id",
    next_column: "next_id",
    scope: ParentScope::DirectFk {
        column: "workspace_id",
        parent_table: "workspaces",
    },
    filter: None,
};

pub const WORKSPACES: MovableConfig = MovableConfig {
    kind: ListKind::Workspaces,
    table: "workspaces_users",
    id_column: "workspace_id",
    prev_column: "prev_id",
    next_column: "next_id",
    scope: ParentScope::JoinTable {
        parent_column: "user_id",
        parent_table: "users",
    },
    filter: None,
};

pub const USER_VARIABLES: MovableConfig = MovableConfig {
    kind: ListKind::UserVariables,
    table: "user_variables",
    id_column: "id",
    prev_column: "prev_id",
    next_column: "next_id",
    scope: ParentScope::UserLookup { column: "user_id" },
    filter: None,
};

pub const ENDPOINT_EXAMPLES: MovableConfig = MovableConfig {
    kind: ListKind::EndpointExamples,
    table: "item_api_example",
    id_column: "id",
    prev_column: "prev_id",
    next_column: "next_id",
    scope: ParentScope::DirectFk {
        column: "item_api_id",
        parent_table: "item_api",
    },
    filter: Some("is_delta = 0"),
};

pub const COLLECTION_ITEMS: MovableConfig = MovableConfig {
    kind: ListKind::CollectionItems,
    table: "collection_items",
    id_column: "id",
    prev_column: "prev_id",
    next_column: "next_id",
    scope: ParentScope::Nested {
        column: "collection_id",
        nested_column: "parent_folder_id",
        parent_table: "collections",
        container: "item_type = 0",
    },
    filter: None,
};

/// New order after applying explicit position requests: requested items are
/// placed in ascending target order, the rest keep their relative order.
pub(crate) fn reorder_with(
    order: &[Id],
    updates: &[PositionUpdate],
) -> Result<Vec<Id>, StoreError> {
    for update in updates {
        if !order.contains(&update.item_id) {
            return Err(StoreError::NotFound(
                "position update names an item outside the list",
            ));
        }
    }
    let mut sorted: Vec<PositionUpdate> = updates.to_vec();
    sorted.sort_by_key(|update| update.position);

    let mut next: Vec<Id> = order
        .iter()
        .copied()
        .filter(|id| !sorted.iter().any(|update| update.item_id == *id))
        .collect();
    for update in sorted {
        let index = update.position.clamp(0, next.len() as i64) as usize;
        next.insert(index, update.item_id);
    }
    Ok(next)
}
