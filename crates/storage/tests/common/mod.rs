#![forbid(unsafe_code)]
#![allow(dead_code)]

use wb_core::Id;
use wb_storage::{CollectionItem, NewEndpoint, NewFolder, SqliteStore};

pub struct Seed {
    pub user_id: Id,
    pub workspace_id: Id,
    pub collection_id: Id,
}

pub fn open() -> SqliteStore {
    SqliteStore::open_in_memory().expect("open in-memory store")
}

/// One user owning one workspace with one empty collection.
pub fn seed(store: &SqliteStore) -> Seed {
    let tx = store.begin().expect("begin");
    let workspaces = store.workspaces().with_tx(&tx);
    let user_id = workspaces
        .create_user("dev@example.com")
        .expect("create user");
    let workspace = workspaces
        .create(user_id, "Main")
        .expect("create workspace");
    let collection = store
        .collections()
        .with_tx(&tx)
        .create(workspace.id, "API")
        .expect("create collection");
    tx.commit().expect("commit");
    Seed {
        user_id,
        workspace_id: workspace.id,
        collection_id: collection.id,
    }
}

pub fn folder(
    store: &SqliteStore,
    collection_id: Id,
    parent: Option<Id>,
    name: &str,
) -> CollectionItem {
    let tx = store.begin().expect("begin");
    let item = store
        .items()
        .with_tx(&tx)
        .create_folder(&NewFolder {
            collection_id,
            parent_folder_id: parent,
            name: name.to_string(),
        })
        .expect("create folder");
    tx.commit().expect("commit");
    item
}

pub fn endpoint(
    store: &SqliteStore,
    collection_id: Id,
    parent: Option<Id>,
    name: &str,
) -> CollectionItem {
    let tx = store.begin().expect("begin");
    let item = store
        .items()
        .with_tx(&tx)
        .create_endpoint(&NewEndpoint {
            collection_id,
            parent_folder_id: parent,
            name: name.to_string(),
            url: format!("https://api.example.com/{name}"),
            method: "GET".to_string(),
        })
        .expect("create endpoint");
    tx.commit().expect("commit");
    item
}

pub fn names(items: &[CollectionItem]) -> Vec<&str> {
    items.iter().map(|item| item.name.as_str()).collect()
}

/// Asserts prev/next symmetry and a single head and tail over `items`.
pub fn assert_chain(items: &[CollectionItem]) {
    for (index, item) in items.iter().enumerate() {
        let prev = index.checked_sub(1).map(|i| items[i].id);
        let next = items.get(index + 1).map(|next| next.id);
        assert_eq!(item.prev_id, prev, "prev of {}", item.name);
        assert_eq!(item.next_id, next, "next of {}", item.name);
    }
}
