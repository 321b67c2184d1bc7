#![forbid(unsafe_code)]

mod common;

use common::{endpoint, open, seed};
use rusqlite::params;
use wb_core::movable::{Placement, Scope};
use wb_core::{CancelToken, ErrorKind, Id};
use wb_storage::{COLLECTIONS, MovableRepository};

fn collection_names(store: &wb_storage::SqliteStore, workspace_id: Id) -> Vec<String> {
    store
        .collections()
        .list(workspace_id)
        .expect("list collections")
        .into_iter()
        .map(|collection| collection.name)
        .collect()
}

#[test]
fn collections_keep_insertion_order_and_move() {
    let store = open();
    let seed = seed(&store);

    let tx = store.begin().expect("begin");
    let collections = store.collections().with_tx(&tx);
    let b = collections.create(seed.workspace_id, "B").expect("b");
    let c = collections.create(seed.workspace_id, "C").expect("c");
    collections
        .create_at(seed.workspace_id, "first", 0)
        .expect("insert at head");
    collections
        .move_after(seed.collection_id, c.id)
        .expect("move after");
    collections.move_before(c.id, b.id).expect("move before");
    tx.commit().expect("commit");

    assert_eq!(
        collection_names(&store, seed.workspace_id),
        ["first", "C", "B", "API"]
    );
}

#[test]
fn collection_delete_stitches_and_cascades() {
    let store = open();
    let seed = seed(&store);
    endpoint(&store, seed.collection_id, None, "E");

    let tx = store.begin().expect("begin");
    let collections = store.collections().with_tx(&tx);
    collections.create(seed.workspace_id, "B").expect("b");
    collections.delete(seed.collection_id).expect("delete");
    tx.commit().expect("commit");

    assert_eq!(collection_names(&store, seed.workspace_id), ["B"]);
    let items: i64 = store
        .conn()
        .query_row(
            "SELECT COUNT(*) FROM collection_items",
            [],
            |row| row.get(0),
        )
        .expect("count");
    assert_eq!(items, 0);
}

#[test]
fn workspaces_are_ordered_per_member() {
    let store = open();
    let seed = seed(&store);

    let tx = store.begin().expect("begin");
    let workspaces = store.workspaces().with_tx(&tx);
    let second = workspaces.create(seed.user_id, "Second").expect("second");
    let guest = workspaces.create_user("guest@example.com").expect("guest");
    workspaces.add_member(second.id, guest).expect("add member");
    workspaces
        .add_member(seed.workspace_id, guest)
        .expect("add member");
    workspaces
        .move_before(seed.user_id, second.id, seed.workspace_id)
        .expect("reorder owner list");
    let duplicate = workspaces
        .add_member(second.id, guest)
        .expect_err("duplicate member");
    assert_eq!(duplicate.kind(), ErrorKind::Duplicate);
    tx.commit().expect("commit");

    let workspaces = store.workspaces();
    let owner: Vec<_> = workspaces
        .list_for_user(seed.user_id)
        .expect("owner list")
        .into_iter()
        .map(|ws| ws.name)
        .collect();
    let guest_list: Vec<_> = workspaces
        .list_for_user(guest)
        .expect("guest list")
        .into_iter()
        .map(|ws| ws.name)
        .collect();
    assert_eq!(owner, ["Second", "Main"]);
    assert_eq!(guest_list, ["Second", "Main"]);

    let tx = store.begin().expect("begin");
    let workspaces = store.workspaces().with_tx(&tx);
    workspaces
        .remove_member(second.id, guest)
        .expect("remove member");
    workspaces
        .delete(seed.workspace_id)
        .expect("delete workspace");
    tx.commit().expect("commit");

    let workspaces = store.workspaces();
    assert!(workspaces.list_for_user(guest).expect("guest").is_empty());
    let owner = workspaces.list_for_user(seed.user_id).expect("owner");
    assert_eq!(owner.len(), 1);
    assert_eq!(owner[0].id, second.id);
    let report = workspaces
        .ordering()
        .check_integrity(Scope::root(seed.user_id))
        .expect("integrity");
    assert!(report.is_ok());
}

#[test]
fn user_variables_move_and_delete() {
    let store = open();
    let seed = seed(&store);

    let tx = store.begin().expect("begin");
    let variables = store.user_variables().with_tx(&tx);
    let host = variables
        .create(seed.user_id, "HOST", "localhost")
        .expect("host");
    let port = variables
        .create(seed.user_id, "PORT", "8080")
        .expect("port");
    let token = variables.create(seed.user_id, "TOKEN", "t").expect("token");
    variables.move_before(token.id, host.id).expect("move");
    variables.delete(port.id).expect("delete");
    let err = variables
        .create(Id::new_now(), "X", "")
        .expect_err("missing user");
    assert_eq!(err.kind(), ErrorKind::NotFound);
    tx.commit().expect("commit");

    let names: Vec<_> = store
        .user_variables()
        .list(seed.user_id)
        .expect("list")
        .into_iter()
        .map(|variable| variable.name)
        .collect();
    assert_eq!(names, ["TOKEN", "HOST"]);
}

#[test]
fn examples_chain_skips_deltas() {
    let store = open();
    let seed = seed(&store);
    let item = endpoint(&store, seed.collection_id, None, "users");
    let endpoint_id = item.endpoint_id.expect("endpoint");
    let large = vec![b'a'; 8192];

    let tx = store.begin().expect("begin");
    let examples = store.examples().with_tx(&tx);
    let base = examples
        .create(endpoint_id, "base", &large, true)
        .expect("base");
    let second = examples
        .create(endpoint_id, "second", b"{}", false)
        .expect("second");
    let older = examples
        .create_delta(base.id, "delta-1", b"{\"a\":1}")
        .expect("delta");
    let newer = examples
        .create_delta(base.id, "delta-2", b"{\"a\":2}")
        .expect("delta");
    tx.execute(
        "UPDATE item_api_example SET updated_at = updated_at + 10 WHERE id=?1",
        params![newer.id],
    )
    .expect("age delta");
    examples.move_before(second.id, base.id).expect("move");
    let nested = examples
        .create_delta(older.id, "nested", b"{}")
        .expect_err("delta of delta");
    assert_eq!(nested.kind(), ErrorKind::InvalidArgument);
    tx.commit().expect("commit");

    let examples = store.examples();
    let listed: Vec<_> = examples
        .list(endpoint_id)
        .expect("list")
        .into_iter()
        .map(|example| example.name)
        .collect();
    assert_eq!(listed, ["second", "base"]);
    let latest = examples
        .latest_delta(base.id)
        .expect("latest")
        .expect("some");
    assert_eq!(latest.id, newer.id);
    let stored = examples.get(base.id).expect("get");
    assert_ne!(stored.body_codec, wb_core::Codec::None);
    assert_eq!(stored.body_bytes().expect("body"), large);

    let tx = store.begin().expect("begin");
    store
        .examples()
        .with_tx(&tx)
        .delete(base.id)
        .expect("delete");
    tx.commit().expect("commit");
    let latest = store.examples().latest_delta(base.id).expect("latest");
    assert!(latest.is_none());
    assert_eq!(store.examples().list(endpoint_id).expect("list").len(), 1);
}

#[test]
fn flow_variables_use_sort_keys() {
    let store = open();
    let seed = seed(&store);

    let tx = store.begin().expect("begin");
    let flow = store
        .flows()
        .with_tx(&tx)
        .create_flow(seed.workspace_id, "checkout")
        .expect("flow");
    let variables = store.flow_variables().with_tx(&tx);
    let a = variables.create_variable(flow.id, "a", "1", "").expect("a");
    let b = variables.create_variable(flow.id, "b", "2", "").expect("b");
    let c = variables.create_variable(flow.id, "c", "3", "").expect("c");
    variables
        .move_variable(c.id, a.id, Placement::After)
        .expect("move");
    tx.commit().expect("commit");

    let listed = store.flow_variables().variables(flow.id).expect("list");
    let names: Vec<_> = listed
        .iter()
        .map(|variable| variable.name.as_str())
        .collect();
    assert_eq!(names, ["a", "c", "b"]);
    assert!(listed[0].order < listed[1].order && listed[1].order < listed[2].order);
    // Only the moved row got a new key.
    assert_eq!(listed[0].order, a.order);
    assert_eq!(listed[2].order, b.order);

    let tx = store.begin().expect("begin");
    let variables = store.flow_variables().with_tx(&tx);
    variables
        .reorder_variables(flow.id, &[b.id, a.id, c.id])
        .expect("reorder");
    let mut renamed = variables.get_variable(a.id).expect("get");
    renamed.name = "alpha".to_string();
    renamed.enabled = false;
    variables.update_variable(&renamed).expect("update");
    variables.delete_variable(c.id).expect("delete");
    let err = variables
        .reorder_variables(flow.id, &[a.id])
        .expect_err("partial reorder");
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    tx.commit().expect("commit");

    let listed = store.flow_variables().variables(flow.id).expect("list");
    let keys: Vec<_> = listed.iter().map(|variable| variable.order).collect();
    assert_eq!(keys, [0.0, 1.0]);
    assert_eq!(listed[1].name, "alpha");
    assert!(!listed[1].enabled);
}

#[test]
fn chain_rebuild_and_repair() {
    let store = open();
    let seed = seed(&store);
    let a = endpoint(&store, seed.collection_id, None, "A");
    let b = endpoint(&store, seed.collection_id, None, "B");
    let c = endpoint(&store, seed.collection_id, None, "C");
    let scope = Scope::nested(seed.collection_id, None);

    let tx = store.begin().expect("begin");
    let ordering = store.items().with_tx(&tx).ordering();
    let written = ordering
        .rebuild_chain(scope, &[c.id, a.id, b.id])
        .expect("rebuild");
    assert_eq!(written, 3);
    assert_eq!(ordering.order(scope).expect("order"), [c.id, a.id, b.id]);
    assert_eq!(
        ordering
            .rebuild_chain(scope, &[c.id, a.id, b.id])
            .expect("noop"),
        0
    );
    let err = ordering
        .rebuild_chain(scope, &[a.id, b.id])
        .expect_err("missing member");
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    tx.execute(
        "UPDATE collection_items SET next_id=?1 WHERE id=?2",
        params![c.id, b.id],
    )
    .expect("introduce cycle");
    let report = ordering.check_integrity(scope).expect("check");
    assert!(!report.is_ok());
    assert!(ordering.repair_chain(scope).expect("repair") > 0);
    assert!(ordering.check_integrity(scope).expect("check").is_ok());
    assert_eq!(ordering.order(scope).expect("order").len(), 3);
    assert_eq!(ordering.repair_chain(scope).expect("healthy"), 0);
}

#[test]
fn trait_positions_round_trip() {
    let store = open();
    let seed = seed(&store);

    let tx = store.begin().expect("begin");
    let collections = store.collections().with_tx(&tx);
    let b = collections.create(seed.workspace_id, "B").expect("b");
    collections.create(seed.workspace_id, "C").expect("c");
    let repo = wb_storage::LinkedRepository::new(collections.db().clone(), COLLECTIONS);
    let scope = Scope::root(seed.workspace_id);
    assert_eq!(repo.max_position(scope).expect("max"), Some(2));
    repo.update_position(scope, b.id, 0).expect("update");
    repo.update_positions(
        scope,
        &[wb_core::movable::PositionUpdate {
            item_id: seed.collection_id,
            position: 5,
        }],
    )
    .expect("updates");
    tx.commit().expect("commit");

    assert_eq!(
        collection_names(&store, seed.workspace_id),
        ["B", "C", "API"]
    );
}

#[test]
fn canceled_token_stops_writes() {
    let store = open();
    let seed = seed(&store);
    let cancel = CancelToken::new();

    let tx = store.begin().expect("begin");
    let collections = store.collections().with_tx(&tx).with_cancel(cancel.clone());
    collections
        .create(seed.workspace_id, "before")
        .expect("create");
    cancel.cancel();
    let err = collections
        .create(seed.workspace_id, "after")
        .expect_err("canceled");
    assert_eq!(err.kind(), ErrorKind::Canceled);
    drop(tx);

    assert_eq!(collection_names(&store, seed.workspace_id), ["API"]);
}

#[test]
fn append_refuses_linked_rows() {
    let store = open();
    let seed = seed(&store);

    let tx = store.begin().expect("begin");
    store
        .collections()
        .with_tx(&tx)
        .create(seed.workspace_id, "B")
        .expect("b");
    let ordering = store.collections().with_tx(&tx).ordering();
    let err = ordering
        .append(Scope::root(seed.workspace_id), seed.collection_id)
        .expect_err("already linked");
    assert_eq!(err.kind(), ErrorKind::Duplicate);
    let err = store
        .collections()
        .with_tx(&tx)
        .create(Id::new_now(), "orphan")
        .expect_err("missing workspace");
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
