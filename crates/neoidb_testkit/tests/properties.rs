//! End-to-end behavior of the adapter over the memory engine.

use neoidb_core::{Config, Database, DbError, IndexDetails, Order, PreconditionError};
use neoidb_engine::{
    EngineErrorKind, Key, KeyRange, MemoryEngine, MemoryEngineConfig, StoreParameters,
};
use neoidb_testkit::prelude::*;
use serde_json::json;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn assert_precondition(err: &DbError, expected: &PreconditionError) {
    match err {
        DbError::Precondition(actual) => assert_eq!(actual, expected),
        other => panic!("expected a precondition error, got {other:?}"),
    }
}

#[tokio::test]
async fn preconditions_open_no_transactions() {
    let unopened = TestDatabase::unopened();
    let key = Key::from(1);
    let not_open = PreconditionError::NotOpen;

    assert_precondition(&unopened.get_by_key(ITEMS, &key).await.unwrap_err(), &not_open);
    assert_precondition(
        &unopened.get_by_index(NOTES, BY_TITLE, &key).await.unwrap_err(),
        &not_open,
    );
    assert_precondition(&unopened.get_all(ITEMS, None, None).await.unwrap_err(), &not_open);
    assert_precondition(&unopened.add(ITEMS, json!(1), None).await.unwrap_err(), &not_open);
    assert_precondition(&unopened.update(ITEMS, json!(1), None).await.unwrap_err(), &not_open);
    assert_precondition(&unopened.delete(ITEMS, &key).await.unwrap_err(), &not_open);
    assert_precondition(&unopened.clear(ITEMS).await.unwrap_err(), &not_open);
    assert_precondition(
        &unopened
            .open_cursor(ITEMS, |_| ControlFlow::Continue(()), None)
            .await
            .unwrap_err(),
        &not_open,
    );
    assert_eq!(unopened.engine().stats().transactions_started, 0);

    let db = TestDatabase::open().await;
    let missing = PreconditionError::store_not_found("missing");
    assert_precondition(&db.get_by_key("missing", &key).await.unwrap_err(), &missing);
    assert_precondition(&db.add("missing", json!(1), None).await.unwrap_err(), &missing);
    assert_precondition(&db.clear("missing").await.unwrap_err(), &missing);
    assert_precondition(
        &db.get_all("missing", None, None).await.unwrap_err(),
        &missing,
    );
    assert_eq!(db.engine().stats().transactions_started, 0);
}

#[tokio::test]
async fn add_then_get_round_trips() {
    let db = TestDatabase::open().await;
    let added = db.add(ITEMS, json!({"text": "hello"}), None).await.unwrap();
    assert_eq!(added.value, json!({"text": "hello"}));
    assert_eq!(
        db.get_by_key(ITEMS, &added.key).await.unwrap(),
        Some(json!({"text": "hello"}))
    );
}

#[tokio::test]
async fn add_resolves_with_engine_key() {
    let db = TestDatabase::open().await;
    let explicit = db
        .add(ITEMS, json!("explicit"), Some(Key::from(41)))
        .await
        .unwrap();
    assert_eq!(explicit.key, Key::from(41));

    // The generator continues above the explicit key.
    let generated = db.add(ITEMS, json!("generated"), None).await.unwrap();
    assert_eq!(generated.key, Key::from(42));

    let note = db.add(NOTES, note("title", 1), None).await.unwrap();
    assert_eq!(note.key, Key::from(1));
}

#[tokio::test]
async fn update_is_not_stale() {
    let db = TestDatabase::open().await;
    let added = db.add(ITEMS, json!({"v": 1}), None).await.unwrap();
    db.update(ITEMS, json!({"v": 2}), Some(added.key.clone()))
        .await
        .unwrap();
    assert_eq!(
        db.get_by_key(ITEMS, &added.key).await.unwrap(),
        Some(json!({"v": 2}))
    );
}

#[tokio::test]
async fn delete_then_get_is_none() {
    let db = TestDatabase::open().await;
    let added = db.add(ITEMS, json!("gone"), None).await.unwrap();
    db.delete(ITEMS, &added.key).await.unwrap();
    assert_eq!(db.get_by_key(ITEMS, &added.key).await.unwrap(), None);

    // Deleting a missing key is not an error.
    db.delete(ITEMS, &added.key).await.unwrap();
}

#[tokio::test]
async fn clear_resolves_after_commit() {
    let db = TestDatabase::open().await;
    db.seed(ITEMS, [json!(1), json!(2)]).await;
    let committed_before = db.engine().stats().transactions_committed;

    db.clear(ITEMS).await.unwrap();

    assert_eq!(
        db.engine().stats().transactions_committed,
        committed_before + 1
    );
    assert!(db.get_all(ITEMS, None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn get_all_orders_by_key() {
    let db = TestDatabase::open().await;
    for id in [1, 3, 2] {
        db.add(NOTES, json!({"id": id, "title": format!("t{id}"), "priority": id}), None)
            .await
            .unwrap();
    }

    let ids = |records: Vec<serde_json::Value>| -> Vec<i64> {
        records
            .iter()
            .filter_map(|record| record["id"].as_i64())
            .collect()
    };

    let ascending = db.get_all(NOTES, None, None).await.unwrap();
    assert_eq!(ids(ascending), vec![1, 2, 3]);

    let details = IndexDetails::new(BY_PRIORITY).order(Order::Descending);
    let descending = db.get_all(NOTES, None, Some(&details)).await.unwrap();
    assert_eq!(ids(descending), vec![3, 2, 1]);

    let range = KeyRange::lower_bound(2, false);
    let bounded = db.get_all(NOTES, Some(&range), None).await.unwrap();
    assert_eq!(ids(bounded), vec![2, 3]);
}

#[tokio::test]
async fn multi_entry_index_walk() {
    let db = TestDatabase::open().await;
    db.seed(
        NOTES,
        [
            json!({"title": "a", "priority": 1, "tags": ["x", "y"]}),
            json!({"title": "b", "priority": 1, "tags": ["y"]}),
        ],
    )
    .await;

    let details = IndexDetails::new(BY_TAG);
    let titles: Vec<String> = db
        .get_all(NOTES, Some(&KeyRange::only("y")), Some(&details))
        .await
        .unwrap()
        .into_iter()
        .filter_map(|record| record["title"].as_str().map(str::to_string))
        .collect();
    assert_eq!(titles, vec!["a", "b"]);
}

#[tokio::test]
async fn concurrent_adds_get_distinct_keys() {
    let db = TestDatabase::open().await;
    let (a, b, c) = tokio::join!(
        db.add(ITEMS, json!("a"), None),
        db.add(ITEMS, json!("b"), None),
        db.add(ITEMS, json!("c"), None),
    );
    let mut keys = vec![a.unwrap().key, b.unwrap().key, c.unwrap().key];
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 3);
    assert_eq!(db.get_all(ITEMS, None, None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn concurrent_adds_across_tasks() {
    let db = Arc::new(TestDatabase::open().await);
    let tasks: Vec<_> = (0..8)
        .map(|n| {
            let db = Arc::clone(&db);
            tokio::spawn(async move { db.add(ITEMS, json!(n), None).await.unwrap().key })
        })
        .collect();

    let mut keys = Vec::new();
    for task in tasks {
        keys.push(task.await.unwrap());
    }
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), 8);
    assert_eq!(db.get_all(ITEMS, None, None).await.unwrap().len(), 8);
}

#[tokio::test]
async fn upgrade_runs_exactly_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let db = Database::new(MemoryEngine::new(), Config::new("upgrades"));

    let counter = Arc::clone(&calls);
    db.open_with(1, move |change, schema| {
        counter.fetch_add(1, Ordering::SeqCst);
        assert_eq!(change.old_version, 0);
        assert_eq!(change.new_version, 1);
        schema.create_object_store("a", StoreParameters::new().auto_increment(true))
    })
    .await
    .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Reopening at the same version does not upgrade.
    let counter = Arc::clone(&calls);
    db.open_with(1, move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .await
    .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let counter = Arc::clone(&calls);
    db.open_with(2, move |change, schema| {
        counter.fetch_add(1, Ordering::SeqCst);
        assert_eq!(change.old_version, 1);
        schema.create_object_store("b", StoreParameters::new())
    })
    .await
    .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(db.version(), 2);
    assert_eq!(db.store_names(), vec!["a", "b"]);
}

#[tokio::test]
async fn data_survives_upgrade() {
    let db = TestDatabase::open().await;
    let added = db.add(ITEMS, json!("kept"), None).await.unwrap();

    db.open_with(2, |_, schema| {
        schema.create_object_store("extra", StoreParameters::new())
    })
    .await
    .unwrap();

    assert!(db.has_store("extra"));
    assert_eq!(
        db.get_by_key(ITEMS, &added.key).await.unwrap(),
        Some(json!("kept"))
    );
}

#[tokio::test]
async fn failed_upgrade_rejects_open() {
    let db = TestDatabase::open().await;
    let err = db
        .open_with(2, |_, schema| {
            schema.create_object_store(ITEMS, StoreParameters::new())
        })
        .await
        .unwrap_err();
    assert_eq!(
        err.engine_error().map(|e| e.kind()),
        Some(EngineErrorKind::Abort)
    );
    assert!(err
        .engine_error()
        .is_some_and(|e| e.message().contains("ConstraintError")));
    assert_eq!(db.version(), 1);
    assert_eq!(db.engine().stored_version("testkit"), Some(1));
}

#[tokio::test]
async fn lower_version_is_a_version_error() {
    let db = TestDatabase::open().await;
    let err = db.open(0, None).await.unwrap_err();
    assert_eq!(
        err.engine_error().map(|e| e.kind()),
        Some(EngineErrorKind::Data)
    );

    db.open_with(3, |_, _| Ok(())).await.unwrap();
    let err = db.open(2, None).await.unwrap_err();
    assert_eq!(
        err.engine_error().map(|e| e.kind()),
        Some(EngineErrorKind::Version)
    );
}

#[tokio::test]
async fn duplicate_add_surfaces_as_abort() {
    let db = TestDatabase::open().await;
    db.add(USERS, json!({"email": "a@x", "handle": "a"}), None)
        .await
        .unwrap();

    let err = db
        .add(USERS, json!({"email": "a@x", "handle": "other"}), None)
        .await
        .unwrap_err();
    assert!(err.is_abort());
    assert_eq!(
        err.engine_error().map(|e| e.kind()),
        Some(EngineErrorKind::Constraint)
    );

    let err = db
        .add(USERS, json!({"email": "b@x", "handle": "a"}), None)
        .await
        .unwrap_err();
    assert!(err.is_abort());

    assert_eq!(db.get_all(USERS, None, None).await.unwrap().len(), 1);
    assert_eq!(db.engine().stats().transactions_aborted, 2);
}

#[tokio::test]
async fn data_errors_reject_and_roll_back() {
    let db = TestDatabase::open().await;

    // In-line store with an explicit key.
    let err = db
        .add(NOTES, note("x", 1), Some(Key::from(9)))
        .await
        .unwrap_err();
    assert_eq!(
        err.engine_error().map(|e| e.kind()),
        Some(EngineErrorKind::Data)
    );

    // In-line store without a generator and no key in the record.
    let err = db
        .update(USERS, json!({"handle": "nobody"}), None)
        .await
        .unwrap_err();
    assert!(err.is_abort());
    assert!(db.get_all(NOTES, None, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn quota_surfaces_as_engine_error() {
    let db = TestDatabase::open_with(MemoryEngineConfig::new().max_records_per_store(2)).await;
    db.seed(ITEMS, [json!(1), json!(2)]).await;

    let err = db.add(ITEMS, json!(3), None).await.unwrap_err();
    assert!(matches!(&err, DbError::Engine(e) if e.kind() == EngineErrorKind::QuotaExceeded));
    assert!(!err.is_abort());
    assert_eq!(db.get_all(ITEMS, None, None).await.unwrap().len(), 2);
    assert_eq!(db.engine().stats().transactions_errored, 1);
}

#[tokio::test]
async fn cursor_visits_in_key_order() {
    let db = TestDatabase::open().await;
    for key in [5, 1, 3] {
        db.add(ITEMS, json!(key), Some(Key::from(key)))
            .await
            .unwrap();
    }

    let mut visited = Vec::new();
    db.open_cursor(
        ITEMS,
        |record| {
            visited.push(record.key);
            ControlFlow::Continue(())
        },
        Some(&KeyRange::upper_bound(5, true)),
    )
    .await
    .unwrap();
    assert_eq!(visited, vec![Key::from(1), Key::from(3)]);
}

#[tokio::test]
async fn unique_index_lookup() {
    let db = TestDatabase::open().await;
    db.add(USERS, json!({"email": "z@x", "handle": "zed"}), None)
        .await
        .unwrap();
    let found = db
        .get_by_index(USERS, BY_HANDLE, &Key::from("zed"))
        .await
        .unwrap();
    assert_eq!(found, Some(json!({"email": "z@x", "handle": "zed"})));
    assert_eq!(
        db.get_by_index(USERS, BY_HANDLE, &Key::from("none"))
            .await
            .unwrap(),
        None
    );
}
