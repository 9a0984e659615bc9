// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Realtime database emulator integration tests.
//!
//! These tests require the database emulator to be running, e.g.:
//!   firebase emulators:start --only database
//!   FIREBASE_DATABASE_EMULATOR_HOST=127.0.0.1:9000 cargo test --test rtdb_integration
//!
//! Each test uses its own namespace so runs do not see each other's data.

use activity_store::db::{
    collections, ChangeEvent, CollectionAdapter, DbPath, RealtimeDb, Store, StoreError,
};
use activity_store::models::{Activity, ActivityGroup};
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

mod common;

/// Generate a unique namespace for test isolation.
fn unique_namespace() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test-{}", nanos)
}

fn test_store() -> Arc<dyn Store> {
    Arc::new(RealtimeDb::new("", None, &unique_namespace()))
}

async fn next_event(events: &mut activity_store::db::EventStream) -> ChangeEvent {
    tokio::time::timeout(Duration::from_secs(10), events.next())
        .await
        .expect("event should arrive")
        .expect("stream should stay open")
        .expect("event should not be an error")
}

#[tokio::test]
async fn test_activity_lifecycle() {
    require_emulator!();

    let store = test_store();
    let activities: CollectionAdapter<Activity> =
        CollectionAdapter::new(store, collections::ACTIVITIES).unwrap();

    let reference = activities.listen();
    let mut events = reference.subscribe().await.unwrap();
    assert_eq!(
        next_event(&mut events).await,
        ChangeEvent::Put {
            path: DbPath::root(),
            data: Value::Null,
        }
    );

    // Create
    let key = activities.create(&Activity::named("run")).await.unwrap();
    assert_eq!(key.len(), 20, "server keys are push ids");
    let ChangeEvent::Put { path, data } = next_event(&mut events).await else {
        panic!("expected put after create");
    };
    assert_eq!(path, DbPath::parse(&key).unwrap());
    assert_eq!(data, json!({"name": "run"}));

    // Update replaces
    let mut updated: Activity =
        serde_json::from_value(json!({"name": "walk", "minutes": 30})).unwrap();
    updated.id = Some(key.clone());
    activities.update(&updated).await.unwrap();
    let ChangeEvent::Put { data, .. } = next_event(&mut events).await else {
        panic!("expected put after update");
    };
    assert_eq!(data, json!({"id": key, "name": "walk", "minutes": 30}));

    // Delete
    activities.delete(&updated).await.unwrap();
    let ChangeEvent::Put { data, .. } = next_event(&mut events).await else {
        panic!("expected put after delete");
    };
    assert_eq!(data, Value::Null);

    println!("✓ Activity lifecycle verified: key={}", key);
}

#[tokio::test]
async fn test_delete_missing_group_is_ok() {
    require_emulator!();

    let groups: CollectionAdapter<ActivityGroup> =
        CollectionAdapter::new(test_store(), collections::ACTIVITY_GROUPS).unwrap();

    let mut group = ActivityGroup::titled("Gone");
    group.id = Some("does-not-exist".to_string());
    groups.delete(&group).await.unwrap();
}

#[tokio::test]
async fn test_missing_id_never_reaches_emulator() {
    require_emulator!();

    let groups: CollectionAdapter<ActivityGroup> =
        CollectionAdapter::new(test_store(), collections::ACTIVITY_GROUPS).unwrap();

    let err = groups
        .update(&ActivityGroup::titled("No id"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::MissingId { .. }));
}
