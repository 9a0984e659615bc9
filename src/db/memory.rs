// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process database for tests and local development.
//!
//! Follows realtime database semantics: writing `null` or an empty object
//! deletes a node, emptied parents disappear, and subscribers see every
//! write as a `Put` relative to their own location. Every request is also
//! recorded so callers can check exactly what was asked of the store.

use crate::db::push_id::PushIdGenerator;
use crate::db::{ChangeEvent, DbPath, EventStream, Store, StoreError};
use futures_util::future::BoxFuture;
use futures_util::{stream, FutureExt, StreamExt};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

const CHANGE_CHANNEL_CAPACITY: usize = 1024;

/// A request received by [`MemoryDb`].
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Push { path: DbPath, value: Value },
    Set { path: DbPath, value: Value },
    Remove { path: DbPath },
    Subscribe { path: DbPath },
}

/// The new value at `path` after a write (`Null` if removed).
#[derive(Debug, Clone)]
struct Change {
    path: DbPath,
    value: Value,
}

struct Inner {
    root: RwLock<Value>,
    ids: PushIdGenerator,
    changes: broadcast::Sender<Change>,
    requests: Mutex<Vec<Request>>,
}

/// In-memory JSON tree implementing [`Store`].
#[derive(Clone)]
pub struct MemoryDb {
    inner: Arc<Inner>,
}

impl Default for MemoryDb {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::with_change_capacity(CHANGE_CHANNEL_CAPACITY)
    }

    /// A store whose subscribers may fall `capacity` changes behind before
    /// they are resynchronized with a fresh snapshot.
    pub fn with_change_capacity(capacity: usize) -> Self {
        let (changes, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(Inner {
                root: RwLock::new(Value::Null),
                ids: PushIdGenerator::new(),
                changes,
                requests: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Current value at `path` (`Null` if absent).
    pub fn get(&self, path: &DbPath) -> Value {
        self.inner.get(path)
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<Request> {
        self.inner.log().to_vec()
    }

    pub fn clear_requests(&self) {
        self.inner.log().clear();
    }

    fn write(&self, path: &DbPath, value: Value) {
        let value = normalize(value);
        let mut root = self.inner.root.write().unwrap_or_else(|e| e.into_inner());
        if is_empty(&value) {
            remove_at(&mut root, path.segments());
        } else {
            set_at(&mut root, path.segments(), value);
        }
        let current = lookup(&root, path.segments());
        // No receivers is not an error.
        let _ = self.inner.changes.send(Change {
            path: path.clone(),
            value: current,
        });
    }
}

impl Inner {
    fn get(&self, path: &DbPath) -> Value {
        let root = self.root.read().unwrap_or_else(|e| e.into_inner());
        lookup(&root, path.segments())
    }

    /// Drop everything buffered in `rx` and return the value at `path` as of
    /// the new receiver's starting point.
    fn resync(&self, rx: &mut broadcast::Receiver<Change>, path: &DbPath) -> Value {
        let root = self.root.read().unwrap_or_else(|e| e.into_inner());
        *rx = rx.resubscribe();
        lookup(&root, path.segments())
    }

    fn log(&self) -> std::sync::MutexGuard<'_, Vec<Request>> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Store for MemoryDb {
    fn push<'a>(
        &'a self,
        path: &'a DbPath,
        value: Value,
    ) -> BoxFuture<'a, Result<String, StoreError>> {
        async move {
            self.inner.log().push(Request::Push {
                path: path.clone(),
                value: value.clone(),
            });
            let key = self.inner.ids.generate()?;
            self.write(&path.child(&key)?, value);
            tracing::debug!(path = %path, key = %key, "memory push");
            Ok(key)
        }
        .boxed()
    }

    fn set<'a>(&'a self, path: &'a DbPath, value: Value) -> BoxFuture<'a, Result<(), StoreError>> {
        async move {
            self.inner.log().push(Request::Set {
                path: path.clone(),
                value: value.clone(),
            });
            self.write(path, value);
            tracing::debug!(path = %path, "memory set");
            Ok(())
        }
        .boxed()
    }

    fn remove<'a>(&'a self, path: &'a DbPath) -> BoxFuture<'a, Result<(), StoreError>> {
        async move {
            self.inner
                .log()
                .push(Request::Remove { path: path.clone() });
            self.write(path, Value::Null);
            tracing::debug!(path = %path, "memory remove");
            Ok(())
        }
        .boxed()
    }

    fn subscribe<'a>(
        &'a self,
        path: &'a DbPath,
    ) -> BoxFuture<'a, Result<EventStream, StoreError>> {
        async move {
            self.inner
                .log()
                .push(Request::Subscribe { path: path.clone() });

            // Subscribe while holding the read lock so no write lands
            // between the snapshot and the first change.
            let (rx, current) = {
                let root = self.inner.root.read().unwrap_or_else(|e| e.into_inner());
                (
                    self.inner.changes.subscribe(),
                    lookup(&root, path.segments()),
                )
            };

            let initial = stream::once(async move {
                Ok::<_, StoreError>(ChangeEvent::Put {
                    path: DbPath::root(),
                    data: current,
                })
            });

            let updates = stream::unfold(
                (rx, self.inner.clone(), path.clone()),
                |(mut rx, inner, path)| async move {
                    loop {
                        match rx.recv().await {
                            Ok(change) => {
                                if let Some(event) = translate(&path, &change) {
                                    return Some((Ok::<_, StoreError>(event), (rx, inner, path)));
                                }
                            }
                            Err(RecvError::Lagged(skipped)) => {
                                tracing::warn!(path = %path, skipped, "Subscriber lagged, resending snapshot");
                                let event = ChangeEvent::Put {
                                    path: DbPath::root(),
                                    data: inner.resync(&mut rx, &path),
                                };
                                return Some((Ok::<_, StoreError>(event), (rx, inner, path)));
                            }
                            Err(RecvError::Closed) => return None,
                        }
                    }
                },
            );

            Ok(initial.chain(updates).boxed())
        }
        .boxed()
    }
}

/// Express a write as seen from a subscription at `sub`.
fn translate(sub: &DbPath, change: &Change) -> Option<ChangeEvent> {
    if let Some(relative) = change.path.strip_prefix(sub) {
        return Some(ChangeEvent::Put {
            path: relative,
            data: change.value.clone(),
        });
    }
    sub.strip_prefix(&change.path).map(|below| ChangeEvent::Put {
        path: DbPath::root(),
        data: lookup(&change.value, below.segments()),
    })
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Drop null and empty-object children, as the database does on write.
fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .map(|(k, v)| (k, normalize(v)))
                .filter(|(_, v)| !is_empty(v))
                .collect();
            Value::Object(map)
        }
        other => other,
    }
}

fn lookup(node: &Value, segments: &[String]) -> Value {
    let mut node = node;
    for segment in segments {
        match node.get(segment) {
            Some(child) => node = child,
            None => return Value::Null,
        }
    }
    if is_empty(node) {
        Value::Null
    } else {
        node.clone()
    }
}

fn set_at(node: &mut Value, segments: &[String], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let child = map.entry(first.clone()).or_insert(Value::Null);
        set_at(child, rest, value);
    }
}

fn remove_at(node: &mut Value, segments: &[String]) {
    let Some((first, rest)) = segments.split_first() else {
        *node = Value::Null;
        return;
    };
    if let Value::Object(map) = node {
        if rest.is_empty() {
            map.remove(first);
        } else if let Some(child) = map.get_mut(first) {
            remove_at(child, rest);
            if is_empty(child) {
                map.remove(first);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(p: &str) -> DbPath {
        DbPath::parse(p).unwrap()
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let db = MemoryDb::new();
        db.set(&path("activities/a1"), json!({"name": "run"}))
            .await
            .unwrap();
        assert_eq!(db.get(&path("activities/a1/name")), json!("run"));
        assert_eq!(
            db.get(&path("activities")),
            json!({"a1": {"name": "run"}})
        );
        assert_eq!(db.get(&path("activityGroups")), Value::Null);
    }

    #[tokio::test]
    async fn test_set_replaces_rather_than_merges() {
        let db = MemoryDb::new();
        db.set(&path("a/b"), json!({"x": 1, "y": 2})).await.unwrap();
        db.set(&path("a/b"), json!({"x": 3})).await.unwrap();
        assert_eq!(db.get(&path("a/b")), json!({"x": 3}));
    }

    #[tokio::test]
    async fn test_remove_prunes_empty_parents() {
        let db = MemoryDb::new();
        db.set(&path("a/b/c"), json!(1)).await.unwrap();
        db.remove(&path("a/b/c")).await.unwrap();
        assert_eq!(db.get(&path("a")), Value::Null);
        assert_eq!(db.get(&DbPath::root()), Value::Null);
    }

    #[tokio::test]
    async fn test_remove_missing_is_ok() {
        let db = MemoryDb::new();
        db.remove(&path("activities/nope")).await.unwrap();
        assert_eq!(db.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_null_children_dropped() {
        let db = MemoryDb::new();
        db.set(&path("r"), json!({"keep": 1, "drop": null, "empty": {}}))
            .await
            .unwrap();
        assert_eq!(db.get(&path("r")), json!({"keep": 1}));
    }

    #[tokio::test]
    async fn test_push_generates_distinct_ordered_keys() {
        let db = MemoryDb::new();
        let k1 = db.push(&path("activities"), json!({"n": 1})).await.unwrap();
        let k2 = db.push(&path("activities"), json!({"n": 2})).await.unwrap();
        assert!(k1 < k2);
        assert_eq!(db.get(&path("activities")).as_object().unwrap().len(), 2);
        assert_eq!(
            db.requests()[0],
            Request::Push {
                path: path("activities"),
                value: json!({"n": 1})
            }
        );
    }

    #[tokio::test]
    async fn test_subscribe_initial_snapshot_and_changes() {
        let db = MemoryDb::new();
        db.set(&path("activities/a1"), json!({"name": "run"}))
            .await
            .unwrap();

        let mut events = db.subscribe(&path("activities")).await.unwrap();
        assert_eq!(
            events.next().await.unwrap().unwrap(),
            ChangeEvent::Put {
                path: DbPath::root(),
                data: json!({"a1": {"name": "run"}}),
            }
        );

        // Unrelated location is not delivered
        db.set(&path("activityGroups/g1"), json!({"title": "A"}))
            .await
            .unwrap();
        db.remove(&path("activities/a1")).await.unwrap();
        assert_eq!(
            events.next().await.unwrap().unwrap(),
            ChangeEvent::Put {
                path: path("a1"),
                data: Value::Null,
            }
        );
    }

    #[tokio::test]
    async fn test_write_above_subscription() {
        let db = MemoryDb::new();
        let mut events = db.subscribe(&path("activities/a1")).await.unwrap();
        let _ = events.next().await;

        db.set(&path("activities"), json!({"a1": {"name": "swim"}}))
            .await
            .unwrap();
        assert_eq!(
            events.next().await.unwrap().unwrap(),
            ChangeEvent::Put {
                path: DbPath::root(),
                data: json!({"name": "swim"}),
            }
        );
    }

    #[tokio::test]
    async fn test_lagging_subscriber_resyncs_without_stale_changes() {
        let db = MemoryDb::with_change_capacity(4);
        let mut events = db.subscribe(&path("a")).await.unwrap();
        let _ = events.next().await;

        for i in 0..10 {
            db.set(&path("a/x"), json!(i)).await.unwrap();
        }
        assert_eq!(
            events.next().await.unwrap().unwrap(),
            ChangeEvent::Put {
                path: DbPath::root(),
                data: json!({"x": 9}),
            }
        );

        // Changes buffered before the snapshot are not replayed.
        db.set(&path("a/x"), json!(10)).await.unwrap();
        assert_eq!(
            events.next().await.unwrap().unwrap(),
            ChangeEvent::Put {
                path: path("x"),
                data: json!(10),
            }
        );
    }

    #[test]
    fn test_translate_unrelated_is_none() {
        let change = Change {
            path: path("activityGroups/g1"),
            value: json!(1),
        };
        assert!(translate(&path("activities"), &change).is_none());
    }
}
