// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed create/update/delete/listen over one top-level collection.

use crate::db::{DbPath, EventStream, Store, StoreError};
use crate::models::Record;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// Binds a collection path to the four record operations.
///
/// Holds no state beyond the path and the shared store; every call is one
/// store request and its result is returned unchanged.
pub struct CollectionAdapter<R> {
    store: Arc<dyn Store>,
    path: DbPath,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for CollectionAdapter<R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            path: self.path.clone(),
            _record: PhantomData,
        }
    }
}

impl<R: Record> CollectionAdapter<R> {
    pub fn new(store: Arc<dyn Store>, collection: &str) -> Result<Self, StoreError> {
        Ok(Self {
            store,
            path: DbPath::parse(collection)?,
            _record: PhantomData,
        })
    }

    pub fn path(&self) -> &DbPath {
        &self.path
    }

    /// Append `record` under the collection. Returns the generated key.
    pub async fn create(&self, record: &R) -> Result<String, StoreError> {
        let value = to_value(record)?;
        tracing::debug!(collection = %self.path, "create");
        self.store.push(&self.path, value).await
    }

    /// Replace the record stored at `collection/{record.id}`.
    pub async fn update(&self, record: &R) -> Result<(), StoreError> {
        let path = self.id_path(record.id())?;
        let value = to_value(record)?;
        tracing::debug!(path = %path, "update");
        self.store.set(&path, value).await
    }

    /// Remove `collection/{record.id}`.
    pub async fn delete(&self, record: &R) -> Result<(), StoreError> {
        self.delete_id(record.id()).await
    }

    /// Remove `collection/{id}` when only the key is at hand.
    pub async fn delete_id(&self, id: Option<&str>) -> Result<(), StoreError> {
        let path = self.id_path(id)?;
        tracing::debug!(path = %path, "delete");
        self.store.remove(&path).await
    }

    /// Reference to the whole collection. Issues no request.
    pub fn listen(&self) -> CollectionRef<R> {
        CollectionRef {
            store: self.store.clone(),
            path: self.path.clone(),
            _record: PhantomData,
        }
    }

    fn id_path(&self, id: Option<&str>) -> Result<DbPath, StoreError> {
        let id = id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| StoreError::MissingId {
                collection: self.path.to_string(),
            })?;
        self.path.child(id)
    }
}

/// A subscribable reference to a collection.
pub struct CollectionRef<R> {
    store: Arc<dyn Store>,
    path: DbPath,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> CollectionRef<R> {
    pub fn path(&self) -> &DbPath {
        &self.path
    }

    /// Start receiving changes. Dropping the stream ends the subscription.
    pub async fn subscribe(&self) -> Result<EventStream, StoreError> {
        self.store.subscribe(&self.path).await
    }

    /// Decode a collection snapshot (an object keyed by record id) into
    /// records, in key order, with `id` taken from the key.
    pub fn records_from_snapshot(&self, snapshot: &Value) -> Result<Vec<R>, StoreError> {
        let map = match snapshot {
            Value::Null => return Ok(Vec::new()),
            Value::Object(map) => map,
            other => {
                return Err(StoreError::Decode(format!(
                    "snapshot of '{}' is not an object: {}",
                    self.path, other
                )))
            }
        };

        let mut entries: Vec<(&String, &Value)> = map.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        entries
            .into_iter()
            .map(|(key, value)| {
                serde_json::from_value::<R>(value.clone())
                    .map(|record| record.with_id(key.clone()))
                    .map_err(|e| StoreError::Decode(format!("{}/{}: {}", self.path, key, e)))
            })
            .collect()
    }
}

fn to_value<R: Record>(record: &R) -> Result<Value, StoreError> {
    serde_json::to_value(record).map_err(|e| StoreError::Decode(e.to_string()))
}
