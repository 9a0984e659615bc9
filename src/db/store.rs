// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! The store-client seam shared by every backend.

use crate::db::DbPath;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use serde_json::Value;

/// Errors reported by a store client.
///
/// Backend failures are carried through as-is; the only errors raised
/// locally are precondition violations on keys and record ids.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record in '{collection}' has no id")]
    MissingId { collection: String },

    #[error("Invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Database returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Failed to decode database payload: {0}")]
    Decode(String),

    #[error("Database unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// True for errors raised before any request was issued.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            StoreError::MissingId { .. } | StoreError::InvalidKey { .. }
        )
    }
}

/// A change observed at a subscribed location.
///
/// `path` is relative to the subscribed location; `/` means the location
/// itself.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// The value at `path` was replaced by `data` (`null` means removed).
    Put { path: DbPath, data: Value },
    /// The children of `path` named in `data` were replaced.
    Patch { path: DbPath, data: Value },
    /// The server ended the subscription (usually a security rule change).
    Cancel { reason: Option<String> },
    /// The credential used by the subscription is no longer valid.
    AuthRevoked,
}

impl ChangeEvent {
    /// True if no further events follow this one.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChangeEvent::Cancel { .. } | ChangeEvent::AuthRevoked)
    }
}

pub type EventStream = BoxStream<'static, Result<ChangeEvent, StoreError>>;

/// A path-addressed database client.
///
/// Every method is a single request; ordering, atomicity, and retry
/// behavior are whatever the backend provides.
pub trait Store: Send + Sync {
    /// Append `value` under `path` with a generated key. Returns the key.
    fn push<'a>(&'a self, path: &'a DbPath, value: Value)
        -> BoxFuture<'a, Result<String, StoreError>>;

    /// Replace the value at `path`.
    fn set<'a>(&'a self, path: &'a DbPath, value: Value) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Remove the value at `path`. Removing a missing location succeeds.
    fn remove<'a>(&'a self, path: &'a DbPath) -> BoxFuture<'a, Result<(), StoreError>>;

    /// Subscribe to changes at `path`.
    ///
    /// The first event is a `Put` at `/` with the current value.
    fn subscribe<'a>(&'a self, path: &'a DbPath) -> BoxFuture<'a, Result<EventStream, StoreError>>;
}
