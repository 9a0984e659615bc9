// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod activity_group;

pub use activity::Activity;
pub use activity_group::ActivityGroup;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A record kind stored in one collection.
///
/// `id` is the record's key within its collection. It is assigned by the
/// database on create and must be present for update and delete.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn id(&self) -> Option<&str>;

    /// The same record with `id` set.
    fn with_id(self, id: String) -> Self;
}
