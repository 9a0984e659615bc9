// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity store: typed access to the `activities` and `activityGroups`
//! collections of a realtime database.
//!
//! Each collection is served by a [`db::CollectionAdapter`] that turns
//! create, update, delete, and listen into a single request against an
//! injected [`db::Store`]. The HTTP routes expose the same operations.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;

use config::Config;
use db::{collections, CollectionAdapter, Store, StoreError};
use models::{Activity, ActivityGroup};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub activities: CollectionAdapter<Activity>,
    pub activity_groups: CollectionAdapter<ActivityGroup>,
}

impl AppState {
    /// Bind both collections to `store`.
    pub fn new(config: Config, store: Arc<dyn Store>) -> Result<Self, StoreError> {
        Ok(Self {
            config,
            activities: CollectionAdapter::new(store.clone(), collections::ACTIVITIES)?,
            activity_groups: CollectionAdapter::new(store, collections::ACTIVITY_GROUPS)?,
        })
    }
}
