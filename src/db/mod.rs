//! Database layer (realtime database).

pub mod collection;
pub mod memory;
pub mod path;
pub mod push_id;
pub mod rtdb;
pub mod sse;
pub mod store;

pub use collection::{CollectionAdapter, CollectionRef};
pub use memory::MemoryDb;
pub use path::DbPath;
pub use rtdb::RealtimeDb;
pub use store::{ChangeEvent, EventStream, Store, StoreError};

/// Collection names as constants.
pub mod collections {
    pub const ACTIVITIES: &str = "activities";
    pub const ACTIVITY_GROUPS: &str = "activityGroups";
}

use crate::config::{Config, StoreBackend};
use std::sync::Arc;

/// Open the configured store. The handle is shared by every collection.
pub fn open(config: &Config) -> Arc<dyn Store> {
    match config.backend {
        StoreBackend::Rtdb => Arc::new(RealtimeDb::new(
            &config.database_url,
            config.database_auth.clone(),
            &config.database_namespace,
        )),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is not persisted");
            Arc::new(MemoryDb::new())
        }
    }
}
