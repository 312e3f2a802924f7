//! Durable actor state over a document store.
//!
//! Each entity's state lives in one document, keyed by a sanitized form of
//! the entity's logical key, in a collection named after the entity type or
//! in a single configured collection. Writes are guarded by the revision
//! returned from the previous read or write.

pub mod base;
pub mod codec;
pub mod collections;
pub mod document;
pub mod errors;
pub mod key;
pub mod lifecycle;
pub mod options;
pub mod persistent;
pub mod providers;
pub mod storage;
pub mod store;

// Re-exports

pub mod prelude {
    pub use crate::codec::{ReferenceConverter, StateCodec};
    pub use crate::document::StateContainer;
    pub use crate::errors::{ConfigError, StorageError, StoreError};
    pub use crate::key::StateKey;
    pub use crate::lifecycle::{LifecycleParticipant, ServiceLifecycle, stage};
    pub use crate::options::ArangoStorageOptions;
    pub use crate::persistent::PersistentState;
    pub use crate::providers::{DEFAULT_STORAGE_PROVIDER_NAME, StorageProviders};
    pub use crate::storage::{ArangoStateStorage, StateStorage};
    pub use crate::store::{Connect, DocumentStore, MemoryConnector, MemoryStore};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_shared_types_are_send_sync() {
        assert_send_sync::<ArangoStateStorage<MemoryConnector>>();
        assert_send_sync::<StorageProviders<ArangoStateStorage<MemoryConnector>>>();
        assert_send_sync::<StateCodec>();
        assert_send_sync::<StorageError>();
    }
}
