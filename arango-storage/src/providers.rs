use std::{borrow::Cow, sync::Arc};

use rustc_hash::FxHashMap;

use crate::{
    errors::ConfigError,
    lifecycle::{LifecycleParticipant, ServiceLifecycle},
    options::ArangoStorageOptions,
    storage::ArangoStateStorage,
    store::Connect,
};

pub const DEFAULT_STORAGE_PROVIDER_NAME: &str = "Default";

/// Storages registered by provider name.
#[derive(Debug)]
pub struct StorageProviders<S> {
    providers: FxHashMap<Cow<'static, str>, Arc<S>>,
}

// Implementations

impl<S> StorageProviders<S> {
    pub fn new() -> Self {
        Self {
            providers: FxHashMap::default(),
        }
    }

    /// Register `storage` under `name`, returning the one it replaces.
    pub fn add(&mut self, name: impl Into<Cow<'static, str>>, storage: Arc<S>) -> Option<Arc<S>> {
        self.providers.insert(name.into(), storage)
    }

    pub fn add_as_default(&mut self, storage: Arc<S>) -> Option<Arc<S>> {
        self.add(DEFAULT_STORAGE_PROVIDER_NAME, storage)
    }

    pub fn get(&self, name: impl AsRef<str>) -> Option<&Arc<S>> {
        self.providers.get(name.as_ref())
    }

    pub fn default_provider(&self) -> Option<&Arc<S>> {
        self.get(DEFAULT_STORAGE_PROVIDER_NAME)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|name| &**name).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl<S: LifecycleParticipant> StorageProviders<S> {
    /// Subscribe every registered storage to `lifecycle`.
    pub fn participate_all(&self, lifecycle: &mut ServiceLifecycle) {
        for storage in self.providers.values() {
            storage.participate(lifecycle);
        }
    }
}

impl<C: Connect> StorageProviders<ArangoStateStorage<C>> {
    /// Validate `options` and register a new storage under `name`.
    pub fn add_arango_storage(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        options: ArangoStorageOptions,
        connector: C,
    ) -> Result<Arc<ArangoStateStorage<C>>, ConfigError> {
        let name = name.into();
        let storage = Arc::new(ArangoStateStorage::new(name.to_string(), options, connector)?);
        self.add(name, storage.clone());
        Ok(storage)
    }

    pub fn add_arango_storage_as_default(
        &mut self,
        options: ArangoStorageOptions,
        connector: C,
    ) -> Result<Arc<ArangoStateStorage<C>>, ConfigError> {
        self.add_arango_storage(DEFAULT_STORAGE_PROVIDER_NAME, options, connector)
    }
}

impl<S> Default for StorageProviders<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryConnector;

    fn options() -> ArangoStorageOptions {
        ArangoStorageOptions::default().with_credentials("root", "secret")
    }

    #[test]
    fn test_default_and_named_providers() {
        let mut providers = StorageProviders::new();
        providers
            .add_arango_storage_as_default(options(), MemoryConnector::new())
            .unwrap();
        providers
            .add_arango_storage("archive", options().with_collection_name("archive"), MemoryConnector::new())
            .unwrap();

        assert_eq!(providers.names(), vec!["Default", "archive"]);
        assert_eq!(providers.default_provider().unwrap().name(), "Default");
        assert_eq!(
            providers.get("archive").unwrap().collections().collection_name("Orders.Account"),
            "archive"
        );
        assert!(providers.get("missing").is_none());
    }

    #[test]
    fn test_invalid_options_are_not_registered() {
        let mut providers = StorageProviders::new();
        let err = providers
            .add_arango_storage("broken", ArangoStorageOptions::default(), MemoryConnector::new())
            .unwrap_err();

        assert!(matches!(err, ConfigError::Blank { .. }));
        assert!(providers.is_empty());
    }

    #[tokio::test]
    async fn test_participate_all_initializes_every_provider() {
        let mut providers = StorageProviders::new();
        let default = providers
            .add_arango_storage_as_default(options(), MemoryConnector::new())
            .unwrap();
        let archive = providers
            .add_arango_storage("archive", options(), MemoryConnector::new())
            .unwrap();

        let mut lifecycle = ServiceLifecycle::new();
        providers.participate_all(&mut lifecycle);
        assert_eq!(lifecycle.observer_count(), 2);

        lifecycle.start().await.unwrap();
        assert!(default.is_initialized());
        assert!(archive.is_initialized());

        lifecycle.stop().await;
        assert!(!default.is_initialized());
        assert!(!archive.is_initialized());
    }
}
