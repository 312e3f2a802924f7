use std::{
    fmt::Debug,
    future::Future,
    sync::{Arc, RwLock},
};

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    base::unpoison,
    codec::{ReferenceConverter, StateCodec},
    collections::CollectionRegistry,
    debug,
    document::{StateContainer, StateDocument},
    error,
    errors::{ConfigError, StorageError, StoreError},
    key::{StateKey, sanitize_id},
    lifecycle::{LifecycleParticipant, ServiceLifecycle},
    options::ArangoStorageOptions,
    store::{Connect, DocumentStore},
    trace, warn,
};

pub const READ_STATE_CODE: u32 = 190000;
pub const WRITE_STATE_CODE: u32 = 190001;
pub const CLEAR_STATE_CODE: u32 = 190002;

/// Durable state of entities, keyed by entity type and logical key.
///
/// Every method updates the container in place and reports any failure as a
/// [`StorageError`]. A failed call leaves the container's etag untouched.
pub trait StateStorage: Send + Sync {
    /// Load state into `container`. A missing document leaves the container
    /// unchanged.
    fn read_state<T, K>(
        &self,
        entity_type: &str,
        key: &K,
        container: &mut StateContainer<T>,
    ) -> impl Future<Output = Result<(), StorageError>> + Send
    where
        T: DeserializeOwned + Send,
        K: StateKey + Sync + ?Sized;

    /// Insert when the container has no etag, otherwise update against the
    /// etag as expected revision. The new revision replaces the etag.
    fn write_state<T, K>(
        &self,
        entity_type: &str,
        key: &K,
        container: &mut StateContainer<T>,
    ) -> impl Future<Output = Result<(), StorageError>> + Send
    where
        T: Serialize + Send,
        K: StateKey + Sync + ?Sized;

    /// Remove the document and reset the etag. Removing a document that does
    /// not exist is not a failure.
    fn clear_state<T, K>(
        &self,
        entity_type: &str,
        key: &K,
        container: &mut StateContainer<T>,
    ) -> impl Future<Output = Result<(), StorageError>> + Send
    where
        T: Send,
        K: StateKey + Sync + ?Sized;
}

/// [`StateStorage`] over a document store reached through `C`.
///
/// The store handle exists between [`init`](Self::init) and
/// [`close`](Self::close); calls outside that window fail.
pub struct ArangoStateStorage<C: Connect> {
    name: String,
    options: ArangoStorageOptions,
    connector: C,
    codec: StateCodec,
    collections: CollectionRegistry,
    store: RwLock<Option<Arc<C::Store>>>,
}

// Implementations

impl<C: Connect> ArangoStateStorage<C> {
    /// Validates `options` eagerly; a blank required field rejects startup.
    pub fn new(
        name: impl Into<String>,
        options: ArangoStorageOptions,
        connector: C,
    ) -> Result<Self, ConfigError> {
        let name = name.into();
        options.validate(&name)?;

        let collections = CollectionRegistry::new(name.clone(), options.fixed_collection());

        Ok(Self {
            name,
            options,
            connector,
            codec: StateCodec::new(),
            collections,
            store: RwLock::new(None),
        })
    }

    /// Converter for references embedded in state. Installed on both the
    /// decode path and the driver at [`init`](Self::init).
    pub fn with_converter(mut self, converter: Arc<dyn ReferenceConverter>) -> Self {
        self.codec = StateCodec::with_converter(converter);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &ArangoStorageOptions {
        &self.options
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn collections(&self) -> &CollectionRegistry {
        &self.collections
    }

    pub fn is_initialized(&self) -> bool {
        unpoison(self.store.read()).is_some()
    }

    /// Connect to the store. Must complete before any state operation.
    pub async fn init(&self) -> anyhow::Result<()> {
        let settings = self.options.connection_settings(&self.name, self.codec.clone())?;
        debug!(provider = %self.name, "initializing with {settings:?}");

        let store = Arc::new(self.connector.connect(settings).await?);

        let previous = unpoison(self.store.write()).replace(store);
        if let Some(previous) = previous {
            warn!(provider = %self.name, "initialized twice, closing the previous connection");
            previous.close().await;
        }

        Ok(())
    }

    /// Release the store handle. Later state operations fail until the next
    /// [`init`](Self::init).
    pub async fn close(&self) {
        let store = unpoison(self.store.write()).take();
        if let Some(store) = store {
            debug!(provider = %self.name, "closing");
            store.close().await;
        }
    }

    fn connected(&self) -> Result<Arc<C::Store>, StoreError> {
        unpoison(self.store.read())
            .clone()
            .ok_or(StoreError::NotConnected)
    }

    fn failure(
        &self,
        code: u32,
        operation: &'static str,
        _entity_type: &str,
        _id: &str,
        cause: StoreError,
    ) -> StorageError {
        error!(
            provider = %self.name,
            code,
            "{operation} failed for {_entity_type}/{_id}: {cause}"
        );
        StorageError::new(code, operation, cause)
    }

    async fn try_read<T: DeserializeOwned>(
        &self,
        entity_type: &str,
        id: &str,
        container: &mut StateContainer<T>,
    ) -> Result<(), StoreError> {
        let store = self.connected()?;
        let collection = self.collections.resolve(&store, entity_type).await;

        let Some(document) = collection.document(id).await? else {
            trace!(provider = %self.name, "no state for {entity_type}/{id}");
            return Ok(());
        };

        let state = self.codec.from_document_payload(document.payload)?;

        container.state = state;
        container.etag = document.revision;

        Ok(())
    }

    async fn try_write<T: Serialize>(
        &self,
        entity_type: &str,
        id: &str,
        container: &mut StateContainer<T>,
    ) -> Result<(), StoreError> {
        let store = self.connected()?;
        let collection = self.collections.resolve(&store, entity_type).await;

        let etag = container.etag().map(str::to_string);
        let document = StateDocument {
            id: id.to_string(),
            revision: etag.clone(),
            payload: self.codec.to_document_payload(container.state.as_ref())?,
        };

        let meta = match etag {
            None => collection.insert(document).await?,
            Some(_) => collection.update_by_id(id, document).await?,
        };

        trace!(provider = %self.name, "wrote {entity_type}/{id} at {}", meta.revision);
        container.etag = Some(meta.revision);

        Ok(())
    }

    async fn try_clear<T>(
        &self,
        entity_type: &str,
        id: &str,
        container: &mut StateContainer<T>,
    ) -> Result<(), StoreError> {
        let store = self.connected()?;
        let collection = self.collections.resolve(&store, entity_type).await;

        collection.remove_by_id(id).await?;
        container.etag = None;

        Ok(())
    }
}

impl<C: Connect> StateStorage for ArangoStateStorage<C> {
    async fn read_state<T, K>(
        &self,
        entity_type: &str,
        key: &K,
        container: &mut StateContainer<T>,
    ) -> Result<(), StorageError>
    where
        T: DeserializeOwned + Send,
        K: StateKey + Sync + ?Sized,
    {
        let id = sanitize_id(&key.to_key_string());

        self.try_read(entity_type, &id, container)
            .await
            .map_err(|e| self.failure(READ_STATE_CODE, "read_state", entity_type, &id, e))
    }

    async fn write_state<T, K>(
        &self,
        entity_type: &str,
        key: &K,
        container: &mut StateContainer<T>,
    ) -> Result<(), StorageError>
    where
        T: Serialize + Send,
        K: StateKey + Sync + ?Sized,
    {
        let id = sanitize_id(&key.to_key_string());

        self.try_write(entity_type, &id, container)
            .await
            .map_err(|e| self.failure(WRITE_STATE_CODE, "write_state", entity_type, &id, e))
    }

    async fn clear_state<T, K>(
        &self,
        entity_type: &str,
        key: &K,
        container: &mut StateContainer<T>,
    ) -> Result<(), StorageError>
    where
        T: Send,
        K: StateKey + Sync + ?Sized,
    {
        let id = sanitize_id(&key.to_key_string());

        self.try_clear(entity_type, &id, container)
            .await
            .map_err(|e| self.failure(CLEAR_STATE_CODE, "clear_state", entity_type, &id, e))
    }
}

impl<C: Connect> LifecycleParticipant for ArangoStateStorage<C> {
    fn participate(self: &Arc<Self>, lifecycle: &mut ServiceLifecycle) {
        let on_start = {
            let storage = self.clone();
            move || {
                let storage = storage.clone();
                async move { storage.init().await }
            }
        };

        let on_stop = {
            let storage = self.clone();
            move || {
                let storage = storage.clone();
                async move {
                    storage.close().await;
                    Ok(())
                }
            }
        };

        lifecycle.subscribe(
            self.options.init_stage,
            format!("arango storage {}", self.name),
            on_start,
            on_stop,
        );
    }
}

impl<C: Connect> Debug for ArangoStateStorage<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArangoStateStorage")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("codec", &self.codec)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}
