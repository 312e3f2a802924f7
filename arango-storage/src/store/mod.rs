pub mod memory;

use std::{future::Future, sync::Arc};

use crate::{
    document::{DocumentMeta, StateDocument},
    errors::StoreError,
    options::ConnectionSettings,
};

// Re-exports

pub use memory::{MemoryConnector, MemoryStore};

/// The narrow slice of a document-store driver this crate consumes.
///
/// Conflict detection belongs to the store: `insert_document` must refuse an
/// existing id, and `update_document` must refuse a document whose supplied
/// revision differs from the stored one.
pub trait DocumentStore: Send + Sync + 'static {
    fn create_collection(&self, name: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = Result<Option<StateDocument>, StoreError>> + Send;

    fn insert_document(
        &self,
        collection: &str,
        document: StateDocument,
    ) -> impl Future<Output = Result<DocumentMeta, StoreError>> + Send;

    /// Replace the state of `id`. A document carrying a revision is only
    /// applied if that revision is current.
    fn update_document(
        &self,
        collection: &str,
        id: &str,
        document: StateDocument,
    ) -> impl Future<Output = Result<DocumentMeta, StoreError>> + Send;

    fn remove_document(
        &self,
        collection: &str,
        id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Release the connection. Calls made afterwards may fail.
    fn close(&self) -> impl Future<Output = ()> + Send {
        async {}
    }
}

/// Opens a [`DocumentStore`] from validated settings.
pub trait Connect: Send + Sync + 'static {
    type Store: DocumentStore;

    fn connect(
        &self,
        settings: ConnectionSettings,
    ) -> impl Future<Output = Result<Self::Store, StoreError>> + Send;
}

/// Handle to one named collection of a connected store.
#[derive(Debug)]
pub struct Collection<S> {
    store: Arc<S>,
    name: String,
}

// Implementations

impl<S: DocumentStore> Collection<S> {
    pub(crate) fn new(store: Arc<S>, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn document(&self, id: &str) -> Result<Option<StateDocument>, StoreError> {
        self.store.get_document(&self.name, id).await
    }

    pub async fn insert(&self, document: StateDocument) -> Result<DocumentMeta, StoreError> {
        self.store.insert_document(&self.name, document).await
    }

    pub async fn update_by_id(
        &self,
        id: &str,
        document: StateDocument,
    ) -> Result<DocumentMeta, StoreError> {
        self.store.update_document(&self.name, id, document).await
    }

    pub async fn remove_by_id(&self, id: &str) -> Result<(), StoreError> {
        self.store.remove_document(&self.name, id).await
    }
}

impl<S> Clone for Collection<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            name: self.name.clone(),
        }
    }
}
