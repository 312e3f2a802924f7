//! In-process [`DocumentStore`] with the same revision rules as the server.
//!
//! Data lives as long as any handle to it; it is not durable. Used for tests
//! and local development.

use std::sync::{
    Arc, Mutex, RwLock,
    atomic::{AtomicBool, AtomicU64, Ordering},
};

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::{
    base::unpoison,
    document::{DocumentMeta, StateDocument},
    errors::StoreError,
    options::ConnectionSettings,
    store::{Connect, DocumentStore},
    trace,
};

/// In-memory document store.
///
/// Clones share data and connection state. Every successful write issues a
/// revision `_rev{n}` from a store-wide counter, so a revision is never
/// reused, not even after a document is removed and inserted again.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Arc<Data>,
    closed: Arc<AtomicBool>,
    settings: Option<Arc<ConnectionSettings>>,
}

/// Hands out handles onto one shared [`MemoryStore`], so state survives a
/// close followed by a new connect.
#[derive(Debug, Default)]
pub struct MemoryConnector {
    store: MemoryStore,
    refuse: Mutex<Option<StoreError>>,
    connects: AtomicU64,
}

#[derive(Debug, Default)]
struct Data {
    collections: RwLock<FxHashMap<String, FxHashMap<String, Stored>>>,
    create_attempts: Mutex<FxHashMap<String, usize>>,
    injected: Mutex<Option<StoreError>>,
    last_revision: AtomicU64,
}

#[derive(Debug, Clone)]
struct Stored {
    revision: String,
    payload: Option<Value>,
}

// Implementations

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all created collections, sorted.
    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<_> = unpoison(self.data.collections.read())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn document_count(&self, collection: &str) -> usize {
        unpoison(self.data.collections.read())
            .get(collection)
            .map_or(0, FxHashMap::len)
    }

    /// Number of `create_collection` calls seen for `name`, failed ones included.
    pub fn create_collection_attempts(&self, name: &str) -> usize {
        unpoison(self.data.create_attempts.lock())
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Make the next store call fail with `err`.
    pub fn inject_failure(&self, err: StoreError) {
        *unpoison(self.data.injected.lock()) = Some(err);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Settings this handle was connected with, if it came from a connector.
    pub fn settings(&self) -> Option<&ConnectionSettings> {
        self.settings.as_deref()
    }

    fn reopen(&self, settings: ConnectionSettings) -> Self {
        Self {
            data: self.data.clone(),
            closed: Arc::new(AtomicBool::new(false)),
            settings: Some(Arc::new(settings)),
        }
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }

        match unpoison(self.data.injected.lock()).take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_revision(&self) -> String {
        let n = self.data.last_revision.fetch_add(1, Ordering::AcqRel) + 1;
        format!("_rev{n}")
    }
}

impl DocumentStore for MemoryStore {
    async fn create_collection(&self, name: &str) -> Result<(), StoreError> {
        *unpoison(self.data.create_attempts.lock())
            .entry(name.to_string())
            .or_default() += 1;

        self.check()?;

        let mut collections = unpoison(self.data.collections.write());
        if collections.contains_key(name) {
            return Err(StoreError::CollectionExists(name.to_string()));
        }

        collections.insert(name.to_string(), FxHashMap::default());
        trace!("created collection {name}");

        Ok(())
    }

    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<StateDocument>, StoreError> {
        self.check()?;

        let collections = unpoison(self.data.collections.read());
        let documents = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        Ok(documents.get(id).map(|stored| StateDocument {
            id: id.to_string(),
            revision: Some(stored.revision.clone()),
            payload: stored.payload.clone(),
        }))
    }

    async fn insert_document(
        &self,
        collection: &str,
        document: StateDocument,
    ) -> Result<DocumentMeta, StoreError> {
        self.check()?;

        let mut collections = unpoison(self.data.collections.write());
        let documents = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        if documents.contains_key(&document.id) {
            return Err(StoreError::DocumentExists {
                collection: collection.to_string(),
                id: document.id,
            });
        }

        let revision = self.next_revision();
        documents.insert(
            document.id.clone(),
            Stored {
                revision: revision.clone(),
                payload: document.payload,
            },
        );

        Ok(DocumentMeta {
            id: document.id,
            revision,
        })
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        document: StateDocument,
    ) -> Result<DocumentMeta, StoreError> {
        self.check()?;

        let mut collections = unpoison(self.data.collections.write());
        let documents = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        let Some(stored) = documents.get_mut(id) else {
            return Err(StoreError::DocumentNotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        };

        if let Some(expected) = document.revision.filter(|rev| !rev.trim().is_empty()) {
            if expected != stored.revision {
                return Err(StoreError::Conflict {
                    id: id.to_string(),
                    expected,
                    actual: stored.revision.clone(),
                });
            }
        }

        let revision = self.next_revision();
        stored.revision = revision.clone();
        stored.payload = document.payload;

        Ok(DocumentMeta {
            id: id.to_string(),
            revision,
        })
    }

    async fn remove_document(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.check()?;

        let mut collections = unpoison(self.data.collections.write());
        let documents = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::CollectionNotFound(collection.to_string()))?;

        // Removing an absent document is not an error
        documents.remove(id);

        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connector over an existing store, e.g. one pre-seeded by a test.
    pub fn with_store(store: MemoryStore) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    /// The shared store behind every handle this connector returns.
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Make every following connect fail with `err`, or succeed again with `None`.
    pub fn refuse_with(&self, err: Option<StoreError>) {
        *unpoison(self.refuse.lock()) = err;
    }

    pub fn connect_count(&self) -> u64 {
        self.connects.load(Ordering::Acquire)
    }
}

impl Connect for MemoryConnector {
    type Store = MemoryStore;

    async fn connect(&self, settings: ConnectionSettings) -> Result<MemoryStore, StoreError> {
        if let Some(err) = unpoison(self.refuse.lock()).clone() {
            return Err(err);
        }

        self.connects.fetch_add(1, Ordering::AcqRel);
        trace!("connecting to in-memory store as {settings:?}");

        Ok(self.store.reopen(settings))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc(id: &str, revision: Option<&str>, payload: Value) -> StateDocument {
        StateDocument {
            id: id.to_string(),
            revision: revision.map(str::to_string),
            payload: Some(payload),
        }
    }

    async fn store_with(collection: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store.create_collection(collection).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_create_collection_twice_fails() {
        let store = store_with("Account").await;

        let err = store.create_collection("Account").await.unwrap_err();
        assert!(matches!(err, StoreError::CollectionExists(_)));
        assert_eq!(store.create_collection_attempts("Account"), 2);
        assert_eq!(store.collection_names(), vec!["Account".to_string()]);
    }

    #[tokio::test]
    async fn test_insert_assigns_revision_and_refuses_duplicates() {
        let store = store_with("Account").await;

        let meta = store
            .insert_document("Account", doc("a", None, json!({ "balance": 10 })))
            .await
            .unwrap();
        assert_eq!(meta.revision, "_rev1");

        let err = store
            .insert_document("Account", doc("a", None, json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DocumentExists { .. }));

        let fetched = store.get_document("Account", "a").await.unwrap().unwrap();
        assert_eq!(fetched.revision.as_deref(), Some("_rev1"));
        assert_eq!(fetched.payload, Some(json!({ "balance": 10 })));
    }

    #[tokio::test]
    async fn test_update_checks_revision() {
        let store = store_with("Account").await;
        store
            .insert_document("Account", doc("a", None, json!(1)))
            .await
            .unwrap();

        let meta = store
            .update_document("Account", "a", doc("a", Some("_rev1"), json!(2)))
            .await
            .unwrap();
        assert_eq!(meta.revision, "_rev2");

        let err = store
            .update_document("Account", "a", doc("a", Some("_rev1"), json!(3)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { ref actual, .. } if actual == "_rev2"));

        let err = store
            .update_document("Account", "b", doc("b", Some("_rev1"), json!(3)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DocumentNotFound { .. }));
    }

    #[tokio::test]
    async fn test_remove_absent_document_succeeds() {
        let store = store_with("Account").await;
        store.remove_document("Account", "missing").await.unwrap();

        let err = store.remove_document("Other", "missing").await.unwrap_err();
        assert!(matches!(err, StoreError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn test_revisions_are_never_reused() {
        let store = store_with("Account").await;

        let first = store
            .insert_document("Account", doc("a", None, json!(1)))
            .await
            .unwrap();
        store.remove_document("Account", "a").await.unwrap();
        let second = store
            .insert_document("Account", doc("a", None, json!(1)))
            .await
            .unwrap();

        assert_ne!(first.revision, second.revision);
    }

    #[tokio::test]
    async fn test_injected_failure_hits_next_call_only() {
        let store = store_with("Account").await;
        store.inject_failure(StoreError::Transport("connection reset".to_string()));

        let err = store.get_document("Account", "a").await.unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)));
        assert!(store.get_document("Account", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_closed_handle_refuses_calls_and_connector_reopens() {
        let connector = MemoryConnector::new();
        let settings = crate::options::ArangoStorageOptions::default()
            .with_credentials("root", "secret")
            .connection_settings("Default", Default::default())
            .unwrap();

        let first = connector.connect(settings.clone()).await.unwrap();
        first.create_collection("Account").await.unwrap();
        first.close().await;
        assert!(matches!(
            first.get_document("Account", "a").await,
            Err(StoreError::Closed)
        ));

        let second = connector.connect(settings).await.unwrap();
        assert!(second.get_document("Account", "a").await.unwrap().is_none());
        assert_eq!(second.collection_names(), vec!["Account".to_string()]);
        assert_eq!(connector.connect_count(), 2);
    }
}
