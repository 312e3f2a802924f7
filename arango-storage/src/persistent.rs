use std::{any, borrow::Cow, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    document::StateContainer,
    errors::StorageError,
    key::StateKey,
    storage::StateStorage,
    trace,
};

/// State of one entity bound to the storage that persists it.
///
/// Holds the container between calls, so the etag from the last read or
/// write guards the next write.
#[derive(Debug)]
pub struct PersistentState<S, T> {
    storage: Arc<S>,
    entity_type: Cow<'static, str>,
    key: String,
    container: StateContainer<T>,
}

// Implementations

impl<S, T> PersistentState<S, T>
where
    S: StateStorage,
    T: Send,
{
    /// Bind the state of entity type `A`, named after `A`'s type path.
    pub fn of<A: ?Sized>(storage: Arc<S>, key: &(impl StateKey + ?Sized)) -> Self {
        Self::with_entity_type(storage, any::type_name::<A>(), key)
    }

    pub fn with_entity_type(
        storage: Arc<S>,
        entity_type: impl Into<Cow<'static, str>>,
        key: &(impl StateKey + ?Sized),
    ) -> Self {
        Self {
            storage,
            entity_type: entity_type.into(),
            key: key.to_key_string(),
            container: StateContainer::empty(),
        }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn state(&self) -> Option<&T> {
        self.container.state.as_ref()
    }

    pub fn state_mut(&mut self) -> Option<&mut T> {
        self.container.state.as_mut()
    }

    pub fn set(&mut self, state: T) {
        self.container.state = Some(state);
    }

    pub fn etag(&self) -> Option<&str> {
        self.container.etag()
    }

    pub fn container(&self) -> &StateContainer<T> {
        &self.container
    }

    pub async fn read(&mut self) -> Result<(), StorageError>
    where
        T: DeserializeOwned,
    {
        self.storage
            .read_state(&self.entity_type, self.key.as_str(), &mut self.container)
            .await
    }

    /// Read, falling back to `init` when nothing is stored yet.
    pub async fn read_or(&mut self, init: impl FnOnce() -> T) -> Result<&mut T, StorageError>
    where
        T: DeserializeOwned,
    {
        self.read().await?;

        if self.container.state.is_none() {
            trace!("no stored state for {}/{}, using initial state", self.entity_type, self.key);
        }

        Ok(self.container.state.get_or_insert_with(init))
    }

    pub async fn write(&mut self) -> Result<(), StorageError>
    where
        T: Serialize,
    {
        self.storage
            .write_state(&self.entity_type, self.key.as_str(), &mut self.container)
            .await
    }

    /// Remove stored state. The in-memory state is kept; the next write
    /// inserts it again.
    pub async fn clear(&mut self) -> Result<(), StorageError> {
        self.storage
            .clear_state(&self.entity_type, self.key.as_str(), &mut self.container)
            .await
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::{
        options::ArangoStorageOptions,
        storage::ArangoStateStorage,
        store::MemoryConnector,
    };

    mod orders {
        #[derive(Debug)]
        pub struct Account;
    }

    mod books {
        use std::marker::PhantomData;

        #[derive(Debug)]
        pub struct Ledger<T>(PhantomData<T>);

        #[derive(Debug)]
        pub struct Audit<T>(PhantomData<T>);
    }

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    struct Balance {
        amount: i64,
    }

    async fn storage() -> Arc<ArangoStateStorage<MemoryConnector>> {
        let options = ArangoStorageOptions::default().with_credentials("root", "secret");
        let storage = ArangoStateStorage::new("Default", options, MemoryConnector::new()).unwrap();
        storage.init().await.unwrap();
        Arc::new(storage)
    }

    #[tokio::test]
    async fn test_entity_type_from_owner() {
        let storage = storage().await;
        let mut state = PersistentState::<_, Balance>::of::<orders::Account>(storage.clone(), "acct/1");

        assert!(state.entity_type().ends_with("orders::Account"));
        state.set(Balance { amount: 3 });
        state.write().await.unwrap();

        assert_eq!(storage.connector().store().document_count("Account"), 1);
    }

    #[tokio::test]
    async fn test_generic_owners_get_their_own_collections() {
        let storage = storage().await;

        let mut ledger =
            PersistentState::<_, Balance>::of::<books::Ledger<orders::Account>>(storage.clone(), "1");
        ledger.set(Balance { amount: 100 });
        ledger.write().await.unwrap();

        let mut audit =
            PersistentState::<_, Balance>::of::<books::Audit<orders::Account>>(storage.clone(), "1");
        audit.read().await.unwrap();

        assert_eq!(audit.state(), None);
        assert_eq!(
            storage.connector().store().collection_names(),
            vec!["Audit".to_string(), "Ledger".to_string()]
        );
    }

    #[tokio::test]
    async fn test_read_or_then_write_round_trip() {
        let storage = storage().await;
        let id = uuid::Uuid::new_v4();

        let mut state = PersistentState::<_, Balance>::with_entity_type(storage.clone(), "Orders.Account", &id);
        state.read_or(Balance::default).await.unwrap().amount += 10;
        assert_eq!(state.etag(), None);
        state.write().await.unwrap();

        let mut again = PersistentState::<_, Balance>::with_entity_type(storage, "Orders.Account", &id);
        again.read().await.unwrap();
        assert_eq!(again.state(), Some(&Balance { amount: 10 }));
        assert_eq!(again.etag(), state.etag());
    }

    #[tokio::test]
    async fn test_clear_keeps_memory_state() {
        let storage = storage().await;
        let mut state = PersistentState::with_entity_type(storage, "Orders.Account", "a");
        state.set(Balance { amount: 1 });
        state.write().await.unwrap();

        state.clear().await.unwrap();
        assert_eq!(state.etag(), None);
        assert_eq!(state.state(), Some(&Balance { amount: 1 }));

        state.write().await.unwrap();
        assert!(state.etag().is_some());
    }
}
