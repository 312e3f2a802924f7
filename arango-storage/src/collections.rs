use std::sync::{Arc, RwLock};

use rustc_hash::FxHashSet;

use crate::{
    base::unpoison,
    debug, info,
    key::collection_name_for,
    store::{Collection, DocumentStore},
};

/// Lazily provisions collections, at most one creation attempt per name
/// once the name has been marked seen.
///
/// Concurrent first uses of a name may each attempt creation before either
/// marks it; the losers see a creation failure, which is logged and dropped
/// like any other. Names are never evicted, and a seen name is not checked
/// against the server again.
#[derive(Debug)]
pub struct CollectionRegistry {
    provider: String,
    fixed: Option<String>,
    seen: RwLock<FxHashSet<String>>,
}

// Implementations

impl CollectionRegistry {
    /// `fixed`, when non-blank, overrides the per-type collection for every
    /// entity type.
    pub fn new(provider: impl Into<String>, fixed: Option<&str>) -> Self {
        Self {
            provider: provider.into(),
            fixed: fixed
                .filter(|name| !name.trim().is_empty())
                .map(str::to_string),
            seen: RwLock::new(FxHashSet::default()),
        }
    }

    /// Collection name an entity type maps to.
    pub fn collection_name(&self, entity_type: &str) -> String {
        match &self.fixed {
            Some(fixed) => fixed.clone(),
            None => collection_name_for(entity_type),
        }
    }

    /// Resolve `entity_type` to a collection, creating it on first use.
    /// Never fails; a creation error is logged and the collection assumed
    /// to exist.
    pub async fn resolve<S: DocumentStore>(&self, store: &Arc<S>, entity_type: &str) -> Collection<S> {
        let name = self.collection_name(entity_type);
        self.ensure(store.as_ref(), &name).await;
        Collection::new(store.clone(), name)
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn is_seen(&self, name: &str) -> bool {
        unpoison(self.seen.read()).contains(name)
    }

    pub fn seen_names(&self) -> Vec<String> {
        let mut names: Vec<_> = unpoison(self.seen.read()).iter().cloned().collect();
        names.sort();
        names
    }

    async fn ensure<S: DocumentStore>(&self, store: &S, name: &str) {
        if self.is_seen(name) {
            return;
        }

        match store.create_collection(name).await {
            Ok(()) => debug!(provider = %self.provider, "created collection {name}"),
            Err(_e) => info!(
                provider = %self.provider,
                "error creating {name} collection, it may already exist: {_e}"
            ),
        }

        unpoison(self.seen.write()).insert(name.to_string());
    }
}
