use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Persisted record of one entity's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(rename = "_key")]
    pub id: String,
    /// Expected prior revision on the way in, stored revision on the way out.
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// `None` is "no state", distinct from an empty object.
    #[serde(rename = "state", default)]
    pub payload: Option<Value>,
}

/// Identity and fresh revision returned by a successful write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    #[serde(rename = "_key")]
    pub id: String,
    #[serde(rename = "_rev")]
    pub revision: String,
}

/// Caller-owned state and its revision tag, updated in place by every
/// storage operation.
#[derive(Debug, Clone, PartialEq)]
pub struct StateContainer<T> {
    pub state: Option<T>,
    pub etag: Option<String>,
}

// Implementations

impl<T> StateContainer<T> {
    /// A container with state but no known prior version; the first write
    /// inserts.
    pub fn new(state: T) -> Self {
        Self {
            state: Some(state),
            etag: None,
        }
    }

    pub fn empty() -> Self {
        Self {
            state: None,
            etag: None,
        }
    }

    /// Revision tag if it is non-blank.
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref().filter(|etag| !etag.trim().is_empty())
    }

    /// Whether the next write is an update rather than an insert.
    pub fn has_etag(&self) -> bool {
        self.etag().is_some()
    }
}

impl<T> Default for StateContainer<T> {
    fn default() -> Self {
        Self::empty()
    }
}
