use std::{fmt::Debug, sync::Arc};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::errors::StoreError;

/// Conversion of identity-bearing references embedded in state.
///
/// Both methods are offered every node of the payload tree, parents before
/// children. Returning `Some` replaces the node and stops descent into it;
/// `None` leaves the node alone and descends.
pub trait ReferenceConverter: Send + Sync {
    /// In-memory form to stored form.
    fn to_document(&self, value: &Value) -> anyhow::Result<Option<Value>>;

    /// Stored form to in-memory form.
    fn from_document(&self, value: &Value) -> anyhow::Result<Option<Value>>;
}

/// Converts between caller state and the generic document payload.
///
/// Without a converter the payload is the plain serde representation of the
/// state, so unknown fields survive as long as the state type keeps them.
#[derive(Clone, Default)]
pub struct StateCodec {
    converter: Option<Arc<dyn ReferenceConverter>>,
}

// Implementations

impl StateCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_converter(converter: Arc<dyn ReferenceConverter>) -> Self {
        Self {
            converter: Some(converter),
        }
    }

    pub fn converter(&self) -> Option<&Arc<dyn ReferenceConverter>> {
        self.converter.as_ref()
    }

    /// Encode state into a payload. Absent state, and state serializing to
    /// `null`, both encode to `None`.
    pub fn to_document_payload<T: Serialize>(
        &self,
        state: Option<&T>,
    ) -> Result<Option<Value>, StoreError> {
        let Some(state) = state else {
            return Ok(None);
        };

        let value = serde_json::to_value(state)?;
        if value.is_null() {
            return Ok(None);
        }

        match &self.converter {
            Some(converter) => walk(value, &|v| converter.to_document(v)).map(Some),
            None => Ok(Some(value)),
        }
    }

    /// Decode a payload into the caller's state type. A `None` payload is
    /// absent state, not a default value.
    pub fn from_document_payload<T: DeserializeOwned>(
        &self,
        payload: Option<Value>,
    ) -> Result<Option<T>, StoreError> {
        let Some(value) = payload else {
            return Ok(None);
        };

        let value = match &self.converter {
            Some(converter) => walk(value, &|v| converter.from_document(v))?,
            None => value,
        };

        Ok(Some(serde_json::from_value(value)?))
    }
}

impl Debug for StateCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateCodec")
            .field("converter", &self.converter.is_some())
            .finish()
    }
}

fn walk(
    value: Value,
    convert: &dyn Fn(&Value) -> anyhow::Result<Option<Value>>,
) -> Result<Value, StoreError> {
    if let Some(replaced) =
        convert(&value).map_err(|e| StoreError::Serialization(format!("{e:#}")))?
    {
        return Ok(replaced);
    }

    Ok(match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| walk(item, convert))
                .collect::<Result<_, _>>()?,
        ),
        Value::Object(fields) => Value::Object(
            fields
                .into_iter()
                .map(|(name, field)| Ok((name, walk(field, convert)?)))
                .collect::<Result<_, StoreError>>()?,
        ),
        scalar => scalar,
    })
}
