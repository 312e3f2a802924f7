use std::fmt::Debug;

use serde::Deserialize;
use url::Url;

use crate::{codec::StateCodec, errors::ConfigError, lifecycle::stage};

pub const DEFAULT_DATABASE_NAME: &str = "actors";
pub const DEFAULT_URL: &str = "http://localhost:8529";

/// Stage of the service lifecycle where storage is initialized.
pub const DEFAULT_INIT_STAGE: i32 = stage::APPLICATION_SERVICES;

/// Options of one named storage provider.
///
/// Deserializable from any serde source; absent fields take their defaults.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ArangoStorageOptions {
    pub database_name: String,
    pub url: String,
    pub username: String,
    pub password: String,
    pub wait_for_sync: bool,
    /// Single collection shared by all entity types. Blank means one
    /// collection per entity type.
    pub collection_name: Option<String>,
    pub init_stage: i32,
}

/// Validated connection parameters handed to a [`Connect`](crate::store::Connect).
#[derive(Clone)]
pub struct ConnectionSettings {
    pub url: Url,
    pub database: String,
    pub username: String,
    pub password: String,
    pub wait_for_sync: bool,
    /// Codec the driver must use for its own (de)serialization so references
    /// round-trip the same way on both paths.
    pub codec: StateCodec,
}

// Implementations

impl ArangoStorageOptions {
    pub fn with_database_name(mut self, database_name: impl Into<String>) -> Self {
        self.database_name = database_name.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    pub fn with_wait_for_sync(mut self, wait_for_sync: bool) -> Self {
        self.wait_for_sync = wait_for_sync;
        self
    }

    pub fn with_collection_name(mut self, collection_name: impl Into<String>) -> Self {
        self.collection_name = Some(collection_name.into());
        self
    }

    pub fn with_init_stage(mut self, init_stage: i32) -> Self {
        self.init_stage = init_stage;
        self
    }

    /// Configured fixed collection name, if non-blank.
    pub fn fixed_collection(&self) -> Option<&str> {
        self.collection_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
    }

    /// Reject blank required fields, in the order database name, url,
    /// username, password, then an unparsable url.
    pub fn validate(&self, name: &str) -> Result<(), ConfigError> {
        let required = [
            ("database_name", &self.database_name),
            ("url", &self.url),
            ("username", &self.username),
            ("password", &self.password),
        ];

        if let Some((field, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(ConfigError::Blank {
                name: name.to_string(),
                field: *field,
            });
        }

        Url::parse(self.url.trim()).map_err(|source| ConfigError::InvalidUrl {
            name: name.to_string(),
            source,
        })?;

        Ok(())
    }

    pub(crate) fn connection_settings(
        &self,
        name: &str,
        codec: StateCodec,
    ) -> Result<ConnectionSettings, ConfigError> {
        self.validate(name)?;

        let url = Url::parse(self.url.trim()).map_err(|source| ConfigError::InvalidUrl {
            name: name.to_string(),
            source,
        })?;

        Ok(ConnectionSettings {
            url,
            database: self.database_name.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            wait_for_sync: self.wait_for_sync,
            codec,
        })
    }
}

impl Default for ArangoStorageOptions {
    fn default() -> Self {
        Self {
            database_name: DEFAULT_DATABASE_NAME.to_string(),
            url: DEFAULT_URL.to_string(),
            username: String::new(),
            password: String::new(),
            wait_for_sync: true,
            collection_name: None,
            init_stage: DEFAULT_INIT_STAGE,
        }
    }
}

impl Debug for ArangoStorageOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArangoStorageOptions")
            .field("database_name", &self.database_name)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("wait_for_sync", &self.wait_for_sync)
            .field("collection_name", &self.collection_name)
            .field("init_stage", &self.init_stage)
            .finish()
    }
}

impl Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("url", &self.url.as_str())
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("wait_for_sync", &self.wait_for_sync)
            .finish_non_exhaustive()
    }
}
