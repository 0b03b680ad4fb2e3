//! Service settings loaded from `API__*` environment variables

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Where recipes are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

/// Recipe API settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// Recipe storage backend
    pub storage: StorageBackend,
    /// Directory uploaded images are written to and served from
    pub media_root: String,
    /// Largest accepted upload body, in bytes
    pub max_upload_bytes: usize,
}

impl Settings {
    /// Load settings from the environment
    ///
    /// # Environment Variables
    /// - `API__BIND_ADDRESS` (default: "0.0.0.0:3001")
    /// - `API__STORAGE`: `postgres` or `memory` (default: "postgres")
    /// - `API__MEDIA_ROOT` (default: "media")
    /// - `API__MAX_UPLOAD_BYTES` (default: 10 MiB)
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("bind_address", "0.0.0.0:3001")?
            .set_default("storage", "postgres")?
            .set_default("media_root", "media")?
            .set_default("max_upload_bytes", 10_i64 * 1024 * 1024)?
            .add_source(
                Environment::with_prefix("API")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}
