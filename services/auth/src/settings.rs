//! Service settings loaded from `AUTH__*` environment variables

use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// Where accounts are persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

/// Authentication service settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// Account storage backend
    pub storage: StorageBackend,
    /// Superuser created at startup when absent
    pub superuser_email: Option<String>,
    pub superuser_password: Option<String>,
}

impl Settings {
    /// Load settings from the environment
    ///
    /// # Environment Variables
    /// - `AUTH__BIND_ADDRESS` (default: "0.0.0.0:3000")
    /// - `AUTH__STORAGE`: `postgres` or `memory` (default: "postgres")
    /// - `AUTH__SUPERUSER_EMAIL`, `AUTH__SUPERUSER_PASSWORD` (optional)
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("bind_address", "0.0.0.0:3000")?
            .set_default("storage", "postgres")?
            .add_source(
                Environment::with_prefix("AUTH")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }

    /// Superuser credentials, when both are configured
    pub fn superuser(&self) -> Option<(&str, &str)> {
        match (&self.superuser_email, &self.superuser_password) {
            (Some(email), Some(password)) => Some((email.as_str(), password.as_str())),
            _ => None,
        }
    }
}
