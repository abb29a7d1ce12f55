// Settings value objects handed to the application bootstrap

use crate::{ConfigError, Result};
use serde::{Deserialize, Serialize};

/// Selects and configures the database driver.
///
/// `driver` names a key in the application's driver registry; an unknown
/// name aborts startup when the controller first connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub driver: String,

    /// Driver-specific location: a file path or `:memory:` for the
    /// embedded sqlite driver.
    #[serde(default = "DatabaseSettings::default_path")]
    pub path: String,
}

impl DatabaseSettings {
    fn default_path() -> String {
        ":memory:".to_string()
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            driver: "sqlite".to_string(),
            path: Self::default_path(),
        }
    }
}

/// Top-level application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default = "AppSettings::default_site_name")]
    pub site_name: String,

    #[serde(default)]
    pub database: DatabaseSettings,
}

impl AppSettings {
    fn default_site_name() -> String {
        "wordlette".to_string()
    }

    /// Reject settings that would fail later in a less obvious place.
    pub fn validate(&self) -> Result<()> {
        if self.database.driver.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database.driver must not be empty".into(),
            ));
        }
        Ok(())
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            site_name: Self::default_site_name(),
            database: DatabaseSettings::default(),
        }
    }
}
