// Configuration file loading with environment overrides

use crate::settings::AppSettings;
use crate::{ConfigError, Result};
use std::env;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Loads [`AppSettings`] from a TOML file, then applies environment
/// overrides (`WORDLETTE_SITE_NAME`, `WORDLETTE_DB_DRIVER`,
/// `WORDLETTE_DB_PATH`). A `.env` file is honored if present.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from `path`, or fall back to defaults when the file is absent.
    pub fn load(path: impl AsRef<Path>) -> Result<AppSettings> {
        // Populate process env from .env first so overrides see it.
        let _ = dotenvy::dotenv();

        let path = path.as_ref();
        let mut settings = if path.exists() {
            let content = fs::read_to_string(path)
                .map_err(|e| ConfigError::LoadError(format!("{}: {e}", path.display())))?;
            Self::parse(&content)?
        } else {
            debug!(path = %path.display(), "config file absent, using defaults");
            AppSettings::default()
        };

        Self::apply_env(&mut settings);
        settings.validate()?;
        Ok(settings)
    }

    /// Parse TOML settings content.
    pub fn parse(content: &str) -> Result<AppSettings> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    fn apply_env(settings: &mut AppSettings) {
        if let Ok(name) = env::var("WORDLETTE_SITE_NAME") {
            settings.site_name = name;
        }
        if let Ok(driver) = env::var("WORDLETTE_DB_DRIVER") {
            settings.database.driver = driver;
        }
        if let Ok(path) = env::var("WORDLETTE_DB_PATH") {
            settings.database.path = path;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_toml() {
        let settings = ConfigLoader::parse(
            r#"
            site_name = "my site"

            [database]
            driver = "sqlite"
            path = "site.db"
            "#,
        )
        .unwrap();

        assert_eq!(settings.site_name, "my site");
        assert_eq!(settings.database.path, "site.db");
    }

    #[test]
    fn test_parse_partial_toml_uses_defaults() {
        let settings = ConfigLoader::parse("site_name = \"partial\"").unwrap();
        assert_eq!(settings.site_name, "partial");
        assert_eq!(settings.database.driver, "sqlite");
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = ConfigLoader::parse("site_name = [broken");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_missing_file_defaults() {
        let settings = ConfigLoader::load("/nonexistent/wordlette.toml").unwrap();
        assert_eq!(settings.database.driver, "sqlite");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wordlette.toml");
        fs::write(&path, "[database]\ndriver = \"sqlite\"\npath = \"x.db\"\n").unwrap();

        let settings = ConfigLoader::load(&path).unwrap();
        assert_eq!(settings.database.path, "x.db");
    }
}
