//! Configuration management for footprint.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::aggregate::DEFAULT_TOP_N;
use crate::error::{Error, Result};
use crate::store::{DemoSeed, TagStore};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "footprint";

/// Default store file name.
const STORE_FILE_NAME: &str = "db.json";

/// Default HTTP bind address.
const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:3001";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `FOOTPRINT_`)
/// 2. TOML config file at `~/.config/footprint/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Tag store configuration.
    pub store: StoreConfig,
    /// Dashboard configuration.
    pub report: ReportConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP service listens on.
    pub bind_address: String,
}

/// Tag store configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the store file.
    /// Defaults to `~/.local/share/footprint/db.json`
    pub path: Option<PathBuf>,
    /// Run the demo variant with the reserved `DEMO` tag.
    pub demo_enabled: bool,
    /// Seed file for the demo snapshot. The bundled seed is used when unset.
    pub demo_seed_path: Option<PathBuf>,
}

/// Dashboard configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Number of sources shown in the by-source breakdown.
    pub top_n: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("FOOTPRINT_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.report.top_n == 0 {
            return Err(Error::ConfigValidation {
                message: "top_n must be greater than 0".to_string(),
            });
        }

        self.bind_address()?;

        if self.store.demo_enabled {
            if let Some(seed) = &self.store.demo_seed_path {
                if !seed.exists() {
                    return Err(Error::ConfigValidation {
                        message: format!("demo seed file not found: {}", seed.display()),
                    });
                }
            }
        }

        Ok(())
    }

    /// Parse the configured bind address.
    ///
    /// # Errors
    ///
    /// Returns an error if the address isn't a valid socket address.
    pub fn bind_address(&self) -> Result<SocketAddr> {
        self.server
            .bind_address
            .parse()
            .map_err(|_| Error::ConfigValidation {
                message: format!("invalid bind_address: {}", self.server.bind_address),
            })
    }

    /// Get the store path, resolving defaults if not set.
    #[must_use]
    pub fn store_path(&self) -> PathBuf {
        self.store
            .path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(STORE_FILE_NAME))
    }

    /// Open the tag store described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the demo seed can't be loaded or the store file
    /// can't be created.
    pub fn open_store(&self) -> Result<TagStore> {
        let path = self.store_path();
        if !self.store.demo_enabled {
            return TagStore::open(path);
        }
        let seed = match &self.store.demo_seed_path {
            Some(seed_path) => DemoSeed::from_path(seed_path)?,
            None => DemoSeed::bundled()?,
        };
        TagStore::open_with_demo(path, seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.server.bind_address, "127.0.0.1:3001");
        assert!(config.store.path.is_none());
        assert!(!config.store.demo_enabled);
        assert!(config.store.demo_seed_path.is_none());
        assert_eq!(config.report.top_n, 10);
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_zero_top_n() {
        let mut config = Config::default();
        config.report.top_n = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("top_n"));
    }

    #[test]
    fn test_validate_bad_bind_address() {
        let mut config = Config::default();
        config.server.bind_address = "localhost-ish".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("bind_address"));
    }

    #[test]
    fn test_validate_missing_seed_only_when_demo() {
        let mut config = Config::default();
        config.store.demo_seed_path = Some(PathBuf::from("/nonexistent/demo.json"));
        assert!(config.validate().is_ok());

        config.store.demo_enabled = true;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("demo seed"));
    }

    #[test]
    fn test_bind_address_parses() {
        let config = Config::default();
        assert_eq!(config.bind_address().unwrap().port(), 3001);
    }

    #[test]
    fn test_store_path_default() {
        let config = Config::default();
        let path = config.store_path();

        assert!(path.to_string_lossy().contains("footprint"));
        assert!(path.to_string_lossy().ends_with("db.json"));
    }

    #[test]
    fn test_store_path_custom() {
        let mut config = Config::default();
        config.store.path = Some(PathBuf::from("/srv/footprint/tags.json"));

        assert_eq!(config.store_path(), PathBuf::from("/srv/footprint/tags.json"));
    }

    #[test]
    fn test_open_store_plain_and_demo() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.store.path = Some(dir.path().join("plain.json"));
        let store = config.open_store().unwrap();
        assert!(!store.is_demo());

        config.store.path = Some(dir.path().join("demo.json"));
        config.store.demo_enabled = true;
        let store = config.open_store().unwrap();
        assert!(store.is_demo());
        assert!(store.list_tags().contains(&"DEMO".to_string()));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("footprint"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    // `load_from` reads the process environment; tests calling it run in a `Jail`.

    #[test]
    fn test_load_nonexistent_config() {
        Jail::expect_with(|_jail| {
            let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config, Config::default());
            Ok(())
        });
    }

    #[test]
    fn test_load_from_toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                "[server]\nbind_address = \"0.0.0.0:8080\"\n\n[report]\ntop_n = 5\n",
            )?;

            let path = jail.directory().join("config.toml");
            let config = Config::load_from(Some(path)).map_err(|e| e.to_string())?;
            assert_eq!(config.server.bind_address, "0.0.0.0:8080");
            assert_eq!(config.report.top_n, 5);
            assert!(!config.store.demo_enabled);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_file_values() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[report]\ntop_n = 0\n")?;
            let path = jail.directory().join("config.toml");
            assert!(Config::load_from(Some(path)).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[server]\nbind_address = \"0.0.0.0:8080\"\n")?;
            jail.set_env("FOOTPRINT_SERVER__BIND_ADDRESS", "127.0.0.1:4000");
            jail.set_env("FOOTPRINT_STORE__DEMO_ENABLED", "true");
            jail.set_env("FOOTPRINT_REPORT__TOP_N", "3");

            let path = jail.directory().join("config.toml");
            let config = Config::load_from(Some(path)).map_err(|e| e.to_string())?;
            assert_eq!(config.server.bind_address, "127.0.0.1:4000");
            assert!(config.store.demo_enabled);
            assert_eq!(config.report.top_n, 3);
            Ok(())
        });
    }

    #[test]
    fn test_env_single_underscore_does_not_nest() {
        Jail::expect_with(|jail| {
            jail.set_env("FOOTPRINT_SERVER_BIND_ADDRESS", "127.0.0.1:4000");
            let config = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.server.bind_address, ServerConfig::default().bind_address);
            Ok(())
        });
    }

    #[test]
    fn test_store_config_deserialize() {
        let json = r#"{"path": "/tmp/db.json", "demo_enabled": true}"#;
        let store: StoreConfig = serde_json::from_str(json).unwrap();
        assert_eq!(store.path, Some(PathBuf::from("/tmp/db.json")));
        assert!(store.demo_enabled);
        assert!(store.demo_seed_path.is_none());
    }
}
