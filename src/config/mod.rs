//! Configuration management for swcache

pub mod schema;

pub use schema::Config;

use crate::error::{SwCacheError, SwCacheResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// File name of project-local configuration
pub const LOCAL_CONFIG_FILE: &str = ".swcache.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("swcache")
            .join("config.toml")
    }

    /// Default on-disk cache storage directory
    pub fn default_storage_dir() -> PathBuf {
        dirs::cache_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("swcache")
            .join("storage")
    }

    /// Storage directory from config, falling back to the default
    pub fn storage_dir(config: &Config) -> PathBuf {
        config
            .cache
            .storage_dir
            .clone()
            .unwrap_or_else(Self::default_storage_dir)
    }

    /// Find `.swcache.toml` in `start` or any of its ancestors
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(LOCAL_CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> SwCacheResult<Config> {
        if !self.config_path.exists() {
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> SwCacheResult<Config> {
        let value = Self::read_table(path).await?;
        Self::from_value(path, value)
    }

    /// Load the global config with a project-local file merged on top
    pub async fn load_merged(&self, local: Option<&Path>) -> SwCacheResult<Config> {
        let Some(local) = local else {
            return self.load().await;
        };

        let mut base = if self.config_path.exists() {
            Self::read_table(&self.config_path).await?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };
        let overlay = Self::read_table(local).await?;
        merge_values(&mut base, overlay);

        debug!("Merged local config {}", local.display());
        Self::from_value(local, base)
    }

    async fn read_table(path: &Path) -> SwCacheResult<toml::Value> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| SwCacheError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| SwCacheError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    fn from_value(path: &Path, value: toml::Value) -> SwCacheResult<Config> {
        value.try_into::<Config>().map_err(|e| SwCacheError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Save configuration to file
    pub async fn save(&self, config: &Config) -> SwCacheResult<()> {
        self.ensure_config_dir().await?;

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            SwCacheError::io(
                format!("writing config to {}", self.config_path.display()),
                e,
            )
        })?;

        info!("Configuration saved to {}", self.config_path.display());
        Ok(())
    }

    /// Ensure the config directory exists
    async fn ensure_config_dir(&self) -> SwCacheResult<()> {
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SwCacheError::ConfigDirCreate {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
        }
        Ok(())
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep-merge `overlay` into `base`; tables merge key by key, anything else replaces
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
