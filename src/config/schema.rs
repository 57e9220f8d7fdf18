//! Configuration schema for swcache
//!
//! Configuration is stored at `~/.config/swcache/config.toml`, with an
//! optional project-local `.swcache.toml` merged on top.

use crate::generation::DEFAULT_PLACEHOLDER;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Namespace and eviction settings
    pub cache: CacheConfig,

    /// Request classification
    pub routing: RoutingConfig,

    /// Deployment stamping
    pub deploy: DeployConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Cache namespace settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Namespace prefix shared by every generation of this application
    pub prefix: String,

    /// Entry bound for the static-asset namespace
    pub static_max_entries: usize,

    /// Entry bound for the image namespace
    pub image_max_entries: usize,

    /// Storage directory for the CLI (defaults to the user cache dir)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,

    /// Network timeout in seconds for the CLI fetcher (0 disables)
    pub fetch_timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: "erp-admin".to_string(),
            static_max_entries: 200,
            image_max_entries: 60,
            storage_dir: None,
            fetch_timeout_secs: 30,
        }
    }
}

/// Routing table settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Build output directory whose contents are content-hashed
    pub static_dir: String,

    /// Script, stylesheet and font extensions served cache-first
    pub static_extensions: Vec<String>,

    /// Image extensions served stale-while-revalidate
    pub image_extensions: Vec<String>,

    /// Live API and module-backend paths, never intercepted
    pub excluded_prefixes: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            static_dir: "/assets/".to_string(),
            static_extensions: strings(&["js", "mjs", "css", "woff", "woff2", "ttf", "otf", "eot"]),
            image_extensions: strings(&[
                "png", "jpg", "jpeg", "gif", "svg", "webp", "avif", "ico", "bmp",
            ]),
            excluded_prefixes: strings(&["/api/", "/module-api/"]),
        }
    }
}

/// Deployment stamping settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Token replaced with the generation tag in the deployed script
    pub placeholder: String,

    /// File name of the version descriptor written next to the script
    pub version_file: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            version_file: "version.json".to_string(),
        }
    }
}
