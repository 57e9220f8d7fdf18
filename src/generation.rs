//! Generation tags and deployment stamping
//!
//! A generation tag identifies one deployed build. Build tooling substitutes
//! it for a placeholder token in the deployed script and writes a version
//! descriptor next to the deployed assets.

use crate::error::{SwCacheError, SwCacheResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Environment variable holding an explicit generation override
pub const GENERATION_ENV: &str = "SWCACHE_GENERATION";

/// Default placeholder token in the deployed script
pub const DEFAULT_PLACEHOLDER: &str = "__SW_GENERATION__";

/// Opaque identifier of one deployed build
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GenerationTag(String);

impl GenerationTag {
    /// Validate and wrap a tag
    pub fn new(tag: impl Into<String>) -> SwCacheResult<Self> {
        let tag = tag.into();
        let trimmed = tag.trim();
        let reason = if trimmed.is_empty() {
            Some("empty")
        } else if trimmed.contains(':') {
            Some("contains ':'")
        } else if trimmed.chars().any(char::is_whitespace) {
            Some("contains whitespace")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(SwCacheError::InvalidGeneration {
                tag,
                reason: reason.to_string(),
            }),
            None => Ok(Self(trimmed.to_string())),
        }
    }

    /// Compact UTC timestamp tag (`YYYYMMDDHHMMSS`)
    pub fn from_timestamp(at: DateTime<Utc>) -> Self {
        Self(at.format("%Y%m%d%H%M%S").to_string())
    }

    /// Use the override when given, otherwise a timestamp of `now`
    pub fn resolve(explicit: Option<&str>, now: DateTime<Utc>) -> SwCacheResult<Self> {
        match explicit {
            Some(tag) if !tag.trim().is_empty() => Self::new(tag),
            _ => Ok(Self::from_timestamp(now)),
        }
    }

    /// Resolve from `SWCACHE_GENERATION`, falling back to the current time
    pub fn from_env() -> SwCacheResult<Self> {
        let explicit = std::env::var(GENERATION_ENV).ok();
        Self::resolve(explicit.as_deref(), Utc::now())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for GenerationTag {
    type Error = SwCacheError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<GenerationTag> for String {
    fn from(tag: GenerationTag) -> Self {
        tag.0
    }
}

impl fmt::Display for GenerationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Version descriptor published alongside the deployed assets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDescriptor {
    pub version: GenerationTag,
    pub built_at: DateTime<Utc>,
}

impl VersionDescriptor {
    pub fn new(version: GenerationTag, built_at: DateTime<Utc>) -> Self {
        Self { version, built_at }
    }

    /// Write the descriptor as pretty JSON
    pub async fn write(&self, path: &Path) -> SwCacheResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .await
            .map_err(|e| SwCacheError::io(format!("writing {}", path.display()), e))?;
        debug!("Wrote version descriptor {}", path.display());
        Ok(())
    }

    /// Read a descriptor written by [`VersionDescriptor::write`]
    pub async fn read(path: &Path) -> SwCacheResult<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| SwCacheError::io(format!("reading {}", path.display()), e))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Replace every occurrence of `placeholder` in `script` with the tag
pub fn stamp_script(script: &str, placeholder: &str, tag: &GenerationTag) -> Option<String> {
    if placeholder.is_empty() || !script.contains(placeholder) {
        return None;
    }
    Some(script.replace(placeholder, tag.as_str()))
}

/// Outcome of stamping a deployment
#[derive(Debug, Clone)]
pub struct StampReport {
    pub script: PathBuf,
    pub descriptor: PathBuf,
    pub replacements: usize,
    pub descriptor_value: VersionDescriptor,
}

/// Stamp a deployed script in place and write its version descriptor
///
/// Fails without touching anything when the script has no placeholder,
/// so a script that was already stamped is never rewritten.
pub async fn stamp_deployment(
    script: &Path,
    descriptor: &Path,
    placeholder: &str,
    tag: &GenerationTag,
    built_at: DateTime<Utc>,
) -> SwCacheResult<StampReport> {
    let content = fs::read_to_string(script)
        .await
        .map_err(|e| SwCacheError::io(format!("reading {}", script.display()), e))?;

    let replacements = content.matches(placeholder).count();
    let stamped =
        stamp_script(&content, placeholder, tag).ok_or_else(|| SwCacheError::PlaceholderMissing {
            placeholder: placeholder.to_string(),
            path: script.to_path_buf(),
        })?;

    fs::write(script, stamped)
        .await
        .map_err(|e| SwCacheError::io(format!("writing {}", script.display()), e))?;

    let descriptor_value = VersionDescriptor::new(tag.clone(), built_at);
    descriptor_value.write(descriptor).await?;

    info!(
        generation = %tag,
        replacements,
        script = %script.display(),
        "Stamped deployment"
    );

    Ok(StampReport {
        script: script.to_path_buf(),
        descriptor: descriptor.to_path_buf(),
        replacements,
        descriptor_value,
    })
}
