//! CLI command implementations

pub mod clear;
pub mod config;
pub mod fetch;
pub mod install;
pub mod namespaces;
pub mod stamp;

pub use clear::execute as clear;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use install::execute as install;
pub use namespaces::execute as namespaces;
pub use stamp::execute as stamp;

use crate::cli::args::GenerationArgs;
use crate::config::{Config, ConfigManager};
use crate::controller::ControllerSettings;
use crate::error::{SwCacheError, SwCacheResult};
use crate::generation::{GenerationTag, VersionDescriptor};
use crate::storage::DiskStorage;
use std::path::{Path, PathBuf};

/// Open the on-disk storage the CLI works against
pub(crate) async fn open_storage(config: &Config, storage: Option<&Path>) -> SwCacheResult<DiskStorage> {
    let root = storage
        .map(Path::to_path_buf)
        .unwrap_or_else(|| ConfigManager::storage_dir(config));
    DiskStorage::new(&root).await
}

/// Resolve the generation from an explicit tag or a version descriptor
pub(crate) async fn resolve_generation(
    generation: Option<&str>,
    descriptor: Option<&PathBuf>,
) -> SwCacheResult<GenerationTag> {
    match (generation, descriptor) {
        (_, Some(path)) => Ok(VersionDescriptor::read(path).await?.version),
        (Some(tag), None) => GenerationTag::new(tag),
        (None, None) => Err(SwCacheError::User(
            "No generation given. Pass --generation or --descriptor".to_string(),
        )),
    }
}

/// Controller settings for a generation target
pub(crate) async fn settings_for(
    target: &GenerationArgs,
    config: &Config,
) -> SwCacheResult<ControllerSettings> {
    let generation =
        resolve_generation(target.generation.as_deref(), target.descriptor.as_ref()).await?;
    ControllerSettings::from_config(config, generation, &target.scope)
}
