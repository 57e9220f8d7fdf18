//! Install command - install and activate a generation against disk storage

use super::{open_storage, settings_for};
use crate::cli::args::InstallArgs;
use crate::config::Config;
use crate::controller::CacheController;
use crate::error::SwCacheResult;
use crate::fetch::HttpFetcher;
use crate::registration::{RegisterOutcome, Registration};
use console::style;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Execute the install command
pub async fn execute(args: InstallArgs, config: &Config, storage: Option<&Path>) -> SwCacheResult<()> {
    let settings = settings_for(&args.target, config).await?;
    let generation = settings.generation.clone();
    let storage = Arc::new(open_storage(config, storage).await?);
    let fetcher = Arc::new(http_fetcher(config));

    println!(
        "Installing generation {} for {}",
        style(generation.as_str()).cyan(),
        settings.scope
    );

    let mut registration = Registration::new();
    let controller = CacheController::new(settings, storage, fetcher);

    match registration.register(controller).await? {
        RegisterOutcome::Activated(report) => {
            for name in &report.deleted {
                println!("  {} deleted stale namespace {}", style("•").red(), name);
            }
            println!(
                "{} Generation {} active ({} stale namespace(s) removed)",
                style("✓").green(),
                generation,
                report.deleted.len()
            );
        }
        RegisterOutcome::Waiting => {
            println!("{} Generation {} is waiting", style("~").yellow(), generation);
        }
    }

    Ok(())
}

/// HTTP fetcher honouring the configured timeout
pub(crate) fn http_fetcher(config: &Config) -> HttpFetcher {
    let timeout = match config.cache.fetch_timeout_secs {
        0 => None,
        secs => Some(Duration::from_secs(secs)),
    };
    HttpFetcher::new(timeout)
}
