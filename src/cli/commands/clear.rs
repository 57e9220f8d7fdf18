//! Clear command - delete every namespace under the configured prefix

use super::open_storage;
use crate::cli::args::ClearArgs;
use crate::config::Config;
use crate::error::SwCacheResult;
use crate::namespace::owned_generation;
use crate::storage::CacheStorage;
use console::style;
use std::io::{self, Write};
use std::path::Path;
use tracing::debug;

/// Execute the clear command
pub async fn execute(args: ClearArgs, config: &Config, storage: Option<&Path>) -> SwCacheResult<()> {
    let storage = open_storage(config, storage).await?;
    let prefix = &config.cache.prefix;

    let owned: Vec<String> = storage
        .namespaces()
        .await?
        .into_iter()
        .filter(|name| owned_generation(name, prefix).is_some())
        .collect();

    if owned.is_empty() {
        println!("No namespaces under prefix '{}' to clear.", prefix);
        return Ok(());
    }

    println!("This will remove {} namespace(s):", owned.len());
    for name in &owned {
        println!("  {} {}", style("•").red(), name);
    }
    println!();

    if !args.yes {
        print!("Are you sure? [y/N] ");
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            println!("Failed to read input, aborting.");
            return Ok(());
        }

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let mut removed = 0;
    for name in owned {
        debug!("Removing namespace: {}", name);
        if storage.delete_namespace(&name).await? {
            removed += 1;
        }
    }

    println!("{} cleared {} namespace(s)", style("✓").green(), removed);
    Ok(())
}
