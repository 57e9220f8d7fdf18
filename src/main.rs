//! swcache - Versioned offline caching layer
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::process::ExitCode;
use swcache::cli::{Cli, Commands};
use swcache::config::{Config, ConfigManager};
use swcache::error::{SwCacheError, SwCacheResult};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> SwCacheResult<()> {
    let cli = Cli::parse();

    let config_manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };

    // Find local config unless --no-local is set
    let local_config_path = if cli.no_local {
        None
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| SwCacheError::io("getting current directory", e))?;
        ConfigManager::find_local_config(&cwd)
    };

    let config = config_manager
        .load_merged(local_config_path.as_deref())
        .await?;

    init_logging(cli.verbose, &config);
    if let Some(ref path) = local_config_path {
        debug!("Using local config: {}", path.display());
    }

    let storage = cli.storage.as_deref();

    match cli.command {
        Commands::Stamp(args) => swcache::cli::commands::stamp(args, &config).await,
        Commands::Install(args) => swcache::cli::commands::install(args, &config, storage).await,
        Commands::Fetch(args) => swcache::cli::commands::fetch(args, &config, storage).await,
        Commands::Namespaces(args) => {
            swcache::cli::commands::namespaces(args, &config, storage).await
        }
        Commands::Clear(args) => swcache::cli::commands::clear(args, &config, storage).await,
        Commands::Config(args) => {
            swcache::cli::commands::config(args, &config, &config_manager).await
        }
    }
}

/// Initialize logging: 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("swcache=warn"),
        1 => EnvFilter::new("swcache=info"),
        _ => EnvFilter::new("swcache=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
