//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// swcache - Versioned offline caching layer
///
/// Stamps deployments with a generation tag and drives the cache
/// controller against on-disk storage.
#[derive(Parser, Debug)]
#[command(name = "swcache")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "SWCACHE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Skip local .swcache.toml discovery
    #[arg(long, global = true)]
    pub no_local: bool,

    /// Cache storage directory (overrides cache.storage_dir)
    #[arg(long, global = true, env = "SWCACHE_STORAGE")]
    pub storage: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Substitute the generation tag into a deployed script and write version.json
    Stamp(StampArgs),

    /// Install and activate a generation, pruning stale namespaces
    Install(InstallArgs),

    /// Handle one request through the active generation
    Fetch(FetchArgs),

    /// List cache namespaces
    Namespaces(NamespacesArgs),

    /// Delete every namespace under the configured prefix
    Clear(ClearArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Arguments for the stamp command
#[derive(Parser, Debug)]
pub struct StampArgs {
    /// Deployed script containing the placeholder token
    pub script: PathBuf,

    /// Explicit generation tag (defaults to a compact UTC timestamp)
    #[arg(short, long, env = "SWCACHE_GENERATION")]
    pub generation: Option<String>,

    /// Where to write the version descriptor (defaults next to the script)
    #[arg(long)]
    pub descriptor: Option<PathBuf>,
}

/// Generation and scope shared by controller commands
#[derive(Parser, Debug)]
pub struct GenerationArgs {
    /// Registration scope URL (must end with '/')
    #[arg(short, long)]
    pub scope: String,

    /// Generation tag
    #[arg(short, long, env = "SWCACHE_GENERATION", conflicts_with = "descriptor")]
    pub generation: Option<String>,

    /// Read the generation from a version descriptor
    #[arg(long)]
    pub descriptor: Option<PathBuf>,
}

/// Arguments for the install command
#[derive(Parser, Debug)]
pub struct InstallArgs {
    #[command(flatten)]
    pub target: GenerationArgs,
}

/// Arguments for the fetch command
#[derive(Parser, Debug)]
pub struct FetchArgs {
    /// URL to request
    pub url: String,

    #[command(flatten)]
    pub target: GenerationArgs,

    /// Treat the request as a page navigation
    #[arg(long)]
    pub navigate: bool,

    /// Simulate a network outage
    #[arg(long)]
    pub offline: bool,

    /// Write the response body to stdout
    #[arg(long)]
    pub body: bool,
}

/// Arguments for the namespaces command
#[derive(Parser, Debug)]
pub struct NamespacesArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// Mark namespaces of this generation as current
    #[arg(short, long, env = "SWCACHE_GENERATION")]
    pub generation: Option<String>,
}

/// Arguments for the clear command
#[derive(Parser, Debug)]
pub struct ClearArgs {
    /// Skip confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

/// Output format for list commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}
