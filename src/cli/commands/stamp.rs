//! Stamp command - write the generation into a deployed script

use crate::cli::args::StampArgs;
use crate::config::Config;
use crate::error::SwCacheResult;
use crate::generation::{stamp_deployment, GenerationTag};
use chrono::Utc;
use console::style;

/// Execute the stamp command
pub async fn execute(args: StampArgs, config: &Config) -> SwCacheResult<()> {
    let now = Utc::now();
    let tag = GenerationTag::resolve(args.generation.as_deref(), now)?;

    let descriptor = args.descriptor.unwrap_or_else(|| {
        args.script
            .parent()
            .map(|dir| dir.join(&config.deploy.version_file))
            .unwrap_or_else(|| config.deploy.version_file.clone().into())
    });

    let report =
        stamp_deployment(&args.script, &descriptor, &config.deploy.placeholder, &tag, now).await?;

    println!(
        "{} Stamped {} with generation {} ({} replacement(s))",
        style("✓").green(),
        report.script.display(),
        style(tag.as_str()).cyan(),
        report.replacements
    );
    println!("  Version descriptor: {}", report.descriptor.display());

    Ok(())
}
