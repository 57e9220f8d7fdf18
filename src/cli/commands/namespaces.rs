//! Namespaces command - list cache namespaces with entry counts

use super::open_storage;
use crate::cli::args::{NamespacesArgs, OutputFormat};
use crate::config::Config;
use crate::error::SwCacheResult;
use crate::namespace::owned_generation;
use crate::storage::CacheStorage;
use console::style;
use serde::Serialize;
use std::path::Path;

/// How a namespace relates to the configured prefix and generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceStatus {
    Current,
    Stale,
    /// Under our prefix, no generation to compare against
    Owned,
    Foreign,
}

impl NamespaceStatus {
    pub fn classify(name: &str, prefix: &str, generation: Option<&str>) -> Self {
        match owned_generation(name, prefix) {
            Some(owned) => match generation {
                Some(g) if owned == g => Self::Current,
                Some(_) => Self::Stale,
                None => Self::Owned,
            },
            _ => Self::Foreign,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Stale => "stale",
            Self::Owned => "-",
            Self::Foreign => "foreign",
        }
    }
}

#[derive(Debug, Serialize)]
struct NamespaceRow {
    name: String,
    entries: usize,
    status: NamespaceStatus,
}

/// Execute the namespaces command
pub async fn execute(args: NamespacesArgs, config: &Config, storage: Option<&Path>) -> SwCacheResult<()> {
    let storage = open_storage(config, storage).await?;
    let mut rows = Vec::new();
    for name in storage.namespaces().await? {
        let entries = storage.keys(&name).await?.len();
        let status =
            NamespaceStatus::classify(&name, &config.cache.prefix, args.generation.as_deref());
        rows.push(NamespaceRow {
            name,
            entries,
            status,
        });
    }

    match args.format {
        OutputFormat::Table => print_table(&rows),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Plain => rows.iter().for_each(|r| println!("{}", r.name)),
    }
    Ok(())
}

fn print_table(rows: &[NamespaceRow]) {
    if rows.is_empty() {
        println!("No cache namespaces found.");
        return;
    }

    println!("{:<48} {:>8} {:<10}", "NAMESPACE", "ENTRIES", "STATUS");
    println!("{}", "-".repeat(68));
    for row in rows {
        let status = match row.status {
            NamespaceStatus::Current => style(row.status.label()).green(),
            NamespaceStatus::Stale => style(row.status.label()).yellow(),
            _ => style(row.status.label()).dim(),
        };
        println!("{:<48} {:>8} {:<10}", row.name, row.entries, status);
    }
    println!();
    println!("Total: {} namespace(s)", rows.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_namespaces() {
        let classify = |name| NamespaceStatus::classify(name, "erp", Some("g2"));
        assert_eq!(classify("erp:app:g2"), NamespaceStatus::Current);
        assert_eq!(classify("erp:static:g1"), NamespaceStatus::Stale);
        assert_eq!(classify("erp:runtime:g1"), NamespaceStatus::Stale);
        assert_eq!(classify("crm:static:g1"), NamespaceStatus::Foreign);
        assert_eq!(classify("scratch"), NamespaceStatus::Foreign);
        assert_eq!(
            NamespaceStatus::classify("erp:images:g1", "erp", None),
            NamespaceStatus::Owned
        );
    }
}
