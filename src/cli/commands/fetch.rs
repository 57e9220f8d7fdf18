//! Fetch command - answer one request the way the active generation would

use super::install::http_fetcher;
use super::{open_storage, settings_for};
use crate::cli::args::FetchArgs;
use crate::config::Config;
use crate::controller::{CacheController, FetchEvent, Outcome};
use crate::error::{SwCacheError, SwCacheResult};
use crate::fetch::{Fetcher, OfflineFetcher};
use crate::http::Request;
use crate::strategy::Source;
use console::style;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Execute the fetch command
pub async fn execute(args: FetchArgs, config: &Config, storage: Option<&Path>) -> SwCacheResult<()> {
    let settings = settings_for(&args.target, config).await?;
    let storage = Arc::new(open_storage(config, storage).await?);
    let fetcher: Arc<dyn Fetcher> = if args.offline {
        Arc::new(OfflineFetcher)
    } else {
        Arc::new(http_fetcher(config))
    };

    let mut request = Request::parse_get(&args.url)?;
    if args.navigate {
        request = Request::navigate(request.url);
    }

    let controller = CacheController::resume(settings, storage, fetcher.clone());
    let (response, source) = match controller.respond(FetchEvent::new(request.clone())).await? {
        Outcome::Served(served) => {
            if let Some(revalidation) = served.revalidation {
                // Keep the process alive until the background refresh lands
                if let Err(e) = revalidation.await {
                    debug!("Revalidation task failed: {}", e);
                }
            }
            (served.response, Some(served.source))
        }
        Outcome::Passthrough(reason) => {
            let response = fetcher.fetch(&request).await?;
            debug!("Passed through: {:?}", reason);
            (response, None)
        }
        other => {
            return Err(SwCacheError::Internal(format!(
                "unexpected outcome for fetch: {:?}",
                other
            )))
        }
    };

    if args.body {
        io::stdout()
            .write_all(&response.body)
            .map_err(|e| SwCacheError::io("writing response body", e))?;
        return Ok(());
    }

    let status = if response.is_error() {
        style("network error".to_string()).red()
    } else if response.is_ok() {
        style(response.status.to_string()).green()
    } else {
        style(response.status.to_string()).yellow()
    };
    let source_style = match source {
        Some(Source::Cache) | Some(Source::IndexFallback) => style(source_label(source)).cyan(),
        _ => style(source_label(source)).dim(),
    };

    println!("{} {} [{}]", status, args.url, source_style);
    println!("  {} bytes", response.body.len());
    Ok(())
}

fn source_label(source: Option<Source>) -> String {
    source
        .map(|s| s.to_string())
        .unwrap_or_else(|| "passthrough".to_string())
}
