//! Route command: runs a page's prefetch and reports what landed in cache.

use serde::Serialize;
use tabled::Tabled;

use deskflow_core::SyncClient;

use crate::cli::{GlobalOpts, RouteArgs};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct Prefetched {
    resource: String,
    cached: bool,
    rows: usize,
    error: Option<String>,
}

#[derive(Tabled)]
struct PrefetchedRow {
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Cached")]
    cached: String,
    #[tabled(rename = "Rows")]
    rows: usize,
    #[tabled(rename = "Error")]
    error: String,
}

impl From<&Prefetched> for PrefetchedRow {
    fn from(p: &Prefetched) -> Self {
        Self {
            resource: p.resource.clone(),
            cached: if p.cached { "yes" } else { "no" }.into(),
            rows: p.rows,
            error: p.error.clone().unwrap_or_default(),
        }
    }
}

pub async fn handle(client: &SyncClient, args: RouteArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let resources = client.prefetch().prefetch_route(&args.path).await;
    if resources.is_empty() {
        if !global.quiet {
            eprintln!("No collections are prefetched for {}", args.path);
        }
        return Ok(());
    }

    let report: Vec<Prefetched> = resources
        .iter()
        .map(|resource| {
            let snapshot = client.cache().get(&resource.key());
            Prefetched {
                resource: resource.to_string(),
                cached: snapshot.as_ref().is_some_and(|s| s.data.is_some()),
                rows: snapshot
                    .as_ref()
                    .and_then(|s| s.data.as_ref())
                    .map_or(0, |rows| rows.len()),
                error: snapshot.and_then(|s| s.error).map(|e| e.to_string()),
            }
        })
        .collect();

    let rendered = output::render_list(
        global.output,
        &report,
        |p| PrefetchedRow::from(p),
        |p| p.resource.clone(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
