// src/pipeline/properties.rs

//! Listing fetch pipeline: partition, expand leaf queries into pages, fetch.

use crate::error::Result;
use crate::models::Query;
use crate::services::{FetchExecutor, FetchOutcome};
use crate::utils::log;

use super::CrawlContext;
use super::pages::run_pages;

/// Fetch every result page of the frontier rooted at `root`.
///
/// With `skip_partition` the stored frontier is used as is.
pub async fn run_properties(
    context: &CrawlContext,
    root: &Query,
    skip_partition: bool,
) -> Result<FetchOutcome> {
    let total_steps = if skip_partition { 2 } else { 3 };
    let mut current_step = 1;

    if !skip_partition {
        log::step(current_step, total_steps, "Partition - Probing result counts");
        run_pages(context, root).await?;
        current_step += 1;
    }

    log::step(current_step, total_steps, "Expand - Building page URLs");
    let urls = page_urls(context, root).await?;
    log::info(&format!("{} pages to fetch", urls.len()));
    current_step += 1;

    log::step(current_step, total_steps, "Fetch - Downloading listing pages");
    let executor = FetchExecutor::new(
        context.config.clone(),
        context.transport.clone(),
        context.extractor.clone(),
        context.store.clone(),
    );
    let outcome = executor.fetch_pages(urls).await?;

    log::summary(
        "Fetch",
        &[
            ("Pages", outcome.requested.to_string()),
            ("Already stored", outcome.skipped.to_string()),
            ("Fetched", outcome.fetched.to_string()),
            (
                "Failed",
                format!(
                    "{} ({})",
                    outcome.failed,
                    log::percent(outcome.failed, outcome.requested - outcome.skipped)
                ),
            ),
            ("Records", outcome.records.to_string()),
        ],
    );
    if outcome.failed > 0 {
        log::warn(&format!("Re-run to retry the {} failed pages", outcome.failed));
    }

    Ok(outcome)
}

/// Page URLs of every accepted or unsplittable entry under `root`, in
/// frontier order.
async fn page_urls(context: &CrawlContext, root: &Query) -> Result<Vec<String>> {
    let sort = &context.config.partition.page_sort;
    Ok(context
        .store
        .list_entries()
        .await?
        .iter()
        .filter(|entry| entry.is_fetchable() && entry.is_within(root))
        .flat_map(|entry| entry.page_urls(sort))
        .collect())
}
