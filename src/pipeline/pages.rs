// src/pipeline/pages.rs

//! Partitioning pipeline.

use chrono::Utc;

use crate::error::Result;
use crate::models::Query;
use crate::services::{PartitionOutcome, ProbeScheduler};
use crate::utils::log;

use super::CrawlContext;
use super::report::CoverageReport;

/// Partition `root` into queries that each fit the page window.
pub async fn run_pages(context: &CrawlContext, root: &Query) -> Result<PartitionOutcome> {
    let start_time = Utc::now();
    log::header("Partitioning search space");
    log::info(&format!("Root query: {}", root));
    log::info(&format!(
        "Using {} proxies, up to {} rounds",
        context.transport.slots(),
        context.config.partition.max_rounds
    ));

    let scheduler = ProbeScheduler::new(
        context.config.clone(),
        context.transport.clone(),
        context.extractor.clone(),
        context.store.clone(),
    );
    let outcome = scheduler.run(root).await?;

    let elapsed = Utc::now() - start_time;
    log::summary(
        "Partition",
        &[
            ("Rounds", outcome.rounds.to_string()),
            ("Probed", outcome.probed.to_string()),
            ("Accepted", outcome.accepted.to_string()),
            ("Split", outcome.split.to_string()),
            ("Unsplittable", outcome.unsplittable.to_string()),
            (
                "Failed probes",
                format!(
                    "{} ({})",
                    outcome.failed,
                    log::percent(outcome.failed, outcome.probed)
                ),
            ),
            ("Truncated", outcome.truncated.to_string()),
            ("Elapsed", format!("{}s", elapsed.num_seconds())),
        ],
    );

    CoverageReport::build(&context.config, context.store.as_ref(), Some(root))
        .await?
        .log(10);

    Ok(outcome)
}
