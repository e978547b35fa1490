//! Service layer for the crawler application.
//!
//! This module contains the business logic for:
//! - Count and record extraction (`HtmlExtractor`)
//! - Round-based frontier probing (`ProbeScheduler`)
//! - Batched page fetching (`FetchExecutor`)

mod extract;
mod fetcher;
mod prober;

#[cfg(test)]
pub(crate) mod fake;

pub use extract::{Extractor, HtmlExtractor};
pub use fetcher::{FetchExecutor, FetchOutcome};
pub use prober::{PartitionOutcome, ProbeScheduler};
