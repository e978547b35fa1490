// src/pipeline/report.rs

//! Coverage of the stored frontier.
//!
//! Three kinds of entries mean the crawl may miss listings: probes that
//! returned no count, queries that still overflow at the granularity floor,
//! and split queries whose children were never probed because of the round
//! limit.

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{Config, EntryStatus, FrontierEntry, Query};
use crate::partition::{PartitionPlanner, Plan};
use crate::storage::FrontierStore;
use crate::utils::log;

/// Summary of how completely the frontier covers its root.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CoverageReport {
    pub entries: usize,
    pub accepted: usize,
    pub split: usize,
    pub unsplittable: usize,
    /// Listings counted in fetchable entries
    pub listings: u64,
    /// Listings past the page window of unsplittable entries
    pub unreachable_listings: u64,
    pub expected_pages: usize,
    pub fetched_pages: usize,
    /// Accepted entries whose probe gave no count
    pub unknown_size: Vec<String>,
    pub unsplittable_urls: Vec<String>,
    /// Split entries with at least one unprobed child
    pub truncated: Vec<String>,
}

impl CoverageReport {
    /// Build the report from the store's current contents, limited to the
    /// frontier under `scope` when one is given.
    pub async fn build(
        config: &Config,
        store: &dyn FrontierStore,
        scope: Option<&Query>,
    ) -> Result<Self> {
        let mut entries = store.list_entries().await?;
        if let Some(root) = scope {
            entries.retain(|entry| entry.is_within(root));
        }
        let fetched = store.fetched_urls().await?;
        let planner = PartitionPlanner::new(Arc::new(config.partition.clone()));
        let probed: HashSet<&str> = entries.iter().map(|e| e.url.as_str()).collect();

        let mut report = CoverageReport {
            entries: entries.len(),
            ..Self::default()
        };

        for entry in &entries {
            match entry.status {
                EntryStatus::Accepted => {
                    report.accepted += 1;
                    if entry.is_unknown_size() {
                        report.unknown_size.push(entry.url.clone());
                    }
                }
                EntryStatus::Split => {
                    report.split += 1;
                    if Self::has_unprobed_children(&planner, entry, &probed) {
                        report.truncated.push(entry.url.clone());
                    }
                }
                EntryStatus::Unsplittable => {
                    report.unsplittable += 1;
                    report.unsplittable_urls.push(entry.url.clone());
                    if let (Some(total), Some(capacity)) =
                        (entry.summary.total_count, entry.summary.capacity())
                    {
                        report.unreachable_listings += total.saturating_sub(capacity);
                    }
                }
            }

            if entry.is_fetchable() {
                report.listings += entry.summary.total_count.unwrap_or(0);
                let pages = entry.page_urls(&config.partition.page_sort);
                report.fetched_pages += pages.iter().filter(|url| fetched.contains(*url)).count();
                report.expected_pages += pages.len();
            }
        }

        Ok(report)
    }

    fn has_unprobed_children(
        planner: &PartitionPlanner,
        entry: &FrontierEntry,
        probed: &HashSet<&str>,
    ) -> bool {
        let Ok(query) = entry.query() else {
            return false;
        };
        match planner.plan(&query) {
            Plan::Split { children, .. } => children
                .iter()
                .any(|child| !probed.contains(child.url().as_str())),
            Plan::Unsplittable => false,
        }
    }

    /// Whether every stored query is resolved with a known count.
    pub fn is_complete(&self) -> bool {
        self.unknown_size.is_empty() && self.unsplittable_urls.is_empty() && self.truncated.is_empty()
    }

    /// Write the report to the log, listing at most `limit` URLs per gap.
    pub fn log(&self, limit: usize) {
        log::summary(
            "Frontier coverage",
            &[
                ("Entries", self.entries.to_string()),
                ("Accepted", self.accepted.to_string()),
                ("Split", self.split.to_string()),
                ("Unsplittable", self.unsplittable.to_string()),
                ("Listings in leaves", self.listings.to_string()),
                (
                    "Pages fetched",
                    format!(
                        "{}/{} ({})",
                        self.fetched_pages,
                        self.expected_pages,
                        log::percent(self.fetched_pages, self.expected_pages)
                    ),
                ),
            ],
        );

        if self.is_complete() {
            log::info("Every query resolved within the page window");
            return;
        }

        Self::log_gap("Unknown size (probe failed)", &self.unknown_size, limit);
        Self::log_gap(
            &format!(
                "Unsplittable ({} listings past the page window)",
                self.unreachable_listings
            ),
            &self.unsplittable_urls,
            limit,
        );
        Self::log_gap("Truncated by round limit", &self.truncated, limit);
    }

    fn log_gap(title: &str, urls: &[String], limit: usize) {
        if urls.is_empty() {
            return;
        }
        log::warn(&format!("{}: {}", title, urls.len()));
        for url in urls.iter().take(limit) {
            log::sub_item(url);
        }
        if urls.len() > limit {
            log::sub_item(&format!("... and {} more", urls.len() - limit));
        }
    }
}

/// Build and log the coverage report for the configured store.
pub async fn run_report(
    config: &Config,
    store: &dyn FrontierStore,
    scope: Option<&Query>,
) -> Result<CoverageReport> {
    log::header("Coverage report");
    let report = CoverageReport::build(config, store, scope).await?;
    report.log(20);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PageSummary, ProbeResult};
    use crate::storage::LocalStorage;

    const BASE: &str = "https://example.com/city/1";

    fn entry(fragment: &str, summary: PageSummary, status: EntryStatus) -> FrontierEntry {
        let query = Query::parse(&format!("{BASE}/filter/{fragment}")).unwrap();
        FrontierEntry::new(&ProbeResult::new(query, summary), status, 0)
    }

    fn summary(total: u64, pages: u32) -> PageSummary {
        PageSummary {
            total_count: Some(total),
            page_count: Some(pages),
            per_page_count: Some(20),
        }
    }

    #[tokio::test]
    async fn test_empty_store_is_complete() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStorage::open(dir.path()).await.unwrap();
        let report = CoverageReport::build(&Config::default(), &store, None).await.unwrap();
        assert_eq!(report, CoverageReport::default());
        assert!(report.is_complete());
    }

    #[tokio::test]
    async fn test_gaps_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStorage::open(dir.path()).await.unwrap();

        store
            .insert_probes(&[
                // Root split into price halves; only the lower half was probed.
                entry("include=sold-3yr", summary(100_000, 350), EntryStatus::Split),
                entry(
                    "min-price=1000,max-price=1000000,include=sold-3yr",
                    PageSummary::default(),
                    EntryStatus::Accepted,
                ),
                entry(
                    "min-price=100000,max-price=101000,min-sqft=10-sqft,max-sqft=11-sqft,\
                     min-year-built=1999,max-year-built=2000,include=sold-3yr",
                    summary(7500, 350),
                    EntryStatus::Unsplittable,
                ),
                entry(
                    "min-price=5000,max-price=6000,include=sold-3yr",
                    summary(45, 3),
                    EntryStatus::Accepted,
                ),
            ])
            .await
            .unwrap();

        let report = CoverageReport::build(&Config::default(), &store, None).await.unwrap();
        assert_eq!(report.entries, 4);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.unknown_size.len(), 1);
        assert_eq!(report.unsplittable_urls.len(), 1);
        assert_eq!(report.unreachable_listings, 500);
        assert_eq!(report.truncated, vec![format!("{BASE}/filter/include=sold-3yr")]);
        assert_eq!(report.listings, 7545);
        // 1 (unknown) + 350 (unsplittable) + 3
        assert_eq!(report.expected_pages, 354);
        assert_eq!(report.fetched_pages, 0);
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn test_scope_limits_report_to_one_market() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStorage::open(dir.path()).await.unwrap();
        let other = Query::parse("https://example.com/city/2/filter/include=sold-3yr").unwrap();

        store
            .insert_probes(&[
                entry("include=sold-3yr", summary(45, 3), EntryStatus::Accepted),
                FrontierEntry::new(&ProbeResult::failed(other), EntryStatus::Accepted, 0),
            ])
            .await
            .unwrap();

        let all = CoverageReport::build(&Config::default(), &store, None).await.unwrap();
        assert_eq!(all.entries, 2);
        assert!(!all.is_complete());

        let scoped = CoverageReport::build(&Config::default(), &store, Some(&Query::new(BASE)))
            .await
            .unwrap();
        assert_eq!(scoped.entries, 1);
        assert_eq!(scoped.expected_pages, 3);
        assert!(scoped.is_complete());
    }
}
