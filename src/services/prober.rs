// src/services/prober.rs

//! Round-based probing of the query frontier.
//!
//! Each round probes every pending query once, records the outcome and
//! plans children for the queries that overflow the page window. Rounds are
//! barriers; the next round only holds children never probed before.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::models::{Config, EntryStatus, FrontierEntry, PageSummary, ProbeResult, Query};
use crate::partition::{PartitionPlanner, Plan};
use crate::services::Extractor;
use crate::storage::FrontierStore;
use crate::utils::http::{ProxyRotation, Transport};
use crate::utils::{log, random_delay};

/// Counters for one partitioning run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PartitionOutcome {
    pub rounds: usize,
    pub probed: usize,
    pub accepted: usize,
    pub split: usize,
    pub unsplittable: usize,
    /// Probes with no usable count (accepted with unknown size)
    pub failed: usize,
    /// Children left unprobed by the round limit
    pub truncated: usize,
}

/// A query waiting to be probed, with the round it belongs to.
#[derive(Debug, Clone)]
struct Pending {
    query: Query,
    depth: usize,
}

/// Drives the probe rounds and writes every outcome to the store.
pub struct ProbeScheduler {
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
    extractor: Arc<dyn Extractor>,
    store: Arc<dyn FrontierStore>,
    planner: PartitionPlanner,
}

impl ProbeScheduler {
    pub fn new(
        config: Arc<Config>,
        transport: Arc<dyn Transport>,
        extractor: Arc<dyn Extractor>,
        store: Arc<dyn FrontierStore>,
    ) -> Self {
        let planner = PartitionPlanner::new(Arc::new(config.partition.clone()));
        Self {
            config,
            transport,
            extractor,
            store,
            planner,
        }
    }

    /// Partition `root` until every query is accepted, unsplittable or
    /// beyond the round limit.
    ///
    /// Picks up where a previous run stopped when the store already holds
    /// the root.
    pub async fn run(&self, root: &Query) -> Result<PartitionOutcome> {
        let max_rounds = self.config.partition.max_rounds;
        let mut outcome = PartitionOutcome::default();
        let mut frontier = self.initial_frontier(root).await?;

        if frontier.is_empty() {
            log::info(&format!("Frontier for {} is already complete", root));
            return Ok(outcome);
        }

        while !frontier.is_empty() {
            let (pending, beyond): (Vec<Pending>, Vec<Pending>) =
                frontier.into_iter().partition(|p| p.depth < max_rounds);

            if !beyond.is_empty() {
                outcome.truncated += beyond.len();
                log::warn(&format!(
                    "Round limit {} reached: {} queries left unprobed",
                    max_rounds,
                    beyond.len()
                ));
            }
            if pending.is_empty() {
                break;
            }

            if outcome.rounds > 0 {
                random_delay(self.config.crawler.round_delay_ms).await;
            }

            log::info(&format!(
                "Round {}: probing {} queries",
                outcome.rounds + 1,
                pending.len()
            ));
            let results = self.probe_round(pending, &mut outcome).await;

            let mut entries = Vec::with_capacity(results.len());
            let mut children = Vec::new();
            for (pending, result) in results {
                let status = self.classify(&pending, &result, &mut children);
                match status {
                    EntryStatus::Accepted => outcome.accepted += 1,
                    EntryStatus::Split => outcome.split += 1,
                    EntryStatus::Unsplittable => outcome.unsplittable += 1,
                }
                entries.push(FrontierEntry::new(&result, status, pending.depth));
            }

            self.store.insert_probes(&entries).await?;
            outcome.rounds += 1;

            if self.config.logging.show_progress {
                log::info(&format!(
                    "Round {} done: {} accepted, {} split, {} unsplittable so far",
                    outcome.rounds,
                    outcome.accepted,
                    outcome.split,
                    outcome.unsplittable
                ));
            }

            frontier = self.unprobed(children).await?;
        }

        Ok(outcome)
    }

    /// Root if it has never been probed, otherwise the unprobed children of
    /// every stored split entry under the root.
    async fn initial_frontier(&self, root: &Query) -> Result<Vec<Pending>> {
        if !self.store.contains(&root.url()).await? {
            return Ok(vec![Pending {
                query: root.clone(),
                depth: 0,
            }]);
        }

        let unresolved = self.store.list_unresolved().await?;
        let mut resumed = 0;
        let mut children = Vec::new();
        for entry in &unresolved {
            let query = match entry.query() {
                Ok(query) => query,
                Err(e) => {
                    log::warn(&format!("Skipping unreadable frontier entry {}: {}", entry.url, e));
                    continue;
                }
            };
            if !root.contains(&query) {
                continue;
            }
            resumed += 1;
            if let Plan::Split { children: planned, .. } = self.planner.plan(&query) {
                children.extend(planned.into_iter().map(|query| Pending {
                    query,
                    depth: entry.depth + 1,
                }));
            }
        }

        let frontier = self.unprobed(children).await?;
        if !frontier.is_empty() {
            log::info(&format!(
                "Resuming from {} split entries with {} unprobed children",
                resumed,
                frontier.len()
            ));
        }
        Ok(frontier)
    }

    /// Drop queries already stored or repeated in the list.
    async fn unprobed(&self, candidates: Vec<Pending>) -> Result<Vec<Pending>> {
        let mut seen = HashSet::new();
        let mut fresh = Vec::new();
        for pending in candidates {
            let url = pending.query.url();
            if seen.insert(url.clone()) && !self.store.contains(&url).await? {
                fresh.push(pending);
            }
        }
        Ok(fresh)
    }

    async fn probe_round(
        &self,
        pending: Vec<Pending>,
        outcome: &mut PartitionOutcome,
    ) -> Vec<(Pending, ProbeResult)> {
        let delay = Duration::from_millis(self.config.crawler.request_delay_ms);
        let concurrency = self.config.crawler.max_concurrent.min(pending.len()).max(1);
        let rotation = ProxyRotation::random(self.transport.slots());

        let mut probes = stream::iter(pending.into_iter().enumerate())
            .map(|(index, pending)| async move {
                let summary = self.probe(&pending.query, rotation.slot(index)).await;
                (pending, summary)
            })
            .buffer_unordered(concurrency);

        let mut results = Vec::new();
        while let Some((pending, summary)) = probes.next().await {
            outcome.probed += 1;
            let result = match summary {
                Ok(summary) => ProbeResult::new(pending.query.clone(), summary),
                Err(error) => {
                    outcome.failed += 1;
                    log::warn(&format!("Probe failed for {}: {}", pending.query, error));
                    ProbeResult::failed(pending.query.clone())
                }
            };
            results.push((pending, result));

            if delay.as_millis() > 0 {
                tokio::time::sleep(delay).await;
            }
        }
        results
    }

    /// One count-only request.
    async fn probe(&self, query: &Query, slot: usize) -> Result<PageSummary> {
        let url = query.url();
        let body = self.transport.fetch(&url, slot).await?.into_success(&url)?;
        self.extractor.extract_count(&body)
    }

    fn classify(
        &self,
        pending: &Pending,
        result: &ProbeResult,
        children: &mut Vec<Pending>,
    ) -> EntryStatus {
        if !result.needs_split() {
            return EntryStatus::Accepted;
        }

        match self.planner.plan(&pending.query) {
            Plan::Split {
                dimension,
                children: planned,
            } => {
                log::debug(&format!(
                    "{} overflows ({:?} results): {} children on {}",
                    pending.query,
                    result.summary.total_count,
                    planned.len(),
                    dimension
                ));
                children.extend(planned.into_iter().map(|query| Pending {
                    query,
                    depth: pending.depth + 1,
                }));
                EntryStatus::Split
            }
            Plan::Unsplittable => {
                log::warn(&format!(
                    "{} overflows ({:?} results) but cannot be split further",
                    pending.query,
                    result.summary.total_count
                ));
                EntryStatus::Unsplittable
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::HtmlExtractor;
    use crate::services::fake::{FakeService, LISTINGS, test_config};
    use crate::storage::LocalStorage;

    const BASE: &str = "https://www.redfin.com/city/17420/CA/San-Jose";

    async fn build_scheduler(
        service: Arc<FakeService>,
        config: Config,
        dir: &std::path::Path,
    ) -> (ProbeScheduler, Arc<LocalStorage>) {
        let store = Arc::new(LocalStorage::open(dir).await.unwrap());
        let extractor = Arc::new(HtmlExtractor::new(config.extract.clone()).unwrap());
        let scheduler = ProbeScheduler::new(Arc::new(config), service, extractor, store.clone());
        (scheduler, store)
    }

    #[tokio::test]
    async fn test_large_market_is_fully_partitioned() {
        let dir = tempfile::tempdir().unwrap();
        let service = Arc::new(FakeService::new());
        let (scheduler, store) = build_scheduler(service, test_config(), dir.path()).await;

        let outcome = scheduler.run(&Query::new(BASE)).await.unwrap();
        assert_eq!(outcome.truncated, 0);
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.unsplittable, 0);
        assert!(outcome.rounds <= 8);

        let entries = store.list_entries().await.unwrap();
        assert_eq!(entries.len(), outcome.probed);

        let leaves: Vec<&FrontierEntry> = entries.iter().filter(|e| e.is_fetchable()).collect();
        assert!(leaves.iter().all(|e| e.summary.total_count.unwrap() <= 7000));

        // Leaves tile the root, so their counts add back up to the total.
        let covered: u64 = leaves.iter().map(|e| e.summary.total_count.unwrap()).sum();
        let error = (covered as f64 - LISTINGS as f64).abs() / LISTINGS as f64;
        assert!(error < 0.001, "covered {covered} of {LISTINGS}");
    }

    #[tokio::test]
    async fn test_root_split_into_price_halves() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config();
        config.partition.max_rounds = 2;
        let service = Arc::new(FakeService::new());
        let (scheduler, store) = build_scheduler(service, config, dir.path()).await;

        let outcome = scheduler.run(&Query::new(BASE)).await.unwrap();
        assert_eq!(outcome.rounds, 2);
        assert_eq!(outcome.probed, 3);
        assert_eq!(outcome.split, 3);
        // Both halves split five ways but nothing past round 2 is probed.
        assert_eq!(outcome.truncated, 10);

        let entries = store.list_entries().await.unwrap();
        assert_eq!(entries[0].depth, 0);
        assert!(
            entries
                .iter()
                .any(|e| e.url.ends_with("min-price=1000,max-price=1000000,include=sold-3yr"))
        );
    }

    #[tokio::test]
    async fn test_failed_probes_are_accepted_with_unknown_size() {
        let dir = tempfile::tempdir().unwrap();
        let service = Arc::new(FakeService::new().failing_on("max-price=1000000,"));
        let mut config = test_config();
        config.partition.max_rounds = 2;
        let (scheduler, store) = build_scheduler(service, config, dir.path()).await;

        let outcome = scheduler.run(&Query::new(BASE)).await.unwrap();
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.accepted, 1);

        let accepted = store.list_accepted().await.unwrap();
        assert_eq!(accepted.len(), 1);
        assert!(accepted[0].is_unknown_size());
    }

    #[tokio::test]
    async fn test_small_market_accepted_at_root() {
        let dir = tempfile::tempdir().unwrap();
        let service = Arc::new(FakeService::with_listings(150));
        let (scheduler, store) = build_scheduler(service.clone(), test_config(), dir.path()).await;

        let outcome = scheduler.run(&Query::new(BASE)).await.unwrap();
        assert_eq!(outcome.rounds, 1);
        assert_eq!(outcome.accepted, 1);
        assert_eq!(service.requests(), 1);

        let entry = &store.list_accepted().await.unwrap()[0];
        assert_eq!(entry.summary.total_count, Some(150));
        assert_eq!(entry.summary.page_count, Some(8));
    }

    #[tokio::test]
    async fn test_resume_only_probes_missing_children() {
        let dir = tempfile::tempdir().unwrap();

        let mut limited = test_config();
        limited.partition.max_rounds = 2;
        let first = Arc::new(FakeService::new());
        let (scheduler, _) = build_scheduler(first.clone(), limited, dir.path()).await;
        let partial = scheduler.run(&Query::new(BASE)).await.unwrap();
        assert_eq!(partial.truncated, 10);
        drop(scheduler);

        let second = Arc::new(FakeService::new());
        let (scheduler, store) = build_scheduler(second.clone(), test_config(), dir.path()).await;
        let resumed = scheduler.run(&Query::new(BASE)).await.unwrap();

        assert_eq!(resumed.truncated, 0);
        assert_eq!(second.requests(), resumed.probed);
        // The root and its halves are never probed again.
        let entries = store.list_entries().await.unwrap();
        assert_eq!(entries.len(), 3 + resumed.probed);

        let urls: HashSet<&str> = entries.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls.len(), entries.len());

        // A third run has nothing left to do.
        let third = Arc::new(FakeService::new());
        let (scheduler, _) = build_scheduler(third.clone(), test_config(), dir.path()).await;
        let idle = scheduler.run(&Query::new(BASE)).await.unwrap();
        assert_eq!(idle, PartitionOutcome::default());
        assert_eq!(third.requests(), 0);
    }

    #[tokio::test]
    async fn test_year_filtered_base_is_fully_partitioned() {
        let dir = tempfile::tempdir().unwrap();
        let service = Arc::new(FakeService::new());
        let (scheduler, store) = build_scheduler(service, test_config(), dir.path()).await;

        let year = "min-year-built=1950,max-year-built=1951";
        let root = Query::from_base_url(&format!("{BASE}/filter/{year}")).unwrap();
        let outcome = scheduler.run(&root).await.unwrap();
        assert_eq!(outcome.unsplittable, 0);
        assert_eq!(outcome.truncated, 0);

        let entries = store.list_entries().await.unwrap();
        let leaves: Vec<&FrontierEntry> = entries.iter().filter(|e| e.is_fetchable()).collect();
        assert!(leaves.iter().all(|e| e.url.contains(year)));
        assert!(leaves.iter().all(|e| e.summary.total_count.unwrap() <= 7000));

        // 1/130 of the market falls in one construction year.
        let covered: u64 = leaves.iter().map(|e| e.summary.total_count.unwrap()).sum();
        assert!(covered.abs_diff(LISTINGS / 130) < 20, "covered {covered}");
    }

    #[tokio::test]
    async fn test_resume_ignores_other_markets() {
        let dir = tempfile::tempdir().unwrap();
        let mut limited = test_config();
        limited.partition.max_rounds = 1;

        let other = Query::new("https://www.redfin.com/city/1362/CA/Belmont");
        let (scheduler, _) = build_scheduler(Arc::new(FakeService::new()), limited, dir.path()).await;
        scheduler.run(&other).await.unwrap();
        scheduler.run(&Query::new(BASE)).await.unwrap();
        drop(scheduler);

        let mut config = test_config();
        config.partition.max_rounds = 2;
        let service = Arc::new(FakeService::new());
        let (scheduler, _) = build_scheduler(service.clone(), config, dir.path()).await;
        let resumed = scheduler.run(&Query::new(BASE)).await.unwrap();

        // Only the two price halves of this market.
        assert_eq!(resumed.probed, 2);
        assert!(service.urls().iter().all(|url| url.starts_with(BASE)));
    }

    #[tokio::test]
    async fn test_requests_rotate_over_every_slot() {
        let dir = tempfile::tempdir().unwrap();
        let service = Arc::new(FakeService::new().with_slots(3));
        let mut config = test_config();
        config.partition.max_rounds = 3;
        let (scheduler, _) = build_scheduler(service.clone(), config, dir.path()).await;

        scheduler.run(&Query::new(BASE)).await.unwrap();
        assert_eq!(service.slots_used(), HashSet::from([0, 1, 2]));
    }
}
