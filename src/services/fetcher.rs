// src/services/fetcher.rs

//! Fetches result pages and stores their structured records.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::models::{Config, ListingPage, WritePolicy};
use crate::services::Extractor;
use crate::storage::FrontierStore;
use crate::utils::http::{ProxyRotation, Transport};
use crate::utils::{log, random_delay};

/// Counters for one fetch run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Distinct page URLs handed to the executor
    pub requested: usize,
    /// Already stored and left alone
    pub skipped: usize,
    pub fetched: usize,
    pub failed: usize,
    pub records: usize,
    /// Rows written to the store
    pub written: usize,
}

/// Batched page fetcher.
pub struct FetchExecutor {
    config: Arc<Config>,
    transport: Arc<dyn Transport>,
    extractor: Arc<dyn Extractor>,
    store: Arc<dyn FrontierStore>,
}

impl FetchExecutor {
    pub fn new(
        config: Arc<Config>,
        transport: Arc<dyn Transport>,
        extractor: Arc<dyn Extractor>,
        store: Arc<dyn FrontierStore>,
    ) -> Self {
        Self {
            config,
            transport,
            extractor,
            store,
        }
    }

    /// Write policy implied by `fetch.refetch`.
    pub fn policy(&self) -> WritePolicy {
        if self.config.fetch.refetch {
            WritePolicy::Overwrite
        } else {
            WritePolicy::SkipExisting
        }
    }

    /// Fetch every page in `urls`, persisting each batch as it completes.
    ///
    /// Failed pages are logged and left out of the store so a later run
    /// picks them up again.
    pub async fn fetch_pages(&self, mut urls: Vec<String>) -> Result<FetchOutcome> {
        let policy = self.policy();

        let mut seen = HashSet::new();
        urls.retain(|url| seen.insert(url.clone()));
        let mut outcome = FetchOutcome {
            requested: urls.len(),
            ..FetchOutcome::default()
        };

        if policy == WritePolicy::SkipExisting {
            let stored = self.store.fetched_urls().await?;
            urls.retain(|url| !stored.contains(url));
            outcome.skipped = outcome.requested - urls.len();
            if outcome.skipped > 0 {
                log::info(&format!("Skipping {} pages already stored", outcome.skipped));
            }
        }

        let batch_size = self.config.fetch.batch_size.max(1);
        let batches = urls.len().div_ceil(batch_size);

        for (index, batch) in urls.chunks(batch_size).enumerate() {
            if index > 0 {
                random_delay(self.config.crawler.round_delay_ms).await;
            }

            let pages = self.fetch_batch(batch, &mut outcome).await;
            outcome.written += self.store.insert_pages(&pages, policy).await?;

            if self.config.logging.show_progress {
                log::info(&format!(
                    "Batch {}/{}: {} of {} pages fetched",
                    index + 1,
                    batches,
                    pages.len(),
                    batch.len()
                ));
            }
        }

        Ok(outcome)
    }

    async fn fetch_batch(&self, batch: &[String], outcome: &mut FetchOutcome) -> Vec<ListingPage> {
        let delay = Duration::from_millis(self.config.crawler.request_delay_ms);
        let concurrency = self.config.crawler.max_concurrent.min(batch.len()).max(1);
        let rotation = ProxyRotation::random(self.transport.slots());

        let mut fetches = stream::iter(batch.iter().enumerate())
            .map(|(index, url)| async move {
                let result = self.fetch_page(url, rotation.slot(index)).await;
                (url, result)
            })
            .buffer_unordered(concurrency);

        let mut pages = Vec::new();
        while let Some((url, result)) = fetches.next().await {
            match result {
                Ok(page) => {
                    outcome.fetched += 1;
                    outcome.records += page.record_count();
                    pages.push(page);
                }
                Err(error) => {
                    outcome.failed += 1;
                    log::warn(&format!("Failed to fetch page {}: {}", url, error));
                }
            }

            if delay.as_millis() > 0 {
                tokio::time::sleep(delay).await;
            }
        }
        pages
    }

    async fn fetch_page(&self, url: &str, slot: usize) -> Result<ListingPage> {
        let body = self.transport.fetch(url, slot).await?.into_success(url)?;
        let records = self.extractor.extract_records(&body)?;
        if records.is_empty() {
            log::debug(&format!("No structured records on {}", url));
        }
        Ok(ListingPage::new(url, records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::HtmlExtractor;
    use crate::services::fake::{FakeService, test_config};
    use crate::storage::LocalStorage;

    async fn executor(
        service: Arc<FakeService>,
        config: Config,
        store: Arc<LocalStorage>,
    ) -> FetchExecutor {
        let extractor = Arc::new(HtmlExtractor::new(config.extract.clone()).unwrap());
        FetchExecutor::new(Arc::new(config), service, extractor, store)
    }

    fn page_urls(count: u32) -> Vec<String> {
        (1..=count)
            .map(|p| format!("https://example.com/city/1/filter/include=sold-3yr,sort=lo-price/page-{p}"))
            .collect()
    }

    #[tokio::test]
    async fn test_pages_are_fetched_in_batches() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalStorage::open(dir.path()).await.unwrap());
        let service = Arc::new(FakeService::new());
        let mut config = test_config();
        config.fetch.batch_size = 20;

        let executor = executor(service.clone(), config, store.clone()).await;
        let outcome = executor.fetch_pages(page_urls(45)).await.unwrap();

        assert_eq!(outcome.requested, 45);
        assert_eq!(outcome.fetched, 45);
        assert_eq!(outcome.written, 45);
        assert_eq!(outcome.records, 45 * 20);
        assert_eq!(service.requests(), 45);
        assert_eq!(store.list_pages().await.unwrap().len(), 45);
    }

    #[tokio::test]
    async fn test_stored_pages_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalStorage::open(dir.path()).await.unwrap());

        let first = Arc::new(FakeService::new());
        executor(first, test_config(), store.clone())
            .await
            .fetch_pages(page_urls(10))
            .await
            .unwrap();

        let second = Arc::new(FakeService::new());
        let outcome = executor(second.clone(), test_config(), store.clone())
            .await
            .fetch_pages(page_urls(12))
            .await
            .unwrap();

        assert_eq!(outcome.skipped, 10);
        assert_eq!(outcome.fetched, 2);
        assert_eq!(second.requests(), 2);
    }

    #[tokio::test]
    async fn test_refetch_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalStorage::open(dir.path()).await.unwrap());
        executor(Arc::new(FakeService::new()), test_config(), store.clone())
            .await
            .fetch_pages(page_urls(3))
            .await
            .unwrap();

        let mut config = test_config();
        config.fetch.refetch = true;
        let service = Arc::new(FakeService::new());
        let executor = executor(service.clone(), config, store.clone()).await;
        assert_eq!(executor.policy(), WritePolicy::Overwrite);

        let outcome = executor.fetch_pages(page_urls(3)).await.unwrap();
        assert_eq!(outcome.skipped, 0);
        assert_eq!(outcome.written, 3);
        assert_eq!(service.requests(), 3);
        assert_eq!(store.list_pages().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_pages_are_retried_next_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalStorage::open(dir.path()).await.unwrap());

        let flaky = Arc::new(
            FakeService::new()
                .failing_on("page-2")
                .unreachable_on("page-3"),
        );
        let outcome = executor(flaky, test_config(), store.clone())
            .await
            .fetch_pages(page_urls(4))
            .await
            .unwrap();
        assert_eq!(outcome.failed, 2);
        assert_eq!(outcome.written, 2);

        let healthy = Arc::new(FakeService::new());
        let outcome = executor(healthy.clone(), test_config(), store.clone())
            .await
            .fetch_pages(page_urls(4))
            .await
            .unwrap();
        assert_eq!(outcome.fetched, 2);
        let mut retried = healthy.urls();
        retried.sort();
        assert!(retried[0].ends_with("page-2"));
        assert!(retried[1].ends_with("page-3"));
    }

    #[tokio::test]
    async fn test_duplicate_urls_fetched_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(LocalStorage::open(dir.path()).await.unwrap());
        let service = Arc::new(FakeService::new());

        let mut urls = page_urls(2);
        urls.extend(page_urls(2));
        let outcome = executor(service.clone(), test_config(), store)
            .await
            .fetch_pages(urls)
            .await
            .unwrap();
        assert_eq!(outcome.requested, 2);
        assert_eq!(service.requests(), 2);
    }
}
