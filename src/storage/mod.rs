//! Storage abstractions for the crawl frontier.
//!
//! Two tables, both append-only and keyed by URL:
//!
//! ```text
//! frontier   one row per probed query (status, counts, depth)
//! listings   one row per fetched result page (raw structured records)
//! ```
//!
//! Duplicate inserts are no-ops, so a restarted run can re-issue a round
//! without corrupting state.

pub mod local;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    EntryStatus, FrontierEntry, ListingPage, StorageBackend, StorageConfig, WritePolicy,
};

// Re-export for convenience
pub use local::LocalStorage;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;

/// Trait for frontier storage backends.
///
/// Implementations serialize individual calls; there are no transactions
/// spanning several calls.
#[async_trait]
pub trait FrontierStore: Send + Sync {
    /// Insert probed entries. URLs already stored (or repeated in the batch)
    /// are skipped. Returns the number of rows written.
    async fn insert_probes(&self, entries: &[FrontierEntry]) -> Result<usize>;

    /// Whether a query URL has been probed.
    async fn contains(&self, url: &str) -> Result<bool>;

    /// All frontier entries in insertion order.
    async fn list_entries(&self) -> Result<Vec<FrontierEntry>>;

    /// Entries with the given status, in insertion order.
    async fn list_by_status(&self, status: EntryStatus) -> Result<Vec<FrontierEntry>> {
        Ok(self
            .list_entries()
            .await?
            .into_iter()
            .filter(|e| e.status == status)
            .collect())
    }

    /// Entries ready for page expansion.
    async fn list_accepted(&self) -> Result<Vec<FrontierEntry>> {
        self.list_by_status(EntryStatus::Accepted).await
    }

    /// Entries that were split; their children may still be unprobed.
    async fn list_unresolved(&self) -> Result<Vec<FrontierEntry>> {
        self.list_by_status(EntryStatus::Split).await
    }

    /// Persist fetched pages according to `policy`. Returns rows written.
    async fn insert_pages(&self, pages: &[ListingPage], policy: WritePolicy) -> Result<usize>;

    /// URLs of every stored page.
    async fn fetched_urls(&self) -> Result<HashSet<String>>;

    /// Every stored page, latest version per URL.
    async fn list_pages(&self) -> Result<Vec<ListingPage>>;
}

/// Open the configured backend.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn FrontierStore>> {
    match config.backend {
        StorageBackend::Local => Ok(Arc::new(LocalStorage::open(&config.dir).await?)),
        #[cfg(feature = "sqlite")]
        StorageBackend::Sqlite => {
            tokio::fs::create_dir_all(&config.dir).await?;
            Ok(Arc::new(SqliteStorage::connect(&config.sqlite_url()).await?))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageBackend::Sqlite => Err(crate::error::AppError::config(
            "storage.backend = \"sqlite\" requires building with the `sqlite` feature",
        )),
    }
}

/// Drop entries whose URL is in `seen` or repeated earlier in the batch.
pub(crate) fn dedup_new<'a, T, F>(items: &'a [T], seen: &HashSet<String>, key: F) -> Vec<&'a T>
where
    F: Fn(&T) -> &str,
{
    let mut batch = HashSet::new();
    items
        .iter()
        .filter(|item| {
            let url = key(item);
            !seen.contains(url) && batch.insert(url.to_string())
        })
        .collect()
}
