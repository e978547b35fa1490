//! Local filesystem storage implementation.
//!
//! Both tables are JSON Lines files that are only ever appended to. The
//! frontier is loaded into memory on open; listing payloads stay on disk and
//! only their URLs are indexed.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── frontier.jsonl        # One FrontierEntry per line, first write wins
//! └── listings.jsonl        # One ListingPage per line, last write wins
//! ```

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::{FrontierEntry, ListingPage, WritePolicy};
use crate::storage::{FrontierStore, dedup_new};

const FRONTIER_FILE: &str = "frontier.jsonl";
const LISTINGS_FILE: &str = "listings.jsonl";

#[derive(Default)]
struct LocalState {
    entries: Vec<FrontierEntry>,
    seen: HashSet<String>,
    fetched: HashSet<String>,
}

/// Local filesystem storage backend.
pub struct LocalStorage {
    root_dir: PathBuf,
    state: Mutex<LocalState>,
}

impl LocalStorage {
    /// Open (or create) a store rooted at the given directory.
    pub async fn open(root_dir: impl Into<PathBuf>) -> Result<Self> {
        let root_dir = root_dir.into();
        tokio::fs::create_dir_all(&root_dir).await?;

        let mut state = LocalState::default();
        for entry in read_lines::<FrontierEntry>(&root_dir.join(FRONTIER_FILE)).await? {
            if state.seen.insert(entry.url.clone()) {
                state.entries.push(entry);
            }
        }
        for page in read_lines::<ListingPage>(&root_dir.join(LISTINGS_FILE)).await? {
            state.fetched.insert(page.url);
        }

        log::debug!(
            "Opened local store at {} ({} entries, {} pages)",
            root_dir.display(),
            state.entries.len(),
            state.fetched.len()
        );

        Ok(Self {
            root_dir,
            state: Mutex::new(state),
        })
    }

    /// Get the full path for a file name.
    fn path(&self, name: &str) -> PathBuf {
        self.root_dir.join(name)
    }

    /// Append one JSON document per line.
    async fn append_lines<T: Serialize>(&self, name: &str, values: &[&T]) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }

        let mut buffer = Vec::new();
        for value in values {
            serde_json::to_writer(&mut buffer, value)?;
            buffer.push(b'\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(name))
            .await?;
        file.write_all(&buffer).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Read a JSON Lines file, returning nothing if it doesn't exist.
///
/// A torn final line (crash mid-append) is skipped with a warning.
async fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(AppError::Io(e)),
    };

    let mut values = Vec::new();
    for (number, line) in bytes.split(|b| *b == b'\n').enumerate() {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        match serde_json::from_slice(line) {
            Ok(value) => values.push(value),
            Err(e) => log::warn!(
                "Skipping unreadable line {} in {}: {}",
                number + 1,
                path.display(),
                e
            ),
        }
    }
    Ok(values)
}

#[async_trait]
impl FrontierStore for LocalStorage {
    async fn insert_probes(&self, entries: &[FrontierEntry]) -> Result<usize> {
        let mut state = self.state.lock().await;
        let fresh = dedup_new(entries, &state.seen, |e| e.url.as_str());
        self.append_lines(FRONTIER_FILE, &fresh).await?;

        for entry in &fresh {
            state.seen.insert(entry.url.clone());
            state.entries.push((*entry).clone());
        }
        Ok(fresh.len())
    }

    async fn contains(&self, url: &str) -> Result<bool> {
        Ok(self.state.lock().await.seen.contains(url))
    }

    async fn list_entries(&self) -> Result<Vec<FrontierEntry>> {
        Ok(self.state.lock().await.entries.clone())
    }

    async fn insert_pages(&self, pages: &[ListingPage], policy: WritePolicy) -> Result<usize> {
        let mut state = self.state.lock().await;
        let written: Vec<&ListingPage> = match policy {
            WritePolicy::SkipExisting => dedup_new(pages, &state.fetched, |p| p.url.as_str()),
            WritePolicy::Overwrite => pages.iter().collect(),
        };
        self.append_lines(LISTINGS_FILE, &written).await?;

        for page in &written {
            state.fetched.insert(page.url.clone());
        }
        Ok(written.len())
    }

    async fn fetched_urls(&self) -> Result<HashSet<String>> {
        Ok(self.state.lock().await.fetched.clone())
    }

    async fn list_pages(&self) -> Result<Vec<ListingPage>> {
        // Hold the lock so no append interleaves with the read.
        let _state = self.state.lock().await;
        let pages = read_lines::<ListingPage>(&self.path(LISTINGS_FILE)).await?;

        let mut order = Vec::new();
        let mut latest: HashMap<String, ListingPage> = HashMap::new();
        for page in pages {
            if !latest.contains_key(&page.url) {
                order.push(page.url.clone());
            }
            latest.insert(page.url.clone(), page);
        }
        Ok(order
            .into_iter()
            .filter_map(|url| latest.remove(&url))
            .collect())
    }
}
