//! SQLite storage implementation (feature `sqlite`).
//!
//! Same two tables as the local store. Probe rows use `INSERT OR IGNORE`;
//! page rows use `INSERT OR IGNORE` or `INSERT OR REPLACE` per write policy.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

use crate::error::Result;
use crate::models::{EntryStatus, FrontierEntry, ListingPage, PageSummary, WritePolicy};
use crate::storage::FrontierStore;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS frontier (
        seq             INTEGER PRIMARY KEY AUTOINCREMENT,
        url             TEXT    NOT NULL UNIQUE,
        total_count     INTEGER,
        page_count      INTEGER,
        per_page_count  INTEGER,
        status          TEXT    NOT NULL,
        depth           INTEGER NOT NULL,
        probed_at       TEXT    NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS listings (
        url         TEXT PRIMARY KEY,
        payload     TEXT NOT NULL,
        fetched_at  TEXT NOT NULL
    )
    "#,
];

/// SQLite-backed frontier store.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Connect and create the tables if needed.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;
        let storage = Self { pool };
        storage.create_tables().await?;
        log::debug!("Opened SQLite store at {}", database_url);
        Ok(storage)
    }

    async fn create_tables(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    fn entry_from_row(row: &SqliteRow) -> Result<FrontierEntry> {
        let status: String = row.try_get("status")?;
        let total: Option<i64> = row.try_get("total_count")?;
        let pages: Option<i64> = row.try_get("page_count")?;
        let per_page: Option<i64> = row.try_get("per_page_count")?;
        let depth: i64 = row.try_get("depth")?;

        Ok(FrontierEntry {
            url: row.try_get("url")?,
            summary: PageSummary {
                total_count: total.and_then(|n| u64::try_from(n).ok()),
                page_count: pages.and_then(|n| u32::try_from(n).ok()),
                per_page_count: per_page.and_then(|n| u32::try_from(n).ok()),
            },
            status: status.parse::<EntryStatus>()?,
            depth: usize::try_from(depth).unwrap_or_default(),
            probed_at: row.try_get::<DateTime<Utc>, _>("probed_at")?,
        })
    }
}

#[async_trait]
impl FrontierStore for SqliteStorage {
    async fn insert_probes(&self, entries: &[FrontierEntry]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for entry in entries {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO frontier
                    (url, total_count, page_count, per_page_count, status, depth, probed_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&entry.url)
            .bind(entry.summary.total_count.and_then(|n| i64::try_from(n).ok()))
            .bind(entry.summary.page_count.map(i64::from))
            .bind(entry.summary.per_page_count.map(i64::from))
            .bind(entry.status.as_str())
            .bind(i64::try_from(entry.depth).unwrap_or(i64::MAX))
            .bind(entry.probed_at)
            .execute(&mut *tx)
            .await?;
            written += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn contains(&self, url: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM frontier WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn list_entries(&self) -> Result<Vec<FrontierEntry>> {
        let rows = sqlx::query("SELECT * FROM frontier ORDER BY seq")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::entry_from_row).collect()
    }

    async fn list_by_status(&self, status: EntryStatus) -> Result<Vec<FrontierEntry>> {
        let rows = sqlx::query("SELECT * FROM frontier WHERE status = ? ORDER BY seq")
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::entry_from_row).collect()
    }

    async fn insert_pages(&self, pages: &[ListingPage], policy: WritePolicy) -> Result<usize> {
        let statement = match policy {
            WritePolicy::SkipExisting => {
                "INSERT OR IGNORE INTO listings (url, payload, fetched_at) VALUES (?, ?, ?)"
            }
            WritePolicy::Overwrite => {
                "INSERT OR REPLACE INTO listings (url, payload, fetched_at) VALUES (?, ?, ?)"
            }
        };

        let mut tx = self.pool.begin().await?;
        let mut written = 0;
        for page in pages {
            let result = sqlx::query(statement)
                .bind(&page.url)
                .bind(serde_json::to_string(&page.payload)?)
                .bind(page.fetched_at)
                .execute(&mut *tx)
                .await?;
            written += result.rows_affected().min(1) as usize;
        }
        tx.commit().await?;
        Ok(written)
    }

    async fn fetched_urls(&self) -> Result<HashSet<String>> {
        let rows = sqlx::query("SELECT url FROM listings")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| Ok(row.try_get::<String, _>("url")?))
            .collect()
    }

    async fn list_pages(&self) -> Result<Vec<ListingPage>> {
        let rows = sqlx::query("SELECT url, payload, fetched_at FROM listings ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                let payload: String = row.try_get("payload")?;
                Ok(ListingPage {
                    url: row.try_get("url")?,
                    payload: serde_json::from_str(&payload)?,
                    fetched_at: row.try_get("fetched_at")?,
                })
            })
            .collect()
    }
}
