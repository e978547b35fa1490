// src/models/frontier.rs

//! Probe results, frontier entries and fetched listing pages.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Query;
use crate::models::query::page_url;

/// Result-count metadata read from a search page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub total_count: Option<u64>,
    pub page_count: Option<u32>,
    pub per_page_count: Option<u32>,
}

impl PageSummary {
    /// Listings reachable by paging through this query.
    pub fn capacity(&self) -> Option<u64> {
        Some(u64::from(self.page_count?) * u64::from(self.per_page_count?))
    }

    /// Whether the result set is larger than the enumerable window.
    ///
    /// Missing metadata never asks for a split.
    pub fn overflows(&self) -> bool {
        match (self.total_count, self.capacity()) {
            (Some(total), Some(capacity)) => total > capacity,
            _ => false,
        }
    }
}

/// Outcome of probing one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub query: Query,
    pub summary: PageSummary,
}

impl ProbeResult {
    pub fn new(query: Query, summary: PageSummary) -> Self {
        Self { query, summary }
    }

    /// A probe whose request or parse failed; accepted with unknown size.
    pub fn failed(query: Query) -> Self {
        Self::new(query, PageSummary::default())
    }

    pub fn needs_split(&self) -> bool {
        self.summary.overflows()
    }
}

/// Final state of a probed query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Fits the page window (or its size is unknown)
    Accepted,
    /// Overflowed; children were planned
    Split,
    /// Overflowed but every dimension is at minimum granularity
    Unsplittable,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Accepted => "accepted",
            EntryStatus::Split => "split",
            EntryStatus::Unsplittable => "unsplittable",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "accepted" => Ok(EntryStatus::Accepted),
            "split" => Ok(EntryStatus::Split),
            "unsplittable" => Ok(EntryStatus::Unsplittable),
            other => Err(AppError::validation(format!("unknown entry status '{other}'"))),
        }
    }
}

/// A persisted frontier row, keyed by `url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierEntry {
    pub url: String,
    #[serde(flatten)]
    pub summary: PageSummary,
    pub status: EntryStatus,
    /// Round in which the query was probed (root = 0)
    pub depth: usize,
    pub probed_at: DateTime<Utc>,
}

impl FrontierEntry {
    pub fn new(result: &ProbeResult, status: EntryStatus, depth: usize) -> Self {
        Self {
            url: result.query.url(),
            summary: result.summary,
            status,
            depth,
            probed_at: Utc::now(),
        }
    }

    pub fn query(&self) -> Result<Query> {
        Query::parse(&self.url)
    }

    /// Whether this entry belongs to the frontier rooted at `root`.
    pub fn is_within(&self, root: &Query) -> bool {
        self.query().is_ok_and(|query| root.contains(&query))
    }

    /// Whether the probe produced no usable count.
    pub fn is_unknown_size(&self) -> bool {
        self.summary.total_count.is_none()
    }

    /// Whether this entry's pages should be fetched.
    pub fn is_fetchable(&self) -> bool {
        matches!(self.status, EntryStatus::Accepted | EntryStatus::Unsplittable)
    }

    /// Page URLs covering this query's results.
    ///
    /// Multi-page results expand to `…,{sort}/page-N`; everything else is
    /// fetched through the query URL itself.
    pub fn page_urls(&self, sort: &str) -> Vec<String> {
        let PageSummary {
            total_count,
            page_count,
            per_page_count,
        } = self.summary;

        match (total_count, page_count, per_page_count) {
            (Some(total), Some(pages), Some(per_page))
                if pages > 1 && total > u64::from(per_page) =>
            {
                (1..=pages).map(|p| page_url(&self.url, sort, p)).collect()
            }
            _ => vec![self.url.clone()],
        }
    }
}

/// Raw records extracted from one fetched page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingPage {
    pub url: String,
    pub payload: serde_json::Value,
    pub fetched_at: DateTime<Utc>,
}

impl ListingPage {
    pub fn new(url: impl Into<String>, records: Vec<serde_json::Value>) -> Self {
        Self {
            url: url.into(),
            payload: serde_json::Value::Array(records),
            fetched_at: Utc::now(),
        }
    }

    pub fn record_count(&self) -> usize {
        self.payload.as_array().map_or(0, Vec::len)
    }
}

/// What to do when a page URL is already stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WritePolicy {
    /// Keep the stored page; the new one is dropped
    #[default]
    SkipExisting,
    /// Replace the stored page
    Overwrite,
}
