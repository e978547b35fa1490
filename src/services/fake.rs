// src/services/fake.rs

//! In-memory listing service for scheduler and executor tests.
//!
//! Listings are spread uniformly over the default price, area and year
//! ranges, so the count of any query is the total times the fraction of
//! each constrained range it covers.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{Config, Dimension, DimensionRules, Query};
use crate::utils::http::{FetchedPage, Transport};

pub const LISTINGS: u64 = 3_000_000;
pub const PER_PAGE: u64 = 20;
pub const MAX_PAGES: u64 = 350;

/// Default config with every delay disabled.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.crawler.round_delay_ms = [0, 0];
    config.crawler.request_delay_ms = 0;
    config
}

pub struct FakeService {
    listings: u64,
    slots: usize,
    failing: Vec<String>,
    unreachable: Vec<String>,
    requests: AtomicUsize,
    slots_used: Mutex<HashSet<usize>>,
    urls: Mutex<Vec<String>>,
}

impl FakeService {
    pub fn new() -> Self {
        Self::with_listings(LISTINGS)
    }

    pub fn with_listings(listings: u64) -> Self {
        Self {
            listings,
            slots: 1,
            failing: Vec::new(),
            unreachable: Vec::new(),
            requests: AtomicUsize::new(0),
            slots_used: Mutex::new(HashSet::new()),
            urls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_slots(mut self, slots: usize) -> Self {
        self.slots = slots;
        self
    }

    /// Answer 503 for URLs containing `pattern`.
    pub fn failing_on(mut self, pattern: &str) -> Self {
        self.failing.push(pattern.to_string());
        self
    }

    /// Fail at the transport level for URLs containing `pattern`.
    pub fn unreachable_on(mut self, pattern: &str) -> Self {
        self.unreachable.push(pattern.to_string());
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn slots_used(&self) -> HashSet<usize> {
        self.slots_used.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    fn count(&self, query: &Query) -> u64 {
        let fraction: f64 = Dimension::PRIORITY
            .iter()
            .filter_map(|d| query.filters.get(*d).map(|iv| (*d, iv)))
            .map(|(dimension, interval)| {
                let domain = match dimension {
                    Dimension::Price => DimensionRules::price(),
                    Dimension::Area => DimensionRules::area(),
                    Dimension::Year => DimensionRules::year(),
                };
                let lo = interval.min.max(domain.default_min);
                let hi = interval.max.min(domain.default_max);
                (hi - lo).max(0) as f64 / (domain.default_max - domain.default_min) as f64
            })
            .product();
        (self.listings as f64 * fraction).round() as u64
    }

    fn records(url: &str, count: u64) -> String {
        (0..count.min(PER_PAGE))
            .map(|i| {
                format!(
                    r#"<script type="application/ld+json">{{"url": "{url}", "position": {i}}}</script>"#
                )
            })
            .collect()
    }

    fn search_page(&self, url: &str) -> Result<String> {
        let query = Query::parse(url)?;
        let count = self.count(&query);
        let records = Self::records(url, count);

        if count <= PER_PAGE {
            return Ok(format!(
                r#"<div class="homes summary">Showing {count} Homes</div>{records}"#
            ));
        }

        let pages = count.div_ceil(PER_PAGE).min(MAX_PAGES);
        Ok(format!(
            r#"<div class="homes summary">Showing {PER_PAGE} of {count} Homes</div>
               <a class="goToPage">1</a><a class="goToPage">2</a><a class="goToPage">{pages}</a>
               {records}"#
        ))
    }
}

#[async_trait]
impl Transport for FakeService {
    fn slots(&self) -> usize {
        self.slots
    }

    async fn fetch(&self, url: &str, slot: usize) -> Result<FetchedPage> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.slots_used.lock().unwrap().insert(slot % self.slots);
        self.urls.lock().unwrap().push(url.to_string());

        if self.unreachable.iter().any(|p| url.contains(p.as_str())) {
            return Err(AppError::transport(url, "connection reset"));
        }
        if self.failing.iter().any(|p| url.contains(p.as_str())) {
            return Ok(FetchedPage {
                status: 503,
                body: String::new(),
            });
        }

        let body = match url.split_once("/page-") {
            Some(_) => Self::records(url, PER_PAGE),
            None => self.search_page(url)?,
        };
        Ok(FetchedPage { status: 200, body })
    }
}
