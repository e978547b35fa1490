//! Pipeline entry points for crawler operations.
//!
//! - `run_pages`: Partition a market into page-sized queries
//! - `run_properties`: Fetch the pages of every leaf query
//! - `run_report`: Summarize frontier coverage
//! - `run_check_proxies`: Time each proxy against a search URL
//! - `run_validate`: Check configuration and inputs without network access

pub mod pages;
pub mod properties;
pub mod proxies;
pub mod report;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{Config, load_proxies};
use crate::services::{Extractor, HtmlExtractor};
use crate::storage::{FrontierStore, open_store};
use crate::utils::http::{ProxyPool, Transport};

pub use pages::run_pages;
pub use properties::run_properties;
pub use proxies::{ProxyHealth, run_check_proxies};
pub use report::{CoverageReport, run_report};
pub use validate::run_validate;

/// Shared components of a crawl run.
#[derive(Clone)]
pub struct CrawlContext {
    pub config: Arc<Config>,
    pub transport: Arc<dyn Transport>,
    pub extractor: Arc<dyn Extractor>,
    pub store: Arc<dyn FrontierStore>,
}

impl CrawlContext {
    /// Build every component from configuration.
    ///
    /// The proxy list and selectors are checked before anything touches
    /// the network.
    pub async fn build(config: Arc<Config>, proxies_path: &Path) -> Result<Self> {
        config.validate()?;
        let proxies = load_proxies(proxies_path)?;
        let transport = Arc::new(ProxyPool::new(&config.crawler, proxies)?);
        let extractor = Arc::new(HtmlExtractor::new(config.extract.clone())?);
        let store = open_store(&config.storage).await?;

        Ok(Self {
            config,
            transport,
            extractor,
            store,
        })
    }
}
