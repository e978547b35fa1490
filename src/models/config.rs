//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Dimension;

/// Root application configuration.
///
/// Loaded once at startup and shared read-only (`Arc<Config>`) by every
/// component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and pacing behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Query partitioning rules
    #[serde(default)]
    pub partition: PartitionConfig,

    /// Selectors used to read listing pages
    #[serde(default)]
    pub extract: ExtractConfig,

    /// Listing page retrieval settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Frontier store location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        let [low, high] = self.crawler.round_delay_ms;
        if low > high {
            return Err(AppError::validation(
                "crawler.round_delay_ms must be [min, max] with min <= max",
            ));
        }
        if self.partition.max_rounds == 0 {
            return Err(AppError::validation("partition.max_rounds must be > 0"));
        }
        for dimension in Dimension::PRIORITY {
            self.partition
                .rules(dimension)
                .validate()
                .map_err(|e| AppError::validation(format!("partition.{dimension}: {e}")))?;
        }
        if self.fetch.batch_size == 0 {
            return Err(AppError::validation("fetch.batch_size must be > 0"));
        }
        Ok(())
    }
}

/// HTTP client and pacing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent requests
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Delay after each completed page fetch in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,

    /// Randomized pause between rounds, `[min, max]` in milliseconds
    #[serde(default = "defaults::round_delay")]
    pub round_delay_ms: [u64; 2],
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
            request_delay_ms: defaults::request_delay(),
            round_delay_ms: defaults::round_delay(),
        }
    }
}

/// Splitting rules for a single filter dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionRules {
    /// Value where the service switches to coarser bucketing
    #[serde(default)]
    pub breakpoint: Option<i64>,

    /// Granularity floor below the breakpoint
    pub fine_step: i64,

    /// Granularity floor at or above the breakpoint
    pub coarse_step: i64,

    /// Lower bound imposed when the dimension is first constrained
    pub default_min: i64,

    /// Upper bound imposed when the dimension is first constrained
    pub default_max: i64,
}

impl DimensionRules {
    pub fn price() -> Self {
        Self {
            breakpoint: Some(1_000_000),
            fine_step: 1_000,
            coarse_step: 10_000,
            default_min: 1_000,
            default_max: 2_000_000,
        }
    }

    pub fn area() -> Self {
        Self {
            breakpoint: Some(1_000),
            fine_step: 1,
            coarse_step: 10,
            default_min: 10,
            default_max: 12_000,
        }
    }

    pub fn year() -> Self {
        Self {
            breakpoint: None,
            fine_step: 1,
            coarse_step: 1,
            default_min: 1900,
            default_max: 2030,
        }
    }

    /// Granularity floor for an interval starting at `min`.
    pub fn step_for(&self, min: i64) -> i64 {
        match self.breakpoint {
            Some(breakpoint) if min >= breakpoint => self.coarse_step,
            _ => self.fine_step,
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.fine_step <= 0 || self.coarse_step <= 0 {
            return Err("steps must be > 0".into());
        }
        if self.default_min >= self.default_max {
            return Err("default_min must be < default_max".into());
        }
        Ok(())
    }
}

/// Query partitioning settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Hard limit on probe rounds (recursion depth)
    #[serde(default = "defaults::max_rounds")]
    pub max_rounds: usize,

    /// Sort token appended before the page suffix of paginated URLs
    #[serde(default = "defaults::page_sort")]
    pub page_sort: String,

    #[serde(default = "DimensionRules::price")]
    pub price: DimensionRules,

    #[serde(default = "DimensionRules::area")]
    pub area: DimensionRules,

    #[serde(default = "DimensionRules::year")]
    pub year: DimensionRules,
}

impl PartitionConfig {
    /// Rules for a dimension.
    pub fn rules(&self, dimension: Dimension) -> &DimensionRules {
        match dimension {
            Dimension::Price => &self.price,
            Dimension::Area => &self.area,
            Dimension::Year => &self.year,
        }
    }
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            max_rounds: defaults::max_rounds(),
            page_sort: defaults::page_sort(),
            price: DimensionRules::price(),
            area: DimensionRules::area(),
            year: DimensionRules::year(),
        }
    }
}

/// CSS selectors for reading listing pages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Element holding the "Showing N of T homes" summary
    #[serde(default = "defaults::summary_selector")]
    pub summary_selector: String,

    /// Pagination links whose text is a page number
    #[serde(default = "defaults::pager_selector")]
    pub pager_selector: String,

    /// Embedded structured-data blocks holding listing records
    #[serde(default = "defaults::records_selector")]
    pub records_selector: String,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            summary_selector: defaults::summary_selector(),
            pager_selector: defaults::pager_selector(),
            records_selector: defaults::records_selector(),
        }
    }
}

/// Listing page retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Pages fetched (and persisted) per batch
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,

    /// Refetch and overwrite pages that are already stored
    #[serde(default)]
    pub refetch: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::batch_size(),
            refetch: false,
        }
    }
}

/// Which frontier store implementation to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    Sqlite,
}

/// Frontier store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory for the local store (and the default SQLite file)
    #[serde(default = "defaults::storage_dir")]
    pub dir: PathBuf,

    /// Explicit SQLite connection string, e.g. `sqlite://crawl.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

impl StorageConfig {
    /// Connection string for the SQLite backend.
    pub fn sqlite_url(&self) -> String {
        self.database_url.clone().unwrap_or_else(|| {
            format!("sqlite://{}?mode=rwc", self.dir.join("frontier.db").display())
        })
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            dir: defaults::storage_dir(),
            database_url: None,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is not set
    #[serde(default = "defaults::log_level")]
    pub level: String,

    /// Log per-round progress lines
    #[serde(default = "defaults::show_progress")]
    pub show_progress: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
            show_progress: defaults::show_progress(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 6.3; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/49.0.2623.112 Safari/537.36".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_concurrent() -> usize {
        50
    }
    pub fn request_delay() -> u64 {
        0
    }
    pub fn round_delay() -> [u64; 2] {
        [2_000, 5_000]
    }

    // Partition defaults
    pub fn max_rounds() -> usize {
        8
    }
    pub fn page_sort() -> String {
        "sort=lo-price".into()
    }

    // Extraction defaults
    pub fn summary_selector() -> String {
        "div.homes.summary".into()
    }
    pub fn pager_selector() -> String {
        "a.goToPage".into()
    }
    pub fn records_selector() -> String {
        r#"script[type="application/ld+json"]"#.into()
    }

    // Fetch defaults
    pub fn batch_size() -> usize {
        1_000
    }

    // Storage defaults
    pub fn storage_dir() -> PathBuf {
        PathBuf::from("storage")
    }

    // Logging defaults
    pub fn log_level() -> String {
        "info".into()
    }
    pub fn show_progress() -> bool {
        true
    }
}
