// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
pub mod filter;
mod frontier;
mod proxy;
pub mod query;

// Re-export all public types
pub use config::{
    Config, CrawlerConfig, DimensionRules, ExtractConfig, FetchConfig, LoggingConfig,
    PartitionConfig, StorageBackend, StorageConfig,
};
pub use filter::{Dimension, FilterSet, HISTORY_MARKER, Interval};
pub use frontier::{
    EntryStatus, FrontierEntry, ListingPage, PageSummary, ProbeResult, WritePolicy,
};
pub use proxy::{Proxy, load_proxies};
pub use query::Query;
