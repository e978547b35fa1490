// src/models/query.rs

//! Search queries against the listing service.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::filter::{self, FilterSet, HISTORY_MARKER};

const FILTER_SEGMENT: &str = "/filter/";

/// A filtered search: base resource URL plus filter fragment.
///
/// Two queries are the same frontier entry when [`Query::url`] matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Query {
    /// Resource URL without the `/filter/` segment or trailing slash
    pub base: String,
    pub filters: FilterSet,
    /// Tokens the crawler does not partition on, kept in input order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub passthrough: Vec<String>,
    pub include_history: bool,
}

impl Query {
    /// Unfiltered query for a resource, including historical listings.
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            filters: FilterSet::default(),
            passthrough: Vec::new(),
            include_history: true,
        }
    }

    /// Parse a serialized query URL such as `https://host/city/1/X/filter/min-price=1,max-price=2`.
    pub fn parse(url: &str) -> Result<Self> {
        let (base, fragment) = match url.split_once(FILTER_SEGMENT) {
            Some((base, fragment)) => (base, fragment),
            None => (url, ""),
        };
        let parsed = filter::parse_fragment(fragment.trim_end_matches('/'))?;

        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            filters: parsed.filters,
            passthrough: parsed.passthrough,
            include_history: parsed.include_history,
        })
    }

    /// Build the root query from a user supplied base URL.
    ///
    /// The historical-include marker is always added so every query the
    /// crawler issues shares the same listing universe.
    pub fn from_base_url(raw: &str) -> Result<Self> {
        let parsed = Url::parse(raw.trim())
            .map_err(|e| AppError::config(format!("Invalid base URL '{raw}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
            return Err(AppError::config(format!(
                "Base URL '{raw}' must be an absolute http(s) URL"
            )));
        }

        let mut query = Self::parse(raw.trim()).map_err(|e| match e {
            AppError::MalformedFilter { fragment, message } => {
                AppError::config(format!("Base URL filter '{fragment}' is malformed: {message}"))
            }
            other => other,
        })?;
        query.include_history = true;
        Ok(query)
    }

    /// Same resource and passthrough tokens with different range filters.
    pub fn with_filters(&self, filters: FilterSet) -> Self {
        Self {
            base: self.base.clone(),
            filters,
            passthrough: self.passthrough.clone(),
            include_history: self.include_history,
        }
    }

    /// Whether `other` lies inside this query's search space: same resource
    /// and passthrough tokens, every range of `self` enclosing its own.
    pub fn contains(&self, other: &Query) -> bool {
        self.base == other.base
            && self.passthrough == other.passthrough
            && self.filters.encloses(&other.filters)
    }

    /// Canonical filter fragment.
    pub fn fragment(&self) -> String {
        let mut tokens = self.filters.tokens();
        tokens.extend(self.passthrough.iter().cloned());
        if self.include_history {
            tokens.push(HISTORY_MARKER.to_string());
        }
        tokens.join(",")
    }

    /// Serialized identity of this query.
    pub fn url(&self) -> String {
        let fragment = self.fragment();
        if fragment.is_empty() {
            format!("{}/", self.base)
        } else {
            format!("{}{FILTER_SEGMENT}{fragment}", self.base)
        }
    }

    /// URL of one result page, 1-based.
    pub fn page_url(&self, sort: &str, page: u32) -> String {
        page_url(&self.url(), sort, page)
    }
}

/// Append a sort token and page suffix to a serialized query URL.
pub fn page_url(query_url: &str, sort: &str, page: u32) -> String {
    if query_url.contains(FILTER_SEGMENT) {
        format!("{query_url},{sort}/page-{page}")
    } else {
        format!("{}{FILTER_SEGMENT}{sort}/page-{page}", query_url.trim_end_matches('/'))
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}
