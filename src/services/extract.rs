// src/services/extract.rs

//! Reads result counts and structured listing records out of search pages.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{ExtractConfig, PageSummary};

static SHOWING_OF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)showing\s+([\d,]+)\s+of\s+([\d,]+)").expect("valid regex")
});
static SHOWING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)showing\s+([\d,]+)").expect("valid regex"));

/// Pure extraction functions over page markup.
pub trait Extractor: Send + Sync {
    /// Result-count metadata of a search page.
    fn extract_count(&self, body: &str) -> Result<PageSummary>;

    /// Raw structured records embedded in a search page.
    fn extract_records(&self, body: &str) -> Result<Vec<serde_json::Value>>;
}

/// Selector-driven extractor for the listing service's HTML.
#[derive(Debug, Clone)]
pub struct HtmlExtractor {
    config: ExtractConfig,
}

impl HtmlExtractor {
    /// Create an extractor, validating every configured selector up front.
    pub fn new(config: ExtractConfig) -> Result<Self> {
        Self::parse_selector(&config.summary_selector)?;
        Self::parse_selector(&config.pager_selector)?;
        Self::parse_selector(&config.records_selector)?;
        Ok(Self { config })
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }

    fn parse_count(raw: &str) -> Option<u64> {
        raw.replace(',', "").parse().ok()
    }
}

impl Extractor for HtmlExtractor {
    fn extract_count(&self, body: &str) -> Result<PageSummary> {
        let document = Html::parse_document(body);
        let summary_sel = Self::parse_selector(&self.config.summary_selector)?;
        let pager_sel = Self::parse_selector(&self.config.pager_selector)?;

        let summary = document
            .select(&summary_sel)
            .next()
            .ok_or_else(|| AppError::extract("result summary not found"))?;
        let text = summary.text().collect::<Vec<_>>().join(" ");

        if let Some(caps) = SHOWING_OF.captures(&text) {
            let per_page = Self::parse_count(&caps[1]);
            let total = Self::parse_count(&caps[2]);
            let pages = document
                .select(&pager_sel)
                .filter_map(|a| a.text().collect::<String>().trim().parse::<u32>().ok())
                .max()
                .unwrap_or(1);

            return Ok(PageSummary {
                total_count: total,
                page_count: Some(pages),
                per_page_count: per_page.and_then(|n| u32::try_from(n).ok()),
            });
        }

        if let Some(caps) = SHOWING.captures(&text) {
            // Everything fits on one page.
            let shown = Self::parse_count(&caps[1]);
            return Ok(PageSummary {
                total_count: shown,
                page_count: Some(1),
                per_page_count: shown.and_then(|n| u32::try_from(n).ok()),
            });
        }

        Err(AppError::extract(format!(
            "unparseable result summary '{}'",
            text.trim()
        )))
    }

    fn extract_records(&self, body: &str) -> Result<Vec<serde_json::Value>> {
        let document = Html::parse_document(body);
        let records_sel = Self::parse_selector(&self.config.records_selector)?;

        let mut records = Vec::new();
        for block in document.select(&records_sel) {
            let raw: String = block.text().collect();
            match serde_json::from_str(raw.trim()) {
                Ok(value) => records.push(value),
                Err(e) => log::debug!("Skipping malformed structured-data block: {}", e),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> HtmlExtractor {
        HtmlExtractor::new(ExtractConfig::default()).unwrap()
    }

    #[test]
    fn test_count_with_pagination() {
        let html = r#"
            <div class="homes summary">Showing 20 of 3,214 Homes</div>
            <a class="goToPage">1</a><a class="goToPage">2</a><a class="goToPage">17</a>
        "#;
        let summary = extractor().extract_count(html).unwrap();
        assert_eq!(summary.total_count, Some(3214));
        assert_eq!(summary.page_count, Some(17));
        assert_eq!(summary.per_page_count, Some(20));
        assert!(summary.overflows());
    }

    #[test]
    fn test_count_single_page() {
        let html = r#"<div class="homes summary">Showing 7 Homes</div>"#;
        let summary = extractor().extract_count(html).unwrap();
        assert_eq!(summary.total_count, Some(7));
        assert_eq!(summary.page_count, Some(1));
        assert!(!summary.overflows());
    }

    #[test]
    fn test_count_missing_or_garbled_summary() {
        assert!(extractor().extract_count("<html><body>blocked</body></html>").is_err());
        assert!(
            extractor()
                .extract_count(r#"<div class="homes summary">No results</div>"#)
                .is_err()
        );
    }

    #[test]
    fn test_records_skip_malformed_blocks() {
        let html = r#"
            <script type="application/ld+json">{"@type": "SingleFamilyResidence", "name": "1 Main St"}</script>
            <script type="application/ld+json">{not json</script>
            <script type="application/ld+json">[{"offers": {"price": 1200000}}]</script>
            <script>var x = 1;</script>
        "#;
        let records = extractor().extract_records(html).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["name"], "1 Main St");
        assert_eq!(records[1][0]["offers"]["price"], 1_200_000);
    }

    #[test]
    fn test_invalid_selector_rejected() {
        let config = ExtractConfig {
            summary_selector: "[[invalid".into(),
            ..ExtractConfig::default()
        };
        assert!(HtmlExtractor::new(config).is_err());
    }
}
