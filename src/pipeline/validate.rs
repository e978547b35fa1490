// src/pipeline/validate.rs

use std::path::Path;

use crate::error::Result;
use crate::models::{Config, Dimension, Query, load_proxies};
use crate::services::HtmlExtractor;
use crate::utils::log;

/// Validate configuration, selectors, proxy list and base URL without
/// touching the network.
pub fn run_validate(config: &Config, proxies_path: &Path, base_url: &str) -> Result<()> {
    log::header("Validating configuration");

    let result = check(config, proxies_path, base_url);
    if let Err(e) = &result {
        log::error(&format!("Validation failed: {}", e));
    }
    result
}

fn check(config: &Config, proxies_path: &Path, base_url: &str) -> Result<()> {
    config.validate()?;
    log::info("Configuration is valid");
    log::sub_item(&format!("User agent: {}", config.crawler.user_agent));
    log::sub_item(&format!("Timeout: {}s", config.crawler.timeout_secs));
    log::sub_item(&format!("Max concurrent: {}", config.crawler.max_concurrent));
    log::sub_item(&format!("Max rounds: {}", config.partition.max_rounds));
    for dimension in Dimension::PRIORITY {
        let rules = config.partition.rules(dimension);
        log::sub_item(&format!(
            "{}: default [{}, {}], step {}/{}{}",
            dimension,
            rules.default_min,
            rules.default_max,
            rules.fine_step,
            rules.coarse_step,
            rules
                .breakpoint
                .map(|b| format!(", breakpoint {b}"))
                .unwrap_or_default()
        ));
    }

    HtmlExtractor::new(config.extract.clone())?;
    log::info("Selectors parse");

    let proxies = load_proxies(proxies_path)?;
    log::info(&format!("{} proxies in {}", proxies.len(), proxies_path.display()));

    let root = Query::from_base_url(base_url)?;
    log::info(&format!("Root query: {}", root));

    Ok(())
}
