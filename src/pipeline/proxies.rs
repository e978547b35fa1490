// src/pipeline/proxies.rs

//! Proxy health check.
//!
//! Requests one search URL a few times through every proxy and reports the
//! success rate and time taken, so dead proxies can be pruned from the list
//! before a crawl.

use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};

use crate::error::Result;
use crate::models::{Config, Proxy};
use crate::utils::http::{DirectClient, ProxyPool, Transport};
use crate::utils::log;

/// Tries per proxy when none is given.
pub const DEFAULT_TRIES: usize = 2;

/// Result of checking one egress route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyHealth {
    pub label: String,
    pub tries: usize,
    pub successes: usize,
    pub elapsed: Duration,
}

impl ProxyHealth {
    pub fn success_rate(&self) -> f64 {
        if self.tries == 0 {
            return 0.0;
        }
        self.successes as f64 / self.tries as f64
    }
}

/// Check every proxy (and optionally a direct connection) against `target`.
pub async fn run_check_proxies(
    config: &Config,
    proxies: Vec<Proxy>,
    target: &str,
    tries: usize,
    direct: bool,
) -> Result<Vec<ProxyHealth>> {
    log::header("Checking proxies");
    log::info(&format!(
        "{} proxies, {} tries each against {}",
        proxies.len(),
        tries,
        target
    ));

    let labels: Vec<String> = proxies.iter().map(ToString::to_string).collect();
    let pool = ProxyPool::new(&config.crawler, proxies)?;
    let mut results =
        check_transport(&pool, &labels, target, tries, config.crawler.max_concurrent).await;

    if direct {
        let client = DirectClient::new(&config.crawler)?;
        let labels = ["direct (no proxy)".to_string()];
        results.extend(check_transport(&client, &labels, target, tries, 1).await);
    }

    for health in &results {
        let line = format!(
            "{}: {}/{} ok ({:.0}%) in {:.2}s",
            health.label,
            health.successes,
            health.tries,
            health.success_rate() * 100.0,
            health.elapsed.as_secs_f64()
        );
        if health.successes == 0 {
            log::warn(&line);
        } else {
            log::sub_item(&line);
        }
    }

    let healthy = results.iter().filter(|h| h.successes == h.tries).count();
    log::summary(
        "Proxy check",
        &[
            ("Checked", results.len().to_string()),
            ("Fully healthy", healthy.to_string()),
            ("Dead", results.iter().filter(|h| h.successes == 0).count().to_string()),
        ],
    );

    Ok(results)
}

/// Time `tries` sequential requests through each slot of `transport`.
///
/// Slots are checked concurrently; results keep slot order.
pub async fn check_transport(
    transport: &dyn Transport,
    labels: &[String],
    target: &str,
    tries: usize,
    concurrency: usize,
) -> Vec<ProxyHealth> {
    stream::iter(labels.iter().enumerate())
        .map(|(slot, label)| async move {
            let start = Instant::now();
            let mut successes = 0;
            for _ in 0..tries {
                match transport.fetch(target, slot).await {
                    Ok(page) if (200..300).contains(&page.status) => successes += 1,
                    Ok(page) => log::debug(&format!("{} answered {}", label, page.status)),
                    Err(e) => log::debug(&format!("{} failed: {}", label, e)),
                }
            }
            ProxyHealth {
                label: label.clone(),
                tries,
                successes,
                elapsed: start.elapsed(),
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}
