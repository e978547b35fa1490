//! Utility functions and helpers.

pub mod http;
pub mod log;

use std::time::Duration;

use rand::Rng;

/// Sleep for a random duration within `[min, max]` milliseconds.
///
/// Used between probe rounds and fetch batches to throttle the request rate.
pub async fn random_delay(range_ms: [u64; 2]) {
    let [low, high] = range_ms;
    if high == 0 {
        return;
    }
    let millis = rand::thread_rng().gen_range(low.min(high)..=high);
    log::debug(&format!("Pausing {} ms before next round", millis));
    tokio::time::sleep(Duration::from_millis(millis)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_zero_delay_returns_immediately() {
        let start = std::time::Instant::now();
        random_delay([0, 0]).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_delay_within_bounds() {
        let start = std::time::Instant::now();
        random_delay([5, 10]).await;
        assert!(start.elapsed() >= Duration::from_millis(5));
    }
}
