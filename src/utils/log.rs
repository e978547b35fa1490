// src/utils/log.rs

//! Structured console helpers on top of the `log` facade.
//!
//! Level filtering and timestamps come from whichever logger the binary
//! installs (`env_logger` for the CLI).

/// Log a debug message
pub fn debug(message: &str) {
    log::debug!("{}", message);
}

/// Log an info message
pub fn info(message: &str) {
    log::info!("{}", message);
}

/// Log a warning message
pub fn warn(message: &str) {
    log::warn!("{}", message);
}

/// Log an error message
pub fn error(message: &str) {
    log::error!("{}", message);
}

/// Log a header
pub fn header(title: &str) {
    let border = "═".repeat(60);
    log::info!("{}", border);
    log::info!("  {}", title);
    log::info!("{}", border);
}

/// Log a step in a process
pub fn step(step_num: usize, total: usize, message: &str) {
    log::info!("[STEP {}/{}] {}", step_num, total, message);
}

/// Log a sub-item (indented)
pub fn sub_item(message: &str) {
    log::info!("    {}", message);
}

/// Log a summary section
pub fn summary(title: &str, items: &[(&str, String)]) {
    log::info!("[SUMMARY] {}", title);
    for (key, value) in items {
        log::info!("    {}: {}", key, value);
    }
}

/// Format a ratio as a percentage with one decimal.
pub fn percent(part: usize, total: usize) -> String {
    if total == 0 {
        return "n/a".to_string();
    }
    format!("{:.1}%", part as f64 * 100.0 / total as f64)
}
