// src/models/proxy.rs

//! Egress proxy definitions.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// One egress proxy, as listed in the proxies CSV.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proxy {
    #[serde(alias = "host", alias = "ip")]
    pub ip_addr: String,
    pub port: u16,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub user: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub password: Option<String>,
}

impl Proxy {
    /// Proxy endpoint without credentials.
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", self.ip_addr, self.port)
    }

    /// Username/password pair when the proxy requires auth.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        self.user
            .as_deref()
            .map(|user| (user, self.password.as_deref().unwrap_or("")))
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.user {
            Some(user) => write!(f, "{}@{}:{}", user, self.ip_addr, self.port),
            None => write!(f, "{}:{}", self.ip_addr, self.port),
        }
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Load the proxy list from a CSV file with an `ip_addr,port[,user,password]` header.
///
/// A missing, unreadable or empty list is a configuration error.
pub fn load_proxies(path: impl AsRef<Path>) -> Result<Vec<Proxy>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(AppError::config(format!(
            "Proxy file not found: {}",
            path.display()
        )));
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    let proxies = parse_proxies(&mut reader)
        .map_err(|e| AppError::config(format!("Invalid proxy file {}: {e}", path.display())))?;

    if proxies.is_empty() {
        return Err(AppError::config(format!(
            "Proxy file {} lists no proxies",
            path.display()
        )));
    }

    log::info!("Loaded {} proxies from {}", proxies.len(), path.display());
    Ok(proxies)
}

fn parse_proxies<R: std::io::Read>(reader: &mut csv::Reader<R>) -> Result<Vec<Proxy>> {
    let mut proxies = Vec::new();
    for record in reader.deserialize() {
        proxies.push(record?);
    }
    Ok(proxies)
}
