// src/utils/http.rs

//! HTTP client utilities and proxy rotation.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::error::{AppError, Result};
use crate::models::{CrawlerConfig, Proxy};

/// Status code and body of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

impl FetchedPage {
    /// Body of a 2xx response, or a `Status` error.
    pub fn into_success(self, url: &str) -> Result<String> {
        if (200..300).contains(&self.status) {
            Ok(self.body)
        } else {
            Err(AppError::Status {
                url: url.to_string(),
                status: self.status,
            })
        }
    }
}

/// Issues single GET requests through one of several egress slots.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Number of egress slots (proxies) available.
    fn slots(&self) -> usize;

    /// GET `url` through slot `slot % slots()`.
    async fn fetch(&self, url: &str, slot: usize) -> Result<FetchedPage>;
}

/// Create a configured asynchronous HTTP client, optionally routed through a proxy.
pub fn create_async_client(config: &CrawlerConfig, proxy: Option<&Proxy>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs));

    if let Some(proxy) = proxy {
        let mut upstream = reqwest::Proxy::all(proxy.endpoint())
            .map_err(|e| AppError::config(format!("Invalid proxy {proxy}: {e}")))?;
        if let Some((user, password)) = proxy.credentials() {
            upstream = upstream.basic_auth(user, password);
        }
        builder = builder.proxy(upstream);
    }

    Ok(builder.build()?)
}

/// One reqwest client per proxy.
pub struct ProxyPool {
    clients: Vec<(Proxy, reqwest::Client)>,
}

impl ProxyPool {
    /// Build clients for every proxy; an empty list is a configuration error.
    pub fn new(config: &CrawlerConfig, proxies: Vec<Proxy>) -> Result<Self> {
        if proxies.is_empty() {
            return Err(AppError::config("Proxy list is empty"));
        }

        let clients = proxies
            .into_iter()
            .map(|proxy| {
                let client = create_async_client(config, Some(&proxy))?;
                Ok((proxy, client))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { clients })
    }

    pub fn proxy(&self, slot: usize) -> &Proxy {
        &self.clients[slot % self.clients.len()].0
    }
}

#[async_trait]
impl Transport for ProxyPool {
    fn slots(&self) -> usize {
        self.clients.len()
    }

    async fn fetch(&self, url: &str, slot: usize) -> Result<FetchedPage> {
        let (proxy, client) = &self.clients[slot % self.clients.len()];
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::transport(url, format!("via {proxy}: {e}")))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::transport(url, format!("via {proxy}: {e}")))?;

        Ok(FetchedPage { status, body })
    }
}

/// Single client without a proxy; one slot.
pub struct DirectClient {
    client: reqwest::Client,
}

impl DirectClient {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config, None)?,
        })
    }
}

#[async_trait]
impl Transport for DirectClient {
    fn slots(&self) -> usize {
        1
    }

    async fn fetch(&self, url: &str, _slot: usize) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::transport(url, e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::transport(url, e))?;

        Ok(FetchedPage { status, body })
    }
}

/// Round-robin proxy assignment starting at a random offset.
#[derive(Debug, Clone, Copy)]
pub struct ProxyRotation {
    offset: usize,
    len: usize,
}

impl ProxyRotation {
    /// New rotation with a random starting slot.
    pub fn random(len: usize) -> Self {
        let len = len.max(1);
        let offset = rand::thread_rng().gen_range(0..len);
        Self { offset, len }
    }

    pub fn with_offset(len: usize, offset: usize) -> Self {
        let len = len.max(1);
        Self {
            offset: offset % len,
            len,
        }
    }

    /// Slot assigned to the `index`-th request of a batch.
    pub fn slot(&self, index: usize) -> usize {
        (self.offset + index) % self.len
    }
}
