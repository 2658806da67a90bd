//! Shodan host discovery.
//!
//! The discovery collaborator feeds [`HostAddress`] values to the scan
//! orchestrator in two shapes: closed page batches from the search API
//! (`/shodan/host/search`) and an open feed from the newline-delimited
//! JSON banner stream. Discovery failures are the run's fatal error
//! class - without hosts there is no useful work - which is why
//! [`DiscoveryError`] propagates instead of being logged-and-skipped the
//! way per-host capture failures are.
//!
//! The API key comes from `SHODAN_API_KEY`, matching the usual Shodan
//! client convention.

use futures::StreamExt;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use vncsnap_capture::HostAddress;

const API_BASE: &str = "https://api.shodan.io";
const STREAM_BASE: &str = "https://stream.shodan.io";

/// Fatal discovery failures. Any of these aborts the whole run.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("SHODAN_API_KEY is not set")]
    MissingApiKey,

    #[error("discovery request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("discovery API returned {status}: {body}")]
    Api {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// One search result: the fields of a Shodan banner this scanner uses.
#[derive(Debug, Clone, Deserialize)]
pub struct Banner {
    pub ip_str: String,
    pub port: u16,
}

/// One page of search results.
#[derive(Debug, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub matches: Vec<Banner>,
    #[serde(default)]
    pub total: u64,
}

impl Page {
    /// Map this page's matches onto capture targets.
    ///
    /// The scan photographs one fixed service port, so the configured
    /// `target_port` wins over whatever port the banner was indexed on.
    pub fn hosts(&self, target_port: u16) -> Vec<HostAddress> {
        self.matches
            .iter()
            .map(|b| HostAddress::new(b.ip_str.clone(), target_port))
            .collect()
    }
}

/// Client for the Shodan search and streaming APIs.
pub struct ShodanClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    stream_base: String,
}

impl ShodanClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            api_base: API_BASE.to_string(),
            stream_base: STREAM_BASE.to_string(),
        }
    }

    /// Build a client from `SHODAN_API_KEY`.
    pub fn from_env() -> Result<Self, DiscoveryError> {
        match std::env::var("SHODAN_API_KEY") {
            Ok(key) if !key.is_empty() => Ok(Self::new(key)),
            _ => Err(DiscoveryError::MissingApiKey),
        }
    }

    /// Override the endpoint bases. Tests point this at a local server.
    pub fn with_base_urls(
        mut self,
        api_base: impl Into<String>,
        stream_base: impl Into<String>,
    ) -> Self {
        self.api_base = api_base.into();
        self.stream_base = stream_base.into();
        self
    }

    /// Fetch one page of search results. Shodan pages are 1-based.
    pub async fn search(&self, query: &str, page: u32) -> Result<Page, DiscoveryError> {
        let url = format!("{}/shodan/host/search", self.api_base);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("query", query),
                ("page", &page.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::Api { status, body });
        }

        let parsed: Page = response.json().await?;
        debug!(
            page,
            total = parsed.total,
            matches = parsed.matches.len(),
            "search page fetched"
        );
        Ok(parsed)
    }

    /// Subscribe to the banner firehose as an open feed of capture
    /// targets.
    ///
    /// The returned channel yields a [`HostAddress`] per banner (on the
    /// configured `target_port`) and closes when the feed ends - either
    /// the server hangs up or the stream errors. Malformed lines and
    /// keep-alives are skipped, not fatal; only the initial subscription
    /// failure is.
    pub async fn stream_banners(
        &self,
        target_port: u16,
    ) -> Result<mpsc::Receiver<HostAddress>, DiscoveryError> {
        let url = format!("{}/shodan/banners", self.stream_base);
        let response = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::Api { status, body });
        }

        let (tx, rx) = mpsc::channel(64);
        tokio::spawn(async move {
            let mut body = response.bytes_stream();
            let mut pending = Vec::new();

            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        warn!(error = %e, "banner stream broke, closing feed");
                        break;
                    }
                };
                pending.extend_from_slice(&chunk);

                while let Some(newline) = pending.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=newline).collect();
                    let Some(host) = parse_banner_line(&line, target_port) else {
                        continue;
                    };
                    if tx.send(host).await.is_err() {
                        return; // receiver dropped, stop the feed
                    }
                }
            }
        });

        Ok(rx)
    }
}

/// Parse one feed line into a capture target. Empty keep-alive lines and
/// junk parse to `None`.
fn parse_banner_line(line: &[u8], target_port: u16) -> Option<HostAddress> {
    let trimmed = std::str::from_utf8(line).ok()?.trim();
    if trimmed.is_empty() {
        return None;
    }
    match serde_json::from_str::<Banner>(trimmed) {
        Ok(banner) => Some(HostAddress::new(banner.ip_str, target_port)),
        Err(e) => {
            warn!(error = %e, "skipping malformed banner line");
            None
        }
    }
}
