// src/http.rs
//! Minimal page transport used by every fetcher.
//!
//! Fetchers only ever need "GET this URL, give me status + body". Keeping that
//! behind [`Transport`] lets tests serve fixtures instead of the network.

use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::IngestError;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0";
pub const DEFAULT_TIMEOUT_SECS: u64 = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub status: u16,
    pub body: String,
}

impl Page {
    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url`. HTTP error statuses are returned as a `Page`, not an error;
    /// only network/timeout failures are `Err`.
    async fn get(&self, url: &str) -> Result<Page, IngestError>;

    /// GET `url` and treat status >= 400 as a fetch error.
    async fn get_ok(&self, url: &str) -> Result<String, IngestError> {
        let page = self.get(url).await?;
        if page.is_error() {
            return Err(IngestError::fetch(url, format!("HTTP {}", page.status)));
        }
        Ok(page.body)
    }
}

/// `reqwest`-backed transport with a fixed per-request deadline.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str, timeout_secs: u64) -> Result<Self, IngestError> {
        let timeout = Duration::from_secs(timeout_secs.max(1));
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::fetch("<client>", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Page, IngestError> {
        let rsp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| IngestError::fetch(url, e))?;
        let status = rsp.status().as_u16();
        let body = rsp.text().await.map_err(|e| IngestError::fetch(url, e))?;
        Ok(Page { status, body })
    }
}

/// In-memory transport serving canned pages by exact URL. Unknown URLs behave
/// like a connection failure.
#[derive(Debug, Default, Clone)]
pub struct FixtureTransport {
    pages: HashMap<String, Page>,
}

impl FixtureTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, status: u16, body: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            Page {
                status,
                body: body.to_string(),
            },
        );
        self
    }
}

#[async_trait]
impl Transport for FixtureTransport {
    async fn get(&self, url: &str) -> Result<Page, IngestError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| IngestError::fetch(url, "connection refused"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixture_transport_serves_and_fails() {
        let t = FixtureTransport::new()
            .with_page("https://a.test/", 200, "ok")
            .with_page("https://b.test/", 503, "down");
        assert_eq!(t.get_ok("https://a.test/").await.unwrap(), "ok");
        assert!(t.get("https://b.test/").await.unwrap().is_error());
        assert!(matches!(
            t.get_ok("https://b.test/").await,
            Err(IngestError::Fetch { .. })
        ));
        assert!(t.get("https://missing.test/").await.is_err());
    }
}
