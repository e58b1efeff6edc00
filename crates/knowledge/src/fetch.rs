//! Page fetchers: the live HTTP client and a fixture map for tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use switchyard_core::error::ScrapeError;
use switchyard_core::fetch::{FetchedPage, PageFetcher};
use tracing::debug;

/// Fetches pages over HTTP with `reqwest`.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .unwrap_or_default();
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, ScrapeError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| ScrapeError::InvalidUrl(format!("{url}: {e}")))?;

        debug!(url = %parsed, "Fetching page");
        let response = self.client.get(parsed).send().await.map_err(|e| ScrapeError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().to_string();
        let html = response.text().await.map_err(|e| ScrapeError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(FetchedPage { url: final_url, html })
    }
}

/// Serves pages from a fixed `url → html` map. Unknown URLs are 404s.
#[derive(Debug, Default, Clone)]
pub struct FixtureFetcher {
    pages: HashMap<String, String>,
}

impl FixtureFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    pub fn set_page(&mut self, url: impl Into<String>, html: impl Into<String>) {
        self.pages.insert(url.into(), html.into());
    }
}

#[async_trait]
impl PageFetcher for FixtureFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, ScrapeError> {
        match self.pages.get(url) {
            Some(html) => Ok(FetchedPage {
                url: url.to_string(),
                html: html.clone(),
            }),
            None => Err(ScrapeError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}
