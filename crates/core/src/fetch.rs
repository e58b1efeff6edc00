//! Page fetching contract used by the corpus builder.

use async_trait::async_trait;

use crate::error::ScrapeError;

/// A fetched HTML page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: String,
    pub html: String,
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, ScrapeError>;
}
