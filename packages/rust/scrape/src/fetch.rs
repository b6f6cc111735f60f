//! Content fetching over HTTP.

use async_trait::async_trait;
use contentpipe_shared::{ContentPipeError, Result};
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

/// A fetched page with the response headers the indexing checks read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedPage {
    pub body: String,
    /// All `X-Robots-Tag` header values, joined by `", "`.
    pub robots_tag: Option<String>,
}

/// Fetches the raw text of a page.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;

    /// Body plus robots headers. Fetchers without header access report none.
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage> {
        Ok(FetchedPage {
            body: self.fetch(url).await?,
            robots_tag: None,
        })
    }
}

/// [`ContentFetcher`] over the run's shared reqwest client.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        Ok(self.fetch_page(url).await?.body)
    }

    #[instrument(skip_all, fields(url = %url))]
    async fn fetch_page(&self, url: &str) -> Result<FetchedPage> {
        let parsed = Url::parse(url)
            .map_err(|e| ContentPipeError::Fetch(format!("invalid URL '{url}': {e}")))?;

        let response = self.client.get(parsed).send().await.map_err(|e| {
            if e.is_timeout() {
                ContentPipeError::Timeout(format!("{url}: {e}"))
            } else {
                ContentPipeError::Fetch(format!("{url}: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ContentPipeError::Fetch(format!("{url}: HTTP {status}")));
        }

        let robots: Vec<&str> = response
            .headers()
            .get_all("x-robots-tag")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        let robots_tag = (!robots.is_empty()).then(|| robots.join(", "));

        let body = response
            .text()
            .await
            .map_err(|e| ContentPipeError::Fetch(format!("{url}: body read failed: {e}")))?;
        debug!(bytes = body.len(), "fetched");
        Ok(FetchedPage { body, robots_tag })
    }
}
