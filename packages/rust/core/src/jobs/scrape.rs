//! `scrape-content`: fill `source_content_text` from `source_content_url`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};
use url::Url;

use contentpipe_scrape::{ContentFetcher, extract_text};
use contentpipe_shared::{Fields, Record, Result, TextMode};

use super::JobDefinition;
use crate::runner::{Processor, Transition};

const SOURCE_URL: &str = "source_content_url";
const SOURCE_TEXT: &str = "source_content_text";

pub struct ScrapeContent {
    fetcher: Arc<dyn ContentFetcher>,
    mode: TextMode,
}

impl ScrapeContent {
    pub const DEFINITION: JobDefinition = JobDefinition {
        name: "scrape-content",
        filter: "AND(NOT({source_content_url} = ''), OR({source_content_text} = '', {source_content_text} = BLANK()))",
        persist: &[SOURCE_TEXT],
    };

    pub fn new(fetcher: Arc<dyn ContentFetcher>, mode: TextMode) -> Self {
        Self { fetcher, mode }
    }
}

#[async_trait]
impl Processor for ScrapeContent {
    #[instrument(skip_all, fields(id = %record.id))]
    async fn process(&self, record: &Record) -> Result<Transition> {
        let url = record.require(SOURCE_URL)?;
        let html = self.fetcher.fetch(&url).await?;

        let text = match self.mode {
            TextMode::Text => extract_text(&html),
            TextMode::Markdown => {
                let base = Url::parse(&url).ok();
                contentpipe_markdown::html_to_markdown(&html, base.as_ref())?
            }
        };
        if text.trim().is_empty() {
            return Ok(Transition::Skipped(format!("no text on {url}")));
        }
        debug!(len = text.len(), "scraped");

        let mut fields = Fields::new();
        fields.insert(SOURCE_TEXT.into(), text.into());
        Ok(Transition::Updated(fields))
    }
}
