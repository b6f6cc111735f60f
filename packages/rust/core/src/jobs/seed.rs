//! `seed-urls`: create one record per newly discovered article URL.

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{info, instrument, warn};
use url::Url;

use contentpipe_formula::Formula;
use contentpipe_scrape::{ContentFetcher, ListingRules, discover_listing, frame_url};
use contentpipe_shared::{ContentPipeError, Fields, ListingConfig, RecordId, Result};
use contentpipe_storage::RecordSource;

const SOURCE_URL: &str = "source_content_url";

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedReport {
    pub created: Vec<RecordId>,
    /// URLs that already had a record.
    pub existing: usize,
    /// `(url, error)` for URLs that could not be looked up or created.
    pub failed: Vec<(String, String)>,
}

/// Article URLs on the configured listing page, following its frame if one is named.
#[instrument(skip_all, fields(url = %listing.url))]
pub async fn discover_urls(
    fetcher: &dyn ContentFetcher,
    listing: &ListingConfig,
    now: NaiveDateTime,
) -> Result<Vec<Url>> {
    let rules = ListingRules::try_from(listing)?;
    let mut base = Url::parse(&listing.url)
        .map_err(|e| ContentPipeError::config(format!("invalid listing url '{}': {e}", listing.url)))?;

    let mut html = fetcher.fetch(base.as_str()).await?;
    if let Some(frame) = frame_url(&html, &base, &rules) {
        info!(%frame, "following listing frame");
        html = fetcher.fetch(frame.as_str()).await?;
        base = frame;
    }

    let urls = discover_listing(&html, &base, &rules, now);
    info!(found = urls.len(), "listing scanned");
    Ok(urls)
}

/// Create a `{source_content_url}` record for every URL not yet in the store.
///
/// A failing URL is reported and does not stop the others.
#[instrument(skip_all, fields(store = store.name(), urls = urls.len()))]
pub async fn seed_urls(store: &dyn RecordSource, urls: &[Url]) -> SeedReport {
    let mut report = SeedReport::default();
    for url in urls {
        match seed_one(store, url).await {
            Ok(Some(id)) => {
                info!(%url, %id, "created record");
                report.created.push(id);
            }
            Ok(None) => report.existing += 1,
            Err(e) => {
                warn!(%url, error = %e, "could not seed url");
                report.failed.push((url.to_string(), e.to_string()));
            }
        }
    }
    report
}

async fn seed_one(store: &dyn RecordSource, url: &Url) -> Result<Option<RecordId>> {
    let existing = store.list(&Formula::eq(SOURCE_URL, url.as_str())).await?;
    if !existing.is_empty() {
        return Ok(None);
    }
    let mut fields = Fields::new();
    fields.insert(SOURCE_URL.into(), url.as_str().into());
    store.create(&fields).await.map(Some)
}
