//! Page fetching and text extraction for the scrape jobs.
//!
//! - [`ContentFetcher`] / [`HttpFetcher`]: raw page download
//! - [`extract_text`], [`extract_text_skipping`]: visible text of a page
//! - [`discover_listing`]: article links on a blog listing page
//! - [`sitemap_urls`], [`noindex_directive`]: sitemap pages and indexing directives

mod extract;
mod fetch;
mod indexing;
mod listing;

pub use extract::{extract_text, extract_text_skipping};
pub use fetch::{ContentFetcher, FetchedPage, HttpFetcher};
pub use indexing::{ASSET_EXTENSIONS, NoindexSource, noindex_directive, sitemap_urls};
pub use listing::{ListingRules, discover_listing, frame_url, parse_listing_date};
