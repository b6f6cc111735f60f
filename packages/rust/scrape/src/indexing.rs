//! Sitemap parsing and `noindex` detection.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;

use crate::fetch::FetchedPage;

static LOC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<loc>\s*(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?\s*</loc>").expect("valid regex")
});
static META_NAMED: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[name]").expect("valid selector"));

/// Sitemap entries with these extensions are assets, not pages.
pub const ASSET_EXTENSIONS: &[&str] = &[
    ".png", ".jpg", ".jpeg", ".gif", ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".csv", ".zip",
    ".mp4", ".svg", ".webp",
];

/// Where a `noindex` directive was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoindexSource {
    /// `X-Robots-Tag` response header.
    Header,
    /// `<meta name="robots">` or `<meta name="googlebot">`.
    Meta,
}

/// Page URLs listed in a sitemap, in document order, assets excluded.
pub fn sitemap_urls(xml: &str) -> Vec<String> {
    LOC.captures_iter(xml)
        .map(|c| unescape(c[1].trim()))
        .filter(|url| !url.is_empty())
        .filter(|url| {
            let lower = url.to_ascii_lowercase();
            !ASSET_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
        })
        .collect()
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// The first `noindex` directive on `page`. The header wins over meta tags.
pub fn noindex_directive(page: &FetchedPage) -> Option<NoindexSource> {
    if page
        .robots_tag
        .as_deref()
        .is_some_and(|v| v.to_ascii_lowercase().contains("noindex"))
    {
        return Some(NoindexSource::Header);
    }

    let doc = Html::parse_document(&page.body);
    let flagged = doc.select(&META_NAMED).any(|meta| {
        let name = meta.value().attr("name").unwrap_or_default();
        let content = meta.value().attr("content").unwrap_or_default();
        (name.eq_ignore_ascii_case("robots") || name.eq_ignore_ascii_case("googlebot"))
            && content.to_ascii_lowercase().contains("noindex")
    });
    flagged.then_some(NoindexSource::Meta)
}
