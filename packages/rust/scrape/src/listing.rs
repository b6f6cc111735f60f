//! Article link discovery on blog listing pages.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use contentpipe_shared::{ContentPipeError, ListingConfig, Result};
use regex::Regex;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

static HOURS_AGO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*시간\s*전").expect("valid regex"));
static MINUTES_AGO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*분\s*전").expect("valid regex"));

/// Compiled listing page rules.
#[derive(Debug, Clone)]
pub struct ListingRules {
    pub item: Selector,
    pub link: Selector,
    pub date: Option<Selector>,
    /// Only entries published strictly after this instant are kept.
    pub published_after: Option<NaiveDateTime>,
    pub exclude: Vec<String>,
    pub frame: Option<Selector>,
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| ContentPipeError::config(format!("invalid CSS selector '{css}': {e}")))
}

impl TryFrom<&ListingConfig> for ListingRules {
    type Error = ContentPipeError;

    fn try_from(config: &ListingConfig) -> Result<Self> {
        let published_after = config
            .published_after
            .as_deref()
            .map(|d| {
                NaiveDate::parse_from_str(d, "%Y-%m-%d")
                    .map(|d| d.and_time(chrono::NaiveTime::MIN))
                    .map_err(|e| ContentPipeError::config(format!("invalid published_after '{d}': {e}")))
            })
            .transpose()?;

        Ok(Self {
            item: selector(&config.item_selector)?,
            link: selector(&config.link_selector)?,
            date: config.date_selector.as_deref().map(selector).transpose()?,
            published_after,
            exclude: config.exclude.clone(),
            frame: config.frame_selector.as_deref().map(selector).transpose()?,
        })
    }
}

/// Parse a listing date: `N 시간 전` / `N 분 전` (relative to `now`),
/// `YYYY. MM. DD.` or `YYYY-MM-DD`.
pub fn parse_listing_date(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Some(caps) = HOURS_AGO.captures(text) {
        let hours: i64 = caps[1].parse().ok()?;
        return Some(now - Duration::hours(hours));
    }
    if let Some(caps) = MINUTES_AGO.captures(text) {
        let minutes: i64 = caps[1].parse().ok()?;
        return Some(now - Duration::minutes(minutes));
    }
    ["%Y. %m. %d.", "%Y-%m-%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .map(|d| d.and_time(chrono::NaiveTime::MIN))
}

/// The URL of the frame that holds the listing, when the rules name one.
pub fn frame_url(html: &str, base_url: &Url, rules: &ListingRules) -> Option<Url> {
    let frame = rules.frame.as_ref()?;
    let doc = Html::parse_document(html);
    let src = doc.select(frame).next()?.value().attr("src")?;
    base_url.join(src).ok()
}

/// Article URLs on a listing page, in page order and without duplicates.
pub fn discover_listing(
    html: &str,
    base_url: &Url,
    rules: &ListingRules,
    now: NaiveDateTime,
) -> Vec<Url> {
    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for item in doc.select(&rules.item) {
        let Some(href) = item
            .select(&rules.link)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };

        let url = match base_url.join(href.trim()) {
            Ok(url) => url,
            Err(e) => {
                warn!(href, error = %e, "unresolvable link");
                continue;
            }
        };

        if rules.exclude.iter().any(|x| url.as_str().contains(x.as_str())) {
            debug!(%url, "excluded");
            continue;
        }

        if let Some(date_sel) = &rules.date {
            let Some(date_el) = item.select(date_sel).next() else {
                continue;
            };
            let date_text = date_el.text().collect::<String>();
            let Some(published) = parse_listing_date(&date_text, now) else {
                warn!(%url, date = date_text.trim(), "unsupported date format");
                continue;
            };
            if rules.published_after.is_some_and(|cutoff| published <= cutoff) {
                continue;
            }
        }

        if seen.insert(url.as_str().to_string()) {
            urls.push(url);
        }
    }

    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 12, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn rules() -> ListingRules {
        ListingRules::try_from(&ListingConfig {
            url: "https://blog.example.com/list".into(),
            item_selector: "dd.p_photo_d".into(),
            link_selector: "a[href]".into(),
            date_selector: Some("span.pcol2".into()),
            published_after: Some("2024-12-04".into()),
            exclude: vec!["categoryNo=9".into()],
            frame_selector: Some("iframe#mainFrame".into()),
        })
        .unwrap()
    }

    #[test]
    fn relative_and_absolute_dates() {
        assert_eq!(
            parse_listing_date("3 시간 전", now()),
            Some(now() - Duration::hours(3))
        );
        assert_eq!(
            parse_listing_date("2024. 12. 5.", now()),
            NaiveDate::from_ymd_opt(2024, 12, 5).map(|d| d.and_time(chrono::NaiveTime::MIN))
        );
        assert_eq!(parse_listing_date("yesterday", now()), None);
    }

    #[test]
    fn discovers_recent_articles() {
        let html = r#"<dl>
            <dd class="p_photo_d"><a href="/post/3">New</a><span class="pcol2 fil5">2 시간 전</span></dd>
            <dd class="p_photo_d"><a href="/post/2?categoryNo=9">Event</a><span class="pcol2">2024. 12. 8.</span></dd>
            <dd class="p_photo_d"><a href="https://blog.example.com/post/1">Old</a><span class="pcol2">2024. 12. 4.</span></dd>
            <dd class="p_photo_d"><a href="/post/4">Undated</a></dd>
            <dd class="p_photo_d"><a href="/post/5">Mid</a><span class="pcol2">2024. 12. 6.</span></dd>
            <dd class="p_photo_d"><a href="/post/5">Dup</a><span class="pcol2">2024. 12. 6.</span></dd>
        </dl>"#;
        let base = Url::parse("https://blog.example.com/list").unwrap();
        let urls: Vec<String> = discover_listing(html, &base, &rules(), now())
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://blog.example.com/post/3".to_string(),
                "https://blog.example.com/post/5".to_string()
            ]
        );
    }

    #[test]
    fn resolves_frame_source() {
        let html = r#"<iframe id="mainFrame" src="/PostList.naver?blogId=x"></iframe>"#;
        let base = Url::parse("https://blog.example.com/x").unwrap();
        assert_eq!(
            frame_url(html, &base, &rules()).unwrap().as_str(),
            "https://blog.example.com/PostList.naver?blogId=x"
        );
    }

    #[test]
    fn invalid_selector_is_config_error() {
        let config = ListingConfig {
            url: "https://x".into(),
            item_selector: "dd[".into(),
            link_selector: "a".into(),
            date_selector: None,
            published_after: None,
            exclude: vec![],
            frame_selector: None,
        };
        assert!(ListingRules::try_from(&config).is_err());
    }
}
