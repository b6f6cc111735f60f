//! `noindex-check`: find sitemap pages that tell search engines not to index them.

use serde::Serialize;
use tracing::{info, instrument, warn};
use url::Url;

use contentpipe_scrape::{ContentFetcher, NoindexSource, noindex_directive, sitemap_urls};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoindexHit {
    pub url: String,
    pub source: NoindexSource,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NoindexReport {
    /// Pages fetched and inspected.
    pub checked: usize,
    pub noindex: Vec<NoindexHit>,
    /// `(url, error)` for sitemaps or pages that could not be fetched.
    pub failed: Vec<(String, String)>,
}

/// Check every page listed in `sitemaps`. A failing sitemap or page is
/// reported and does not stop the others.
#[instrument(skip_all, fields(sitemaps = sitemaps.len()))]
pub async fn check_sitemaps(fetcher: &dyn ContentFetcher, sitemaps: &[Url]) -> NoindexReport {
    let mut report = NoindexReport::default();

    for sitemap in sitemaps {
        let xml = match fetcher.fetch(sitemap.as_str()).await {
            Ok(xml) => xml,
            Err(e) => {
                warn!(%sitemap, error = %e, "could not fetch sitemap");
                report.failed.push((sitemap.to_string(), e.to_string()));
                continue;
            }
        };
        let pages = sitemap_urls(&xml);
        info!(%sitemap, pages = pages.len(), "sitemap read");

        for url in pages {
            match fetcher.fetch_page(&url).await {
                Ok(page) => {
                    report.checked += 1;
                    if let Some(source) = noindex_directive(&page) {
                        warn!(%url, ?source, "noindex page");
                        report.noindex.push(NoindexHit { url, source });
                    }
                }
                Err(e) => {
                    warn!(%url, error = %e, "could not check page");
                    report.failed.push((url, e.to_string()));
                }
            }
        }
    }

    info!(
        checked = report.checked,
        noindex = report.noindex.len(),
        failed = report.failed.len(),
        "noindex check complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use contentpipe_scrape::HttpFetcher;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn page(server: &MockServer, route: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn flags_header_and_meta_noindex_pages() {
        let server = MockServer::start().await;
        let base = server.uri();
        let sitemap = format!(
            r#"<urlset>
  <url><loc>{base}/</loc></url>
  <url><loc>{base}/staging</loc></url>
  <url><loc>{base}/thanks</loc></url>
  <url><loc>{base}/gone</loc></url>
  <url><loc>{base}/uploads/hero.jpg</loc></url>
</urlset>"#
        );
        page(&server, "/sitemap.xml", ResponseTemplate::new(200).set_body_string(sitemap)).await;
        page(&server, "/", ResponseTemplate::new(200).set_body_string("<p>home</p>")).await;
        page(
            &server,
            "/staging",
            ResponseTemplate::new(200)
                .insert_header("X-Robots-Tag", "noindex")
                .set_body_string("<p>wip</p>"),
        )
        .await;
        page(
            &server,
            "/thanks",
            ResponseTemplate::new(200)
                .set_body_string(r#"<head><meta name="robots" content="noindex"></head>"#),
        )
        .await;
        page(&server, "/gone", ResponseTemplate::new(404)).await;

        let fetcher = HttpFetcher::new(reqwest::Client::new());
        let sitemaps = vec![Url::parse(&format!("{base}/sitemap.xml")).unwrap()];
        let report = check_sitemaps(&fetcher, &sitemaps).await;

        assert_eq!(report.checked, 3);
        assert_eq!(
            report.noindex,
            vec![
                NoindexHit {
                    url: format!("{base}/staging"),
                    source: NoindexSource::Header,
                },
                NoindexHit {
                    url: format!("{base}/thanks"),
                    source: NoindexSource::Meta,
                },
            ]
        );
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, format!("{base}/gone"));
    }

    #[tokio::test]
    async fn unreachable_sitemap_does_not_stop_the_rest() {
        let server = MockServer::start().await;
        let base = server.uri();
        page(&server, "/missing.xml", ResponseTemplate::new(500)).await;
        page(
            &server,
            "/sitemap.xml",
            ResponseTemplate::new(200).set_body_string(format!("<urlset><url><loc>{base}/a</loc></url></urlset>")),
        )
        .await;
        page(&server, "/a", ResponseTemplate::new(200).set_body_string("<p>a</p>")).await;

        let fetcher = HttpFetcher::new(reqwest::Client::new());
        let sitemaps = vec![
            Url::parse(&format!("{base}/missing.xml")).unwrap(),
            Url::parse(&format!("{base}/sitemap.xml")).unwrap(),
        ];
        let report = check_sitemaps(&fetcher, &sitemaps).await;

        assert_eq!(report.checked, 1);
        assert!(report.noindex.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].0.ends_with("/missing.xml"));
    }
}
