//! The concrete jobs: one [`Processor`](crate::Processor) per pipeline step.
//!
//! Each job carries a [`JobDefinition`]: the filter that selects its batch and
//! the fields it is allowed to write. The filter can be overridden per run,
//! the persist set cannot.

mod article;
mod faq;
mod html;
mod instagram;
mod intro;
mod medium;
mod noindex;
mod prompts;
mod scrape;
mod seed;
mod wordpress;

use contentpipe_formula::Formula;
use contentpipe_shared::Result;

pub use article::GenerateArticle;
pub use faq::GenerateFaq;
pub use html::MarkdownToHtml;
pub use instagram::PublishInstagram;
pub use intro::CompanyIntro;
pub use medium::PublishMedium;
pub use noindex::{NoindexHit, NoindexReport, check_sitemaps};
pub use prompts::{DEFAULT_ARTICLE_DISCLAIMER, DEFAULT_ARTICLE_PROMPT, DEFAULT_FAQ_EXAMPLE};
pub use scrape::ScrapeContent;
pub use seed::{SeedReport, discover_urls, seed_urls};
pub use wordpress::PublishWordPress;

/// Name, default filter and persist set of a record job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobDefinition {
    pub name: &'static str,
    pub filter: &'static str,
    pub persist: &'static [&'static str],
}

impl JobDefinition {
    pub fn default_filter(&self) -> Result<Formula> {
        Formula::parse(self.filter)
    }
}

/// Every record job, in pipeline order.
pub const JOBS: &[JobDefinition] = &[
    ScrapeContent::DEFINITION,
    GenerateArticle::DEFINITION,
    MarkdownToHtml::DEFINITION,
    GenerateFaq::DEFINITION,
    CompanyIntro::DEFINITION,
    PublishMedium::DEFINITION,
    PublishWordPress::DEFINITION,
    PublishInstagram::DEFINITION,
];

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use contentpipe_scrape::ContentFetcher;
    use contentpipe_shared::{ContentPipeError, FieldValue, Record, Result};

    /// Serves canned pages; unknown URLs are a 404.
    #[derive(Default)]
    pub struct StaticFetcher {
        pages: HashMap<String, String>,
    }

    impl StaticFetcher {
        pub fn with_page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }
    }

    #[async_trait]
    impl ContentFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<String> {
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| ContentPipeError::Fetch(format!("{url}: HTTP 404 Not Found")))
        }
    }

    pub fn rec(id: &str, fields: &[(&str, &str)]) -> Record {
        Record::new(
            id,
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), FieldValue::from(*v)))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filters_parse() {
        for job in JOBS {
            let formula = job.default_filter().unwrap_or_else(|e| panic!("{}: {e}", job.name));
            // Display must round-trip through the parser for the Airtable query.
            assert_eq!(Formula::parse(&formula.to_string()).unwrap(), formula, "{}", job.name);
        }
    }

    #[test]
    fn names_unique_and_persist_sets_non_empty() {
        let mut names: Vec<_> = JOBS.iter().map(|j| j.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), JOBS.len());
        assert!(JOBS.iter().all(|j| !j.persist.is_empty()));
    }
}
