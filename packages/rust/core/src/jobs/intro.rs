//! `company-intro`: describe a company's services from its own website.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use contentpipe_generation::TextGenerator;
use contentpipe_scrape::{ContentFetcher, extract_text_skipping};
use contentpipe_shared::{Fields, Record, Result};

use super::JobDefinition;
use super::prompts::company_intro_prompt;
use crate::runner::{Processor, Transition};

const SITE_URL: &str = "siteUrl";
const INTRODUCTION: &str = "introduction";

/// Written when the site has no usable text, so the record is not selected again.
pub const NO_CONTENT_MARKER: &str = "SKIPPING";

/// Output containing any of these is template filler, not a description.
const SAMPLE_KEYWORDS: &[&str] = &["example", "sample", "#", "certainly"];

pub struct CompanyIntro {
    fetcher: Arc<dyn ContentFetcher>,
    generator: Arc<dyn TextGenerator>,
    skip_words: Vec<String>,
}

impl CompanyIntro {
    pub const DEFINITION: JobDefinition = JobDefinition {
        name: "company-intro",
        filter: "AND({introduction} = '', {siteUrl} != '')",
        persist: &[INTRODUCTION],
    };

    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        generator: Arc<dyn TextGenerator>,
        skip_words: Vec<String>,
    ) -> Self {
        Self {
            fetcher,
            generator,
            skip_words,
        }
    }
}

fn sample_keyword(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    SAMPLE_KEYWORDS.iter().copied().find(|k| lower.contains(k))
}

#[async_trait]
impl Processor for CompanyIntro {
    #[instrument(skip_all, fields(id = %record.id))]
    async fn process(&self, record: &Record) -> Result<Transition> {
        let url = record.require(SITE_URL)?;
        let name = record.non_blank("name").unwrap_or_else(|| "Unknown".into());
        let district = record.non_blank("district").unwrap_or_else(|| "Unknown".into());

        let html = self.fetcher.fetch(&url).await?;
        let content = extract_text_skipping(&html, &self.skip_words);

        let mut fields = Fields::new();
        if content.is_empty() {
            info!(%url, "no usable site text, marking record");
            fields.insert(INTRODUCTION.into(), NO_CONTENT_MARKER.into());
            return Ok(Transition::Updated(fields));
        }

        let intro = self
            .generator
            .generate(&company_intro_prompt(&name, &district), &content)
            .await?;
        if let Some(keyword) = sample_keyword(&intro) {
            return Ok(Transition::Skipped(format!(
                "generated text contains sample keyword: {keyword}"
            )));
        }

        fields.insert(INTRODUCTION.into(), intro.into());
        Ok(Transition::Updated(fields))
    }
}

#[cfg(test)]
mod tests {
    use contentpipe_generation::FakeGenerator;
    use contentpipe_storage::MemoryStore;

    use super::*;
    use crate::jobs::testing::{StaticFetcher, rec};
    use crate::runner::{Outcome, Runner, SilentProgress};

    fn skip_words() -> Vec<String> {
        ["copyright", "email"].iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn generates_from_filtered_site_text() {
        let fetcher = Arc::new(StaticFetcher::default().with_page(
            "https://clinic.example.kr",
            r#"<body><p>Laser toning and fillers.</p><footer class="site-copyright"><p>All rights</p></footer></body>"#,
        ));
        let generator = Arc::new(FakeGenerator::default().with_default("**Laser toning**: brightens skin."));
        let job = CompanyIntro::new(fetcher, generator.clone(), skip_words());

        let record = rec(
            "rec1",
            &[("siteUrl", "https://clinic.example.kr"), ("name", "Glow Clinic"), ("district", "Gangnam")],
        );
        let Transition::Updated(fields) = job.process(&record).await.unwrap() else {
            panic!("expected update");
        };
        assert_eq!(fields["introduction"].to_text(), "**Laser toning**: brightens skin.");

        let (instruction, input) = &generator.calls()[0];
        assert!(instruction.starts_with("Explain the services offered at Glow Clinic in Gangnam"));
        assert!(input.contains("Laser toning and fillers."));
        assert!(!input.contains("All rights"));
    }

    #[tokio::test]
    async fn empty_site_is_marked_and_sample_output_skipped() {
        let fetcher = Arc::new(
            StaticFetcher::default()
                .with_page("https://empty.example", "<body><script>x()</script></body>")
                .with_page("https://full.example", "<body><p>Implants</p></body>"),
        );
        let generator = Arc::new(FakeGenerator::default().with_default("Certainly! Here is an example"));
        let store = Arc::new(MemoryStore::new(vec![
            rec("rec1", &[("siteUrl", "https://empty.example")]),
            rec("rec2", &[("siteUrl", "https://full.example")]),
            rec("rec3", &[("siteUrl", "https://full.example"), ("introduction", "done")]),
        ]));

        let job = CompanyIntro::new(fetcher, generator, skip_words());
        let summary = Runner::new(store.clone())
            .run(
                &CompanyIntro::DEFINITION.default_filter().unwrap(),
                &job,
                CompanyIntro::DEFINITION.persist,
                &SilentProgress,
            )
            .await
            .unwrap();

        assert_eq!(summary.total(), 2);
        assert_eq!(store.get("rec1").unwrap().text("introduction"), NO_CONTENT_MARKER);
        assert_eq!(
            summary.outcomes[1].outcome,
            Outcome::Skipped {
                reason: "generated text contains sample keyword: example".into()
            }
        );
        assert_eq!(store.get("rec2").unwrap().text("introduction"), "");
    }
}
