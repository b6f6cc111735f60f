//! `generate-article`: write an article from the scraped source and queue it for review.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use contentpipe_generation::TextGenerator;
use contentpipe_shared::{ContentPipeError, Fields, JobsConfig, Record, Result, STATE_FIELD, Stage};

use super::JobDefinition;
use super::prompts::{DEFAULT_ARTICLE_DISCLAIMER, DEFAULT_ARTICLE_PROMPT};
use crate::runner::{Processor, Transition};

const SOURCE_TEXT: &str = "source_content_text";
const ARTICLE_TEXT: &str = "article_text";

pub struct GenerateArticle {
    generator: Arc<dyn TextGenerator>,
    prompt: String,
    disclaimer: String,
}

impl GenerateArticle {
    pub const DEFINITION: JobDefinition = JobDefinition {
        name: "generate-article",
        filter: "{state} = 'INIT'",
        persist: &[ARTICLE_TEXT, STATE_FIELD],
    };

    pub fn new(generator: Arc<dyn TextGenerator>, config: &JobsConfig) -> Self {
        Self {
            generator,
            prompt: config
                .article_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_ARTICLE_PROMPT.to_string()),
            disclaimer: config
                .article_disclaimer
                .clone()
                .unwrap_or_else(|| DEFAULT_ARTICLE_DISCLAIMER.to_string()),
        }
    }
}

#[async_trait]
impl Processor for GenerateArticle {
    #[instrument(skip_all, fields(id = %record.id))]
    async fn process(&self, record: &Record) -> Result<Transition> {
        let source = record.require(SOURCE_TEXT)?;
        let generated = self.generator.generate(&self.prompt, &source).await?;
        let generated = generated.trim_end();
        if generated.is_empty() {
            return Err(ContentPipeError::Generation(format!(
                "{} returned an empty article",
                self.generator.name()
            )));
        }

        let article = if self.disclaimer.trim().is_empty() {
            generated.to_string()
        } else {
            format!("{generated}\n\n{}", self.disclaimer.trim())
        };
        info!(provider = self.generator.name(), len = article.len(), "article generated");

        let mut fields = Fields::new();
        fields.insert(ARTICLE_TEXT.into(), article.into());
        fields.insert(STATE_FIELD.into(), Stage::ReviewRequired.into());
        Ok(Transition::Updated(fields))
    }
}
