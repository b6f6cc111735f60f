//! `generate-faq`: FAQ schema markup for records with a key phrase.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::instrument;

use contentpipe_generation::TextGenerator;
use contentpipe_shared::{ContentPipeError, Fields, JobsConfig, Record, Result};

use super::JobDefinition;
use super::prompts::{DEFAULT_FAQ_EXAMPLE, faq_prompt};
use crate::runner::{Processor, Transition};

const KEY_PHRASE: &str = "key_phrase";
const FAQ: &str = "faq";

pub struct GenerateFaq {
    generator: Arc<dyn TextGenerator>,
    example: String,
}

impl GenerateFaq {
    pub const DEFINITION: JobDefinition = JobDefinition {
        name: "generate-faq",
        filter: "AND(NOT({key_phrase} = ''), {faq} = BLANK())",
        persist: &[FAQ],
    };

    pub fn new(generator: Arc<dyn TextGenerator>, config: &JobsConfig) -> Self {
        Self {
            generator,
            example: config
                .faq_example
                .clone()
                .unwrap_or_else(|| DEFAULT_FAQ_EXAMPLE.to_string()),
        }
    }
}

#[async_trait]
impl Processor for GenerateFaq {
    #[instrument(skip_all, fields(id = %record.id))]
    async fn process(&self, record: &Record) -> Result<Transition> {
        let topic = record.require(KEY_PHRASE)?;
        // The whole request lives in the instruction; there is no input text.
        let faq = self
            .generator
            .generate(&faq_prompt(&topic, &self.example), "")
            .await?;
        if faq.trim().is_empty() {
            return Err(ContentPipeError::Generation(format!("empty FAQ for {topic:?}")));
        }

        let mut fields = Fields::new();
        fields.insert(FAQ.into(), faq.into());
        Ok(Transition::Updated(fields))
    }
}
