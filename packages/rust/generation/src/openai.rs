//! OpenAI chat-completions provider.

use async_trait::async_trait;
use contentpipe_shared::{ContentPipeError, GenerationConfig, Result, transport_error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{TextGenerator, preview, reject};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI `chat/completions` generator.
pub struct OpenAiGenerator {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiGenerator {
    pub fn new(client: Client, api_key: String, config: &GenerationConfig) -> Self {
        Self {
            client,
            api_key,
            model: config.openai_model.clone(),
            endpoint: format!("{}/chat/completions", config.openai_base_url.trim_end_matches('/')),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, instruction: &str, input: &str) -> Result<String> {
        debug!(input = %preview(input), "calling chat completions");

        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: instruction,
                },
                ChatMessage {
                    role: "user",
                    content: input,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(&self.endpoint, e))?;

        if !response.status().is_success() {
            return Err(reject("openai", response).await);
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| ContentPipeError::Generation(format!("openai: malformed response: {e}")))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ContentPipeError::Generation("openai: response has no content".into()))
    }

    fn name(&self) -> &str {
        "openai"
    }
}
