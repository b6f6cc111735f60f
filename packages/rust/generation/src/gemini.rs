//! Google Gemini `generateContent` provider.

use async_trait::async_trait;
use contentpipe_shared::{ContentPipeError, GenerationConfig, Result, transport_error};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{TextGenerator, preview, reject};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

/// Gemini generator. The instruction and input are sent as one prompt.
pub struct GeminiGenerator {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

impl GeminiGenerator {
    pub fn new(client: Client, api_key: String, config: &GenerationConfig) -> Self {
        Self {
            client,
            api_key,
            model: config.gemini_model.clone(),
            base_url: config.gemini_base_url.trim_end_matches('/').to_string(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn generate(&self, instruction: &str, input: &str) -> Result<String> {
        debug!(input = %preview(input), "calling generateContent");

        let endpoint = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = serde_json::json!({
            "contents": [{"parts": [{"text": format!("{instruction}\n\n{input}")}]}],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_tokens,
            }
        });

        let response = self
            .client
            .post(&endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&endpoint, e.without_url()))?;

        if !response.status().is_success() {
            return Err(reject("gemini", response).await);
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ContentPipeError::Generation(format!("gemini: malformed response: {e}")))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ContentPipeError::Generation("gemini: response has no text".into()));
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn generator(server: &MockServer) -> GeminiGenerator {
        let config = GenerationConfig {
            gemini_base_url: format!("{}/v1beta", server.uri()),
            ..GenerationConfig::default()
        };
        GeminiGenerator::new(Client::new(), "g-key".into(), &config)
    }

    #[tokio::test]
    async fn combines_instruction_and_input() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(query_param("key", "g-key"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{"parts": [{"text": "Summarize.\n\nlong text"}]}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "Short "}, {"text": "summary"}]}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = generator(&server).generate("Summarize.", "long text").await.unwrap();
        assert_eq!(text, "Short summary");
    }

    #[tokio::test]
    async fn empty_candidates_fail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"candidates": []})))
            .mount(&server)
            .await;

        let err = generator(&server).generate("i", "t").await.unwrap_err();
        assert!(matches!(err, ContentPipeError::Generation(_)));
    }

    #[tokio::test]
    async fn auth_failure_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("API key not valid"))
            .mount(&server)
            .await;

        let err = generator(&server).generate("i", "t").await.unwrap_err();
        assert!(err.to_string().contains("403"));
    }
}
