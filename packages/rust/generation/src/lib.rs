//! Text generation providers.
//!
//! Every job that writes prose calls a [`TextGenerator`] with an instruction
//! (the prompt) and the input text. Providers:
//! - [`OpenAiGenerator`]: chat completions
//! - [`GeminiGenerator`]: Gemini `generateContent`
//! - [`ProviderPool`]: delegates each call to one of several providers
//! - [`FakeGenerator`]: deterministic responses for tests

mod fake;
mod gemini;
mod openai;
mod pool;

use std::sync::Arc;

use async_trait::async_trait;
use contentpipe_shared::{
    ContentPipeError, GenerationConfig, ProviderChoice, Result, UniformRandom, resolve_env,
};
use reqwest::Response;

pub use fake::FakeGenerator;
pub use gemini::GeminiGenerator;
pub use openai::OpenAiGenerator;
pub use pool::ProviderPool;

/// A language-model text generation endpoint.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text following `instruction` for `input`.
    ///
    /// Quota, auth and malformed-response conditions all surface as
    /// [`ContentPipeError::Generation`].
    async fn generate(&self, instruction: &str, input: &str) -> Result<String>;

    /// Provider name for logs (e.g. `"openai"`).
    fn name(&self) -> &str;
}

/// Build the generator selected by `[generation]`, resolving API keys from the environment.
pub fn from_config(
    config: &GenerationConfig,
    client: reqwest::Client,
) -> Result<Arc<dyn TextGenerator>> {
    let openai = || -> Result<OpenAiGenerator> {
        Ok(OpenAiGenerator::new(
            client.clone(),
            resolve_env(&config.openai_api_key_env)?,
            config,
        ))
    };
    let gemini = || -> Result<GeminiGenerator> {
        Ok(GeminiGenerator::new(
            client.clone(),
            resolve_env(&config.gemini_api_key_env)?,
            config,
        ))
    };

    let generator: Arc<dyn TextGenerator> = match config.provider {
        ProviderChoice::Openai => Arc::new(openai()?),
        ProviderChoice::Gemini => Arc::new(gemini()?),
        ProviderChoice::Random => {
            let providers: Vec<Arc<dyn TextGenerator>> =
                vec![Arc::new(openai()?), Arc::new(gemini()?)];
            Arc::new(ProviderPool::new(providers, Arc::new(UniformRandom))?)
        }
    };
    Ok(generator)
}

/// Turn a non-2xx provider response into a `Generation` error.
async fn reject(provider: &str, response: Response) -> ContentPipeError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status.as_u16() == 429 {
        return ContentPipeError::Generation(format!("{provider}: rate limited or quota exceeded: {body}"));
    }
    ContentPipeError::Generation(format!("{provider}: HTTP {status}: {body}"))
}

/// Log-friendly preview of the input.
fn preview(input: &str) -> String {
    let mut head: String = input.chars().take(50).collect();
    if input.chars().count() > 50 {
        head.push_str("..");
    }
    head
}
