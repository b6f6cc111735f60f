//! Fake generator for testing.
//!
//! Responses are matched by checking whether the instruction or input
//! contains a registered substring, so tests run without network access.

use std::sync::Mutex;

use async_trait::async_trait;
use contentpipe_shared::{ContentPipeError, Result};

use crate::TextGenerator;

#[derive(Debug)]
enum Reply {
    Text(String),
    Fail(String),
}

/// Deterministic [`TextGenerator`] that records every call.
#[derive(Debug)]
pub struct FakeGenerator {
    name: String,
    rules: Vec<(String, Reply)>,
    default: Option<String>,
    calls: Mutex<Vec<(String, String)>>,
}

impl Default for FakeGenerator {
    fn default() -> Self {
        Self::named("fake")
    }
}

impl FakeGenerator {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rules: Vec::new(),
            default: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Reply with `response` when the instruction or input contains `needle`.
    pub fn with_response(mut self, needle: &str, response: &str) -> Self {
        self.rules.push((needle.to_string(), Reply::Text(response.to_string())));
        self
    }

    /// Fail with a `Generation` error when the instruction or input contains `needle`.
    pub fn failing_on(mut self, needle: &str, message: &str) -> Self {
        self.rules.push((needle.to_string(), Reply::Fail(message.to_string())));
        self
    }

    /// Reply used when no rule matches.
    pub fn with_default(mut self, response: &str) -> Self {
        self.default = Some(response.to_string());
        self
    }

    /// `(instruction, input)` pairs received so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TextGenerator for FakeGenerator {
    async fn generate(&self, instruction: &str, input: &str) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((instruction.to_string(), input.to_string()));
        }

        let matched = self
            .rules
            .iter()
            .find(|(needle, _)| instruction.contains(needle.as_str()) || input.contains(needle.as_str()));

        match matched {
            Some((_, Reply::Text(text))) => Ok(text.clone()),
            Some((_, Reply::Fail(message))) => Err(ContentPipeError::Generation(message.clone())),
            None => self
                .default
                .clone()
                .ok_or_else(|| ContentPipeError::Generation(format!("{}: no scripted response", self.name))),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
