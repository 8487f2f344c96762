use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{LlmProvider, ProviderRequest};
use crate::retry::RetryPolicy;

/// OpenAI (or compatible) chat completions client.
pub struct OpenAiProvider {
    endpoint: String,
    model: String,
    client: Client,
    retry: RetryPolicy,
}

impl OpenAiProvider {
    /// Builds a client for `model` rooted at `base_url` (e.g. `https://api.openai.com/v1`).
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: String,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing OpenAI API key");
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid OpenAI API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build OpenAI HTTP client")?;
        Ok(Self {
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model,
            client,
            retry,
        })
    }
}

impl LlmProvider for OpenAiProvider {
    fn complete(&self, request: &ProviderRequest<'_>) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system,
                },
                ChatMessage {
                    role: "user",
                    content: request.prompt,
                },
            ],
        };
        debug!(model = %self.model, "calling OpenAI chat completions");
        let resp = self.retry.send("OpenAI chat completions", || {
            self.client.post(&self.endpoint).json(&body).send()
        })?;
        let parsed: ChatResponse = resp.json().context("failed to parse OpenAI response")?;
        parsed.into_answer()
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl ChatResponse {
    fn into_answer(self) -> Result<String> {
        self.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| anyhow!("OpenAI response contained no choices"))
    }
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}
