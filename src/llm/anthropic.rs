use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{LlmProvider, ProviderRequest};
use crate::retry::RetryPolicy;

const MESSAGES_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic messages API client.
pub struct AnthropicProvider {
    model: String,
    client: Client,
    retry: RetryPolicy,
}

impl AnthropicProvider {
    /// Builds a client for `model`.
    pub fn new(api_key: &str, model: String, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing Anthropic API key");
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key.trim()).context("invalid Anthropic API key")?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build Anthropic HTTP client")?;
        Ok(Self {
            model,
            client,
            retry,
        })
    }
}

impl LlmProvider for AnthropicProvider {
    fn complete(&self, request: &ProviderRequest<'_>) -> Result<String> {
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: vec![AnthropicContentBlock {
                    kind: "text",
                    text: request.prompt,
                }],
            }],
        };
        debug!(model = %self.model, "calling Anthropic messages API");
        let resp = self.retry.send("Anthropic messages API", || {
            self.client.post(MESSAGES_ENDPOINT).json(&body).send()
        })?;
        let parsed: AnthropicResponse =
            resp.json().context("failed to parse Anthropic response")?;
        parsed.into_answer()
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    temperature: f32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: Vec<AnthropicContentBlock<'a>>,
}

#[derive(Serialize)]
struct AnthropicContentBlock<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicResponseBlock>,
}

impl AnthropicResponse {
    fn into_answer(self) -> Result<String> {
        let texts: Vec<String> = self
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicResponseBlock::Text { text } => Some(text),
                AnthropicResponseBlock::Other => None,
            })
            .collect();
        if texts.is_empty() {
            bail!("Anthropic response missing text content");
        }
        Ok(texts.join("\n"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum AnthropicResponseBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_text_blocks_and_skips_others() {
        let parsed: AnthropicResponse = serde_json::from_str(
            r#"{"content":[
                {"type":"text","text":"storage"},
                {"type":"tool_use","id":"x","name":"y","input":{}},
                {"type":"text","text":"vnet"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(parsed.into_answer().unwrap(), "storage\nvnet");
    }

    #[test]
    fn no_text_blocks_is_an_error() {
        let parsed: AnthropicResponse = serde_json::from_str(r#"{"content":[]}"#).unwrap();
        assert!(parsed.into_answer().is_err());
    }

    #[test]
    fn system_prompt_is_top_level() {
        let body = AnthropicRequest {
            model: "claude",
            max_tokens: 10,
            temperature: 0.0,
            system: "be terse",
            messages: vec![AnthropicMessage {
                role: "user",
                content: vec![AnthropicContentBlock {
                    kind: "text",
                    text: "hello",
                }],
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["system"], "be terse");
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
    }
}
