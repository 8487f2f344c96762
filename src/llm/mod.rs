//! Chat-completion providers used by the validator, classifier and synthesis stages.

use anyhow::Result;
use clap::ValueEnum;

mod anthropic;
mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

/// Trait implemented by concrete LLM providers.
pub trait LlmProvider: Send + Sync {
    /// Sends one system + user exchange and returns the raw assistant text.
    fn complete(&self, request: &ProviderRequest<'_>) -> Result<String>;
}

/// Request envelope shared by the various providers.
#[derive(Debug, Clone, Copy)]
pub struct ProviderRequest<'a> {
    /// Fixed instruction for the stage.
    pub system: &'a str,
    /// User-facing content (the query, optionally with context).
    pub prompt: &'a str,
    /// Sampling temperature; zero for reproducible output.
    pub temperature: f32,
    /// Completion token cap.
    pub max_tokens: usize,
}

/// Sampling knobs applied to every stage's model call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingSettings {
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token cap.
    pub max_tokens: usize,
}

impl Default for SamplingSettings {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_tokens: 4096,
        }
    }
}

impl SamplingSettings {
    /// Builds a request for one stage call.
    pub fn request<'a>(&self, system: &'a str, prompt: &'a str) -> ProviderRequest<'a> {
        ProviderRequest {
            system,
            prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Supported chat backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderKind {
    /// OpenAI chat completions (default).
    #[value(name = "openai")]
    OpenAi,
    /// Anthropic messages API.
    Anthropic,
}
