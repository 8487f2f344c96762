//! Command-line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::chunker::ChunkerConfig;
use crate::embedder::OpenAiEmbedder;
use crate::error::{EngineError, Result};
use crate::llm::{
    AnthropicProvider, LlmProvider, OpenAiProvider, ProviderKind, SamplingSettings,
};
use crate::retry::RetryPolicy;

/// Pipeline settings that don't involve credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Directory holding the reference `.tf` templates.
    pub template_dir: PathBuf,
    /// Chunk window sizing.
    pub chunker: ChunkerConfig,
    /// Chunks retrieved per query.
    pub top_k: usize,
    /// Sampling applied to every model call.
    pub sampling: SamplingSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            template_dir: PathBuf::from("templates"),
            chunker: ChunkerConfig::default(),
            top_k: 5,
            sampling: SamplingSettings::default(),
        }
    }
}

/// Credentials and transport settings for the embedding and chat providers.
#[derive(Clone)]
pub struct ProviderConfig {
    /// Chat backend.
    pub llm_provider: ProviderKind,
    /// OpenAI key; required for embeddings and the OpenAI chat backend.
    pub openai_api_key: Option<String>,
    /// Base URL for OpenAI-compatible endpoints.
    pub openai_base_url: String,
    /// OpenAI chat model.
    pub chat_model: String,
    /// Anthropic key; required when `llm_provider` is Anthropic.
    pub anthropic_api_key: Option<String>,
    /// Anthropic chat model.
    pub anthropic_model: String,
    /// Embedding model.
    pub embedding_model: String,
    /// Optional embedding dimension override.
    pub embedding_dimensions: Option<usize>,
    /// Inputs per embedding request.
    pub embed_batch_size: usize,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Transport retry policy.
    pub retry: RetryPolicy,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            llm_provider: ProviderKind::OpenAi,
            openai_api_key: None,
            openai_base_url: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-4o".to_string(),
            anthropic_api_key: None,
            anthropic_model: "claude-3-sonnet-20240229".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: None,
            embed_batch_size: 32,
            timeout: Duration::from_secs(60),
            retry: RetryPolicy::default(),
        }
    }
}

impl ProviderConfig {
    /// Builds the embedding client. Requires `OPENAI_API_KEY`.
    pub fn build_embedder(&self) -> Result<OpenAiEmbedder> {
        let key = require_key(self.openai_api_key.as_deref(), "OPENAI_API_KEY")?;
        OpenAiEmbedder::new(
            key,
            &self.openai_base_url,
            self.embedding_model.clone(),
            self.embedding_dimensions,
            self.timeout,
            self.retry,
            self.embed_batch_size,
        )
        .map_err(|err| EngineError::Configuration(format!("{err:#}")))
    }

    /// Builds the chat client for the selected backend.
    pub fn build_llm(&self) -> Result<Box<dyn LlmProvider>> {
        let provider: Box<dyn LlmProvider> = match self.llm_provider {
            ProviderKind::OpenAi => {
                let key = require_key(self.openai_api_key.as_deref(), "OPENAI_API_KEY")?;
                Box::new(
                    OpenAiProvider::new(
                        key,
                        &self.openai_base_url,
                        self.chat_model.clone(),
                        self.timeout,
                        self.retry,
                    )
                    .map_err(|err| EngineError::Configuration(format!("{err:#}")))?,
                )
            }
            ProviderKind::Anthropic => {
                let key = require_key(self.anthropic_api_key.as_deref(), "ANTHROPIC_API_KEY")?;
                Box::new(
                    AnthropicProvider::new(
                        key,
                        self.anthropic_model.clone(),
                        self.timeout,
                        self.retry,
                    )
                    .map_err(|err| EngineError::Configuration(format!("{err:#}")))?,
                )
            }
        };
        Ok(provider)
    }
}

fn require_key<'a>(key: Option<&'a str>, env_var: &str) -> Result<&'a str> {
    key.map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| EngineError::Configuration(format!("Missing {env_var} environment variable")))
}

/// Command-line interface for the `infragen` binary.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "infragen",
    about = "Generate Azure Terraform from a plain-language description using reference templates"
)]
pub struct Cli {
    /// Describe the infrastructure and exit after one answer (omit for interactive mode)
    #[arg(long, short)]
    pub query: Option<String>,

    /// Directory of reference .tf templates
    #[arg(long, env = "INFRAGEN_TEMPLATES", default_value = "templates")]
    pub templates: PathBuf,

    /// Write each generated configuration to this file
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Only print the classification and retrieved context (skip generation)
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,

    /// Number of template chunks retrieved per request
    #[arg(long, env = "INFRAGEN_TOP_K", default_value_t = 5)]
    pub top_k: usize,

    /// Characters per template chunk
    #[arg(long, env = "INFRAGEN_CHUNK_SIZE", default_value_t = 1000)]
    pub chunk_size: usize,

    /// Characters shared by adjacent chunks
    #[arg(long, env = "INFRAGEN_CHUNK_OVERLAP", default_value_t = 200)]
    pub chunk_overlap: usize,

    /// Chat backend (openai or anthropic)
    #[arg(long, env = "INFRAGEN_LLM_PROVIDER", value_enum, default_value_t = ProviderKind::OpenAi)]
    pub llm_provider: ProviderKind,

    /// OpenAI API key (embeddings, and chat when the provider is openai)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Base URL for OpenAI-compatible endpoints
    #[arg(long, env = "INFRAGEN_OPENAI_BASE", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    /// OpenAI chat model
    #[arg(long, env = "INFRAGEN_CHAT_MODEL", default_value = "gpt-4o")]
    pub chat_model: String,

    /// Anthropic API key (required when --llm-provider anthropic)
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    /// Anthropic model identifier
    #[arg(long, env = "INFRAGEN_ANTHROPIC_MODEL", default_value = "claude-3-sonnet-20240229")]
    pub anthropic_model: String,

    /// Embedding model identifier
    #[arg(long, env = "INFRAGEN_EMBEDDING_MODEL", default_value = "text-embedding-3-small")]
    pub embedding_model: String,

    /// Optional embedding dimension override
    #[arg(long, env = "INFRAGEN_EMBEDDING_DIMENSIONS")]
    pub embedding_dimensions: Option<usize>,

    /// Max chunks per embedding request
    #[arg(long, env = "INFRAGEN_EMBED_BATCH", default_value_t = 32)]
    pub embed_batch_size: usize,

    /// Sampling temperature for every model call
    #[arg(long, env = "INFRAGEN_TEMPERATURE", default_value_t = 0.0)]
    pub temperature: f32,

    /// Maximum tokens requested from the chat model
    #[arg(long, env = "INFRAGEN_MAX_COMPLETION_TOKENS", default_value_t = 4096)]
    pub max_completion_tokens: usize,

    /// Seconds before a provider request times out
    #[arg(long, env = "INFRAGEN_TIMEOUT_SECS", default_value_t = 60)]
    pub timeout_secs: u64,

    /// Attempts per provider request, including the first
    #[arg(long, env = "INFRAGEN_MAX_RETRIES", default_value_t = 3)]
    pub max_retries: usize,

    /// Log filter (tracing EnvFilter syntax)
    #[arg(long, env = "INFRAGEN_LOG", default_value = "info")]
    pub log: String,
}

impl Cli {
    /// Pipeline settings derived from the parsed flags.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            template_dir: self.templates.clone(),
            chunker: ChunkerConfig {
                window_chars: self.chunk_size,
                overlap_chars: self.chunk_overlap,
            },
            top_k: self.top_k,
            sampling: SamplingSettings {
                temperature: self.temperature,
                max_tokens: self.max_completion_tokens.max(1),
            },
        }
    }

    /// Provider settings derived from the parsed flags.
    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            llm_provider: self.llm_provider,
            openai_api_key: self.openai_api_key.clone(),
            openai_base_url: self.openai_base_url.clone(),
            chat_model: self.chat_model.clone(),
            anthropic_api_key: self.anthropic_api_key.clone(),
            anthropic_model: self.anthropic_model.clone(),
            embedding_model: self.embedding_model.clone(),
            embedding_dimensions: self.embedding_dimensions,
            embed_batch_size: self.embed_batch_size.max(1),
            timeout: Duration::from_secs(self.timeout_secs.max(1)),
            retry: RetryPolicy::new(self.max_retries, Duration::from_millis(500)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_onto_configs() {
        let cli = Cli::try_parse_from([
            "infragen",
            "--templates",
            "/srv/templates",
            "--top-k",
            "3",
            "--chunk-size",
            "500",
            "--chunk-overlap",
            "50",
            "--llm-provider",
            "anthropic",
            "--anthropic-api-key",
            "ak",
            "--max-retries",
            "0",
        ])
        .unwrap();

        let engine = cli.engine_config();
        assert_eq!(engine.template_dir, PathBuf::from("/srv/templates"));
        assert_eq!(engine.top_k, 3);
        assert_eq!(engine.chunker.window_chars, 500);
        assert_eq!(engine.chunker.overlap_chars, 50);

        let providers = cli.provider_config();
        assert_eq!(providers.llm_provider, ProviderKind::Anthropic);
        assert_eq!(providers.retry.max_attempts(), 1);
        assert!(providers.build_llm().is_ok());
    }

    #[test]
    fn missing_openai_key_is_configuration_error() {
        let providers = ProviderConfig::default();
        let err = providers.build_embedder().err().unwrap();
        assert!(matches!(err, EngineError::Configuration(_)));
        assert!(err.to_string().contains("OPENAI_API_KEY"));
        assert!(providers.build_llm().is_err());
    }

    #[test]
    fn anthropic_backend_needs_its_own_key() {
        let providers = ProviderConfig {
            llm_provider: ProviderKind::Anthropic,
            openai_api_key: Some("sk-test".to_string()),
            ..ProviderConfig::default()
        };
        assert!(providers.build_embedder().is_ok());
        let err = providers.build_llm().err().unwrap();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn defaults_are_deterministic_sampling() {
        let config = EngineConfig::default();
        assert_eq!(config.sampling.temperature, 0.0);
        assert_eq!(config.top_k, 5);
        assert_eq!(config.chunker, ChunkerConfig::default());
    }
}
