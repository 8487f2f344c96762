//! OpenAI-based embedding client implementation.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Embedder;
use crate::retry::RetryPolicy;

/// Blocking embeddings client that talks to OpenAI-compatible endpoints.
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: Option<usize>,
    retry: RetryPolicy,
    batch_size: usize,
}

impl OpenAiEmbedder {
    /// Builds a new OpenAI embeddings client.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: String,
        dimensions: Option<usize>,
        timeout: Duration,
        retry: RetryPolicy,
        batch_size: usize,
    ) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing OpenAI API key");
        anyhow::ensure!(!model.trim().is_empty(), "missing OpenAI embedding model name");
        let mut headers = reqwest::header::HeaderMap::new();
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
            client,
            endpoint: embeddings_endpoint(base_url),
            model,
            dimensions,
            retry,
            batch_size: batch_size.max(1),
        })
    }

    /// Embedding model identifier.
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Embedder for OpenAiEmbedder {
    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        anyhow::ensure!(
            inputs.len() <= self.batch_size,
            "batch of {} exceeds configured max {}",
            inputs.len(),
            self.batch_size
        );

        let request = EmbeddingRequest {
            model: &self.model,
            input: inputs,
            dimensions: self.dimensions,
        };
        debug!(model = %self.model, inputs = inputs.len(), "requesting embeddings");
        let resp = self.retry.send("OpenAI embeddings", || {
            self.client.post(&self.endpoint).json(&request).send()
        })?;
        let parsed: EmbeddingResponse = resp
            .json()
            .context("failed to parse OpenAI embedding response")?;
        parsed.into_vectors(inputs.len())
    }
}

fn embeddings_endpoint(base_url: &str) -> String {
    format!("{}/embeddings", base_url.trim_end_matches('/'))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    #[serde(borrow)]
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

impl EmbeddingResponse {
    fn into_vectors(mut self, expected: usize) -> Result<Vec<Vec<f32>>> {
        self.data.sort_by_key(|entry| entry.index);
        anyhow::ensure!(
            self.data.len() == expected,
            "OpenAI returned {} embeddings for {} inputs",
            self.data.len(),
            expected
        );
        Ok(self.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
