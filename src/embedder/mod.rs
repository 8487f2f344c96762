//! Embedding providers used to index templates and embed queries.

use anyhow::Result;

pub mod openai;

pub use openai::OpenAiEmbedder;

/// Text-to-vector model consulted at index build time and per query.
pub trait Embedder: Send + Sync {
    /// Embeds a batch of inputs, returning one vector per input in order.
    fn embed_batch(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>>;

    /// Largest batch accepted by [`Embedder::embed_batch`].
    fn batch_size(&self) -> usize;

    /// Embeds a single query string.
    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("embedding provider returned no vector"))
    }
}
