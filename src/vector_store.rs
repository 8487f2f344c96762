//! In-memory similarity index over embedded template chunks.

use std::cmp::Ordering;

use tracing::{debug, info};

use crate::chunker::Chunk;
use crate::embedder::Embedder;
use crate::embeddings::{cosine_similarity, EmbeddedChunk};
use crate::error::{EngineError, Result};
use crate::labels::LabelFilter;

/// Chunk returned by a similarity search.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    /// Chunk body.
    pub text: String,
    /// Chunk label.
    pub label: String,
    /// Source template file name.
    pub source: String,
    /// Cosine similarity to the query.
    pub score: f32,
}

/// Read-only index built once at startup.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingIndex {
    records: Vec<EmbeddedChunk>,
}

impl EmbeddingIndex {
    /// Embeds every chunk in batches and stores (embedding, text, label) triples.
    pub fn build(chunks: &[Chunk], embedder: &dyn Embedder) -> Result<Self> {
        let batch_size = embedder.batch_size().max(1);
        let mut records = Vec::with_capacity(chunks.len());
        let mut dimensions: Option<usize> = None;

        for batch in chunks.chunks(batch_size) {
            let inputs: Vec<&str> = batch.iter().map(|chunk| chunk.text.as_str()).collect();
            let vectors = embedder.embed_batch(&inputs).map_err(EngineError::embedding)?;
            if vectors.len() != batch.len() {
                return Err(EngineError::Embedding(format!(
                    "embedding provider returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                )));
            }
            for (chunk, embedding) in batch.iter().zip(vectors) {
                let expected = *dimensions.get_or_insert(embedding.len());
                if embedding.is_empty() || embedding.len() != expected {
                    return Err(EngineError::Embedding(format!(
                        "inconsistent embedding dimensions for {} (got {}, expected {})",
                        chunk.source,
                        embedding.len(),
                        expected
                    )));
                }
                records.push(EmbeddedChunk {
                    text: chunk.text.clone(),
                    label: chunk.label.clone(),
                    source: chunk.source.clone(),
                    embedding,
                });
            }
            debug!(batch = batch.len(), total = records.len(), "embedded chunk batch");
        }

        info!(chunks = records.len(), "embedding index built");
        Ok(Self { records })
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing was indexed.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Indexed records, in insertion order.
    pub fn records(&self) -> &[EmbeddedChunk] {
        &self.records
    }

    /// Returns up to `k` chunks admitted by `filter`, most similar first.
    ///
    /// The query is only embedded when at least one chunk passes the filter.
    pub fn search(
        &self,
        embedder: &dyn Embedder,
        query: &str,
        k: usize,
        filter: &LabelFilter,
    ) -> Result<Vec<RetrievedChunk>> {
        let candidates: Vec<&EmbeddedChunk> = self
            .records
            .iter()
            .filter(|record| filter.matches(&record.label))
            .collect();
        if k == 0 || candidates.is_empty() {
            debug!(k, candidates = candidates.len(), "search skipped");
            return Ok(Vec::new());
        }

        let query_vector = embedder.embed_query(query).map_err(EngineError::embedding)?;
        let mut scored: Vec<(f32, &EmbeddedChunk)> = candidates
            .into_iter()
            .map(|record| (cosine_similarity(&query_vector, &record.embedding), record))
            .collect();
        // stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, record)| RetrievedChunk {
                text: record.text.clone(),
                label: record.label.clone(),
                source: record.source.clone(),
                score,
            })
            .collect())
    }
}
