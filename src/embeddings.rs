//! Shared embedding data structures used across pipeline stages.

use serde::{Deserialize, Serialize};

/// Chunk stored in the index together with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    /// Chunk body submitted to the embedding model.
    pub text: String,
    /// Label inherited from the source template.
    pub label: String,
    /// Source template file name.
    pub source: String,
    /// Model embedding vector.
    pub embedding: Vec<f32>,
}

/// Cosine similarity in `[-1, 1]`; zero when either vector has no magnitude
/// or the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
