//! Splits templates into overlapping character windows for embedding.

use text_splitter::{Characters, ChunkConfig, TextSplitter};

use crate::error::{EngineError, Result};
use crate::templates::TemplateDocument;

/// Window sizing for template chunks, measured in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Maximum characters per chunk.
    pub window_chars: usize,
    /// Characters shared between adjacent chunks.
    pub overlap_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            window_chars: 1000,
            overlap_chars: 200,
        }
    }
}

/// Text span cut from a template, tagged with the template's label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position of the chunk within its source template.
    pub index: usize,
    /// Chunk body.
    pub text: String,
    /// Label inherited from the source template.
    pub label: String,
    /// File name of the source template.
    pub source: String,
}

/// Deterministic splitter preferring paragraph, then line, then word boundaries.
pub struct Chunker {
    config: ChunkerConfig,
    splitter: TextSplitter<Characters>,
}

impl Chunker {
    /// Builds a chunker; the overlap must be smaller than the window.
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        if config.window_chars == 0 {
            return Err(EngineError::Configuration(
                "chunk window must be at least one character".to_string(),
            ));
        }
        let chunk_config = ChunkConfig::new(config.window_chars)
            .with_overlap(config.overlap_chars)
            .map_err(|err| {
                EngineError::Configuration(format!(
                    "invalid chunk overlap {} for window {}: {err}",
                    config.overlap_chars, config.window_chars
                ))
            })?
            .with_trim(false);
        Ok(Self {
            config,
            splitter: TextSplitter::new(chunk_config),
        })
    }

    /// Returns the window configuration.
    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Cuts one template into ordered chunks.
    ///
    /// A non-empty template no longer than the window comes back as a single
    /// chunk equal to the whole template.
    pub fn chunk_document(&self, document: &TemplateDocument) -> Vec<Chunk> {
        let text = document.content.as_str();
        if text.is_empty() {
            return Vec::new();
        }

        let pieces: Vec<&str> = if text.chars().count() <= self.config.window_chars {
            vec![text]
        } else {
            self.splitter
                .chunks(text)
                .filter(|piece| !piece.trim().is_empty())
                .collect()
        };

        pieces
            .into_iter()
            .enumerate()
            .map(|(index, piece)| Chunk {
                index,
                text: piece.to_string(),
                label: document.label.clone(),
                source: document.source.clone(),
            })
            .collect()
    }

    /// Chunks every template, preserving template order.
    pub fn chunk_all(&self, documents: &[TemplateDocument]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|document| self.chunk_document(document))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(label: &str, content: &str) -> TemplateDocument {
        TemplateDocument {
            content: content.to_string(),
            source: format!("{label}.tf"),
            label: label.to_string(),
        }
    }

    fn long_template() -> String {
        (0..40)
            .map(|i| {
                format!(
                    "resource \"azurerm_storage_account\" \"sa{i}\" {{\n  name = \"storage{i}\"\n  account_tier = \"Standard\"\n}}"
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    #[test]
    fn short_document_is_a_single_identical_chunk() {
        let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
        let document = doc("storage", "resource \"azurerm_storage_account\" \"sa\" {}\n");
        let chunks = chunker.chunk_document(&document);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, document.content);
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn empty_document_yields_no_chunks() {
        let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
        assert!(chunker.chunk_document(&doc("lb", "")).is_empty());
    }

    #[test]
    fn long_document_respects_window() {
        let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
        let content = long_template();
        let chunks = chunker.chunk_document(&doc("storage", &content));

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 1000));
        assert!(content.starts_with(&chunks[0].text));
        assert!(content.ends_with(&chunks.last().unwrap().text));
        assert!(chunks.iter().enumerate().all(|(i, c)| c.index == i));
    }

    #[test]
    fn every_chunk_keeps_its_template_label() {
        let chunker = Chunker::new(ChunkerConfig {
            window_chars: 120,
            overlap_chars: 30,
        })
        .unwrap();
        let documents = vec![doc("storage", &long_template()), doc("vnet", "vnet body")];
        let chunks = chunker.chunk_all(&documents);

        assert!(chunks.len() > 2);
        for chunk in &chunks {
            let origin = documents.iter().find(|d| d.source == chunk.source).unwrap();
            assert_eq!(chunk.label, origin.label);
        }
    }

    #[test]
    fn chunking_is_deterministic() {
        let chunker = Chunker::new(ChunkerConfig::default()).unwrap();
        let document = doc("aks", &long_template());
        assert_eq!(
            chunker.chunk_document(&document),
            chunker.chunk_document(&document)
        );
    }

    #[test]
    fn overlap_must_be_smaller_than_window() {
        let err = Chunker::new(ChunkerConfig {
            window_chars: 100,
            overlap_chars: 100,
        })
        .err()
        .unwrap();
        assert!(matches!(err, EngineError::Configuration(_)));
    }
}
