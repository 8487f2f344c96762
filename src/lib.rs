#![warn(missing_docs)]
//! Retrieval-augmented generator for Azure Terraform configurations.
//!
//! Reference `.tf` templates are chunked and embedded once at startup. Each
//! request is scope-checked, classified into resource labels, matched against
//! the label-filtered index, and handed to a chat model together with the
//! retrieved context.

pub mod chunker;
pub mod classifier;
pub mod config;
pub mod conversation;
pub mod embedder;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod labels;
pub mod llm;
pub mod logging;
pub mod retry;
pub mod synthesis;
pub mod templates;
pub mod validator;
pub mod vector_store;

pub use chunker::{Chunk, Chunker, ChunkerConfig};
pub use classifier::{Classification, ResourceClassifier};
pub use config::{Cli, EngineConfig, ProviderConfig};
pub use conversation::{Conversation, Message, Role};
pub use embedder::{Embedder, OpenAiEmbedder};
pub use embeddings::EmbeddedChunk;
pub use engine::{Engine, Generation, Retrieval, Stage};
pub use error::{EngineError, ErrorKind, Result};
pub use labels::{LabelFilter, ResourceLabel};
pub use llm::{LlmProvider, ProviderKind, ProviderRequest, SamplingSettings};
pub use retry::RetryPolicy;
pub use synthesis::SynthesisChain;
pub use templates::{TemplateDocument, TemplateStore};
pub use validator::{QueryValidator, Verdict};
pub use vector_store::{EmbeddingIndex, RetrievedChunk};
