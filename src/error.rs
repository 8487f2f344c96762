//! Error taxonomy surfaced by the generation pipeline.

use thiserror::Error;

/// Discriminant of [`EngineError`] so front ends can branch without matching payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Startup problem: credentials, template directory, embedder smoke test.
    Configuration,
    /// Embedding call failed while building the index or embedding a query.
    Embedding,
    /// Query judged out of scope (or the validator itself failed).
    ScopeRejection,
    /// Synthesis call failed or returned nothing usable.
    Generation,
}

/// Errors produced by the engine and its stages.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Startup-time misconfiguration. Fatal.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Embedding provider failure.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The query was rejected before any retrieval happened.
    #[error("Query is out of scope: {reason}")]
    ScopeRejection {
        /// Reason reported by the validator.
        reason: String,
    },

    /// Synthesis failure.
    #[error("Failed to generate Terraform configuration: {0}")]
    Generation(String),
}

impl EngineError {
    /// Kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Embedding(_) => ErrorKind::Embedding,
            Self::ScopeRejection { .. } => ErrorKind::ScopeRejection,
            Self::Generation(_) => ErrorKind::Generation,
        }
    }

    /// True for rejections that should prompt the user for a better query.
    pub fn is_scope_rejection(&self) -> bool {
        self.kind() == ErrorKind::ScopeRejection
    }

    pub(crate) fn embedding(err: anyhow::Error) -> Self {
        Self::Embedding(format!("{err:#}"))
    }

    pub(crate) fn generation(err: anyhow::Error) -> Self {
        Self::Generation(format!("{err:#}"))
    }
}

/// Result alias used across the pipeline.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;
