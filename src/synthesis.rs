//! Final generation step: retrieved context plus the request in, Terraform out.

use tracing::debug;

use crate::error::{EngineError, Result};
use crate::llm::{LlmProvider, SamplingSettings};
use crate::vector_store::RetrievedChunk;

const SYNTHESIS_PREAMBLE: &str = "\
You are a Terraform expert. Using the provided reference templates, generate a complete Terraform configuration for Azure.
The configuration should:
1. Include all necessary variable declarations
2. Follow Terraform best practices
3. Include helpful comments
4. Be properly formatted
5. Maintain consistency with the reference templates

Context: ";

/// Joins retrieved chunk bodies with blank lines, in retrieval order.
pub fn render_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// System instruction with `context` embedded.
pub fn build_system_prompt(context: &str) -> String {
    let mut prompt = String::with_capacity(SYNTHESIS_PREAMBLE.len() + context.len());
    prompt.push_str(SYNTHESIS_PREAMBLE);
    prompt.push_str(context);
    prompt
}

/// Prompts the model for a configuration grounded in retrieved templates.
pub struct SynthesisChain<'a> {
    llm: &'a dyn LlmProvider,
    sampling: SamplingSettings,
}

impl<'a> SynthesisChain<'a> {
    /// Builds a chain over `llm`.
    pub fn new(llm: &'a dyn LlmProvider, sampling: SamplingSettings) -> Self {
        Self { llm, sampling }
    }

    /// Returns the model's configuration text for `query`.
    ///
    /// An empty `context` is allowed; the model then works from the request alone.
    pub fn synthesize(&self, query: &str, context: &[RetrievedChunk]) -> Result<String> {
        let system = build_system_prompt(&render_context(context));
        debug!(
            context_chunks = context.len(),
            prompt_chars = system.len(),
            "synthesizing configuration"
        );
        let request = self.sampling.request(&system, query);
        let answer = self.llm.complete(&request).map_err(EngineError::generation)?;
        if answer.trim().is_empty() {
            return Err(EngineError::Generation(
                "No response generated from the model".to_string(),
            ));
        }
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ProviderRequest;
    use std::sync::Mutex;

    struct Recording {
        answer: &'static str,
        seen: Mutex<Vec<String>>,
    }

    impl LlmProvider for Recording {
        fn complete(&self, request: &ProviderRequest<'_>) -> anyhow::Result<String> {
            self.seen.lock().unwrap().push(request.system.to_string());
            Ok(self.answer.to_string())
        }
    }

    fn retrieved(text: &str) -> RetrievedChunk {
        RetrievedChunk {
            text: text.to_string(),
            label: "storage".to_string(),
            source: "storage.tf".to_string(),
            score: 1.0,
        }
    }

    #[test]
    fn context_is_joined_in_order() {
        let chunks = [retrieved("first"), retrieved("second")];
        assert_eq!(render_context(&chunks), "first\n\nsecond");
        assert_eq!(render_context(&[]), "");
    }

    #[test]
    fn prompt_embeds_context() {
        let llm = Recording {
            answer: "resource \"azurerm_storage_account\" \"main\" {}",
            seen: Mutex::new(Vec::new()),
        };
        let out = SynthesisChain::new(&llm, SamplingSettings::default())
            .synthesize("storage please", &[retrieved("account_tier = \"Premium\"")])
            .unwrap();
        assert!(out.contains("azurerm_storage_account"));
        let seen = llm.seen.lock().unwrap();
        assert!(seen[0].starts_with("You are a Terraform expert."));
        assert!(seen[0].ends_with("Context: account_tier = \"Premium\""));
    }

    #[test]
    fn blank_answer_is_generation_error() {
        let llm = Recording {
            answer: "   ",
            seen: Mutex::new(Vec::new()),
        };
        let err = SynthesisChain::new(&llm, SamplingSettings::default())
            .synthesize("vm", &[])
            .unwrap_err();
        assert!(matches!(err, EngineError::Generation(_)));
    }
}
