//! Orchestrator: validate, classify, retrieve, synthesize.
//!
//! Each request makes one linear pass through [`Stage`]s. A rejected query
//! stops at validation and no later stage runs. A stage failure is returned
//! as-is and nothing is retried here. Only successful passes hand back their
//! stage history ([`Generation::stages`]); a failed pass is logged at warn
//! with the stage it failed in.

use tracing::{debug, info, warn};

use crate::chunker::Chunker;
use crate::classifier::{Classification, ResourceClassifier};
use crate::config::{EngineConfig, ProviderConfig};
use crate::conversation::{generated_message, Conversation, Role};
use crate::embedder::Embedder;
use crate::error::{EngineError, Result};
use crate::llm::{LlmProvider, SamplingSettings};
use crate::synthesis::SynthesisChain;
use crate::templates::TemplateStore;
use crate::validator::{QueryValidator, Verdict};
use crate::vector_store::{EmbeddingIndex, RetrievedChunk};

/// Pipeline position for a single request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Waiting for a query.
    Idle,
    /// Asking the model whether the query is in scope.
    Validating,
    /// Mapping the query to resource labels.
    Classifying,
    /// Searching the index.
    Retrieving,
    /// Generating the configuration.
    Synthesizing,
    /// Configuration produced.
    Done,
    /// Query judged out of scope.
    Rejected,
    /// An external call failed.
    Failed,
}

impl Stage {
    /// True for `Done`, `Rejected` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Rejected | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_advance_to(&self, next: Stage) -> bool {
        use Stage::*;
        match (self, next) {
            (Idle, Validating)
            | (Validating, Rejected)
            | (Validating, Classifying)
            | (Classifying, Retrieving)
            | (Retrieving, Synthesizing)
            | (Synthesizing, Done) => true,
            (current, Failed) => !current.is_terminal(),
            _ => false,
        }
    }
}

struct StageTracker {
    current: Stage,
    history: Vec<Stage>,
}

impl StageTracker {
    fn new() -> Self {
        Self {
            current: Stage::Idle,
            history: vec![Stage::Idle],
        }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(
            self.current.can_advance_to(next),
            "illegal stage transition {:?} -> {:?}",
            self.current,
            next
        );
        debug!(from = ?self.current, to = ?next, "stage transition");
        self.current = next;
        self.history.push(next);
    }

    fn fail(&mut self, err: &EngineError) {
        warn!(stage = ?self.current, kind = ?err.kind(), error = %err, "pipeline failed");
        self.advance(Stage::Failed);
    }

    fn into_history(self) -> Vec<Stage> {
        self.history
    }
}

/// Everything gathered before synthesis.
#[derive(Debug, Clone)]
pub struct Retrieval {
    /// Scope verdict (always in scope once returned).
    pub verdict: Verdict,
    /// Labels used for filtering.
    pub classification: Classification,
    /// Chunks handed to synthesis, most similar first.
    pub context: Vec<RetrievedChunk>,
}

/// Result of a full pass.
#[derive(Debug, Clone)]
pub struct Generation {
    /// Generated Terraform text.
    pub configuration: String,
    /// Validation, classification and retrieval details.
    pub retrieval: Retrieval,
    /// Stages visited, starting at `Idle` and ending at `Done`. Failed
    /// passes return an [`EngineError`] instead.
    pub stages: Vec<Stage>,
}

/// Retrieval-augmented Terraform generator.
pub struct Engine {
    index: EmbeddingIndex,
    embedder: Box<dyn Embedder>,
    llm: Box<dyn LlmProvider>,
    top_k: usize,
    sampling: SamplingSettings,
    template_count: usize,
}

impl Engine {
    /// Builds the engine with real provider clients.
    ///
    /// Templates are loaded before any client is created, so a bad template
    /// directory fails without touching the network.
    pub fn from_config(config: &EngineConfig, providers: &ProviderConfig) -> Result<Self> {
        let store = TemplateStore::load(&config.template_dir)?;
        let embedder = providers.build_embedder()?;
        let llm = providers.build_llm()?;
        Self::with_store(config, store, Box::new(embedder), llm)
    }

    /// Builds the engine around caller-supplied providers.
    pub fn new(
        config: &EngineConfig,
        embedder: Box<dyn Embedder>,
        llm: Box<dyn LlmProvider>,
    ) -> Result<Self> {
        let store = TemplateStore::load(&config.template_dir)?;
        Self::with_store(config, store, embedder, llm)
    }

    fn with_store(
        config: &EngineConfig,
        store: TemplateStore,
        embedder: Box<dyn Embedder>,
        llm: Box<dyn LlmProvider>,
    ) -> Result<Self> {
        let chunker = Chunker::new(config.chunker)?;
        smoke_test(embedder.as_ref())?;

        let chunks = chunker.chunk_all(store.documents());
        if chunks.is_empty() {
            warn!(dir = %store.dir().display(), "no template chunks to index; context will be empty");
        }
        let index = EmbeddingIndex::build(&chunks, embedder.as_ref())?;
        info!(
            templates = store.len(),
            chunks = index.len(),
            top_k = config.top_k,
            "engine ready"
        );

        Ok(Self {
            index,
            embedder,
            llm,
            top_k: config.top_k,
            sampling: config.sampling,
            template_count: store.len(),
        })
    }

    /// Number of templates loaded at startup.
    pub fn template_count(&self) -> usize {
        self.template_count
    }

    /// The read-only chunk index.
    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    /// Generates a configuration for `query`.
    pub fn generate(&self, query: &str) -> Result<String> {
        self.run(query).map(|generation| generation.configuration)
    }

    /// Runs validation, classification and retrieval, stopping before synthesis.
    pub fn retrieve(&self, query: &str) -> Result<Retrieval> {
        let mut tracker = StageTracker::new();
        self.prepare(query, &mut tracker)
    }

    /// Full pass with stage history and intermediate results.
    pub fn run(&self, query: &str) -> Result<Generation> {
        let mut tracker = StageTracker::new();
        let retrieval = self.prepare(query, &mut tracker)?;

        tracker.advance(Stage::Synthesizing);
        let configuration = SynthesisChain::new(self.llm.as_ref(), self.sampling)
            .synthesize(query, &retrieval.context)
            .inspect_err(|err| tracker.fail(err))?;
        tracker.advance(Stage::Done);
        info!(
            chars = configuration.len(),
            context_chunks = retrieval.context.len(),
            "configuration generated"
        );

        Ok(Generation {
            configuration,
            retrieval,
            stages: tracker.into_history(),
        })
    }

    /// Runs a pass and records it in `conversation`.
    ///
    /// The user turn is always appended. A success appends the generated
    /// configuration; a scope rejection appends a warning; other failures
    /// append nothing further.
    pub fn respond(&self, query: &str, conversation: &mut Conversation) -> Result<Generation> {
        conversation.push(Role::User, query);
        let result = self.run(query);
        match &result {
            Ok(generation) => {
                conversation.push(Role::Assistant, generated_message(&generation.configuration))
            }
            Err(err) if err.is_scope_rejection() => {
                conversation.push(Role::Assistant, format!("⚠️ {err}"))
            }
            Err(_) => {}
        }
        result
    }

    fn prepare(&self, query: &str, tracker: &mut StageTracker) -> Result<Retrieval> {
        tracker.advance(Stage::Validating);
        let verdict = if query.trim().is_empty() {
            Verdict::rejected("Query is empty")
        } else {
            QueryValidator::new(self.llm.as_ref(), self.sampling).validate(query)
        };
        if !verdict.in_scope {
            tracker.advance(Stage::Rejected);
            info!(reason = %verdict.reason, "query rejected");
            return Err(EngineError::ScopeRejection {
                reason: verdict.reason,
            });
        }

        tracker.advance(Stage::Classifying);
        let classification =
            ResourceClassifier::new(self.llm.as_ref(), self.sampling).classify(query);

        tracker.advance(Stage::Retrieving);
        let filter = classification.filter();
        let context = self
            .index
            .search(self.embedder.as_ref(), query, self.top_k, &filter)
            .inspect_err(|err| tracker.fail(err))?;
        debug!(
            labels = ?filter.labels(),
            hits = context.len(),
            "retrieved context"
        );

        Ok(Retrieval {
            verdict,
            classification,
            context,
        })
    }
}

fn smoke_test(embedder: &dyn Embedder) -> Result<()> {
    let vector = embedder.embed_query("test").map_err(|err| {
        EngineError::Configuration(format!("Failed to initialize embeddings: {err:#}"))
    })?;
    if vector.is_empty() {
        return Err(EngineError::Configuration(
            "Failed to initialize embeddings: provider returned an empty vector".to_string(),
        ));
    }
    Ok(())
}
