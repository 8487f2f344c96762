//! Maps a request onto the resource labels used to scope retrieval.

use std::collections::BTreeSet;

use tracing::{debug, warn};

use crate::labels::{fallback_labels, LabelFilter, ResourceLabel};
use crate::llm::{LlmProvider, SamplingSettings};

/// Instruction sent with every classification call.
pub const CLASSIFIER_INSTRUCTIONS: &str = "\
Analyze the user's infrastructure requirements and identify which Azure resource types are needed.
Return a comma-separated list of resource types from these options only: virtual_machine, aks, storage, vnet, lb.
Example: \"storage,vnet\" if user needs storage and networking.";

/// Labels extracted from a classifier response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// Recognised labels.
    pub labels: BTreeSet<ResourceLabel>,
    /// Tokens outside the label set, kept for diagnostics only.
    pub unrecognized: Vec<String>,
    /// True when `labels` is the fallback set rather than model output.
    pub used_fallback: bool,
}

impl Classification {
    /// The default `{virtual_machine, storage}` classification.
    pub fn fallback() -> Self {
        Self {
            labels: fallback_labels(),
            unrecognized: Vec::new(),
            used_fallback: true,
        }
    }

    /// Retrieval filter for this classification.
    ///
    /// When no token was recognised the fallback set is used, so retrieval
    /// always has a non-empty filter.
    pub fn filter(&self) -> LabelFilter {
        if self.labels.is_empty() {
            LabelFilter::new(fallback_labels())
        } else {
            LabelFilter::new(self.labels.iter().copied())
        }
    }
}

/// Splits a comma-separated label list. An empty response yields the fallback.
pub fn parse_labels(response: &str) -> Classification {
    if response.trim().is_empty() {
        return Classification::fallback();
    }

    let mut labels = BTreeSet::new();
    let mut unrecognized = Vec::new();
    for token in response.split(',').map(str::trim) {
        if token.is_empty() {
            continue;
        }
        match ResourceLabel::parse(token) {
            Some(label) => {
                labels.insert(label);
            }
            None => unrecognized.push(token.to_string()),
        }
    }

    Classification {
        labels,
        unrecognized,
        used_fallback: false,
    }
}

/// Language-model backed resource classifier.
pub struct ResourceClassifier<'a> {
    llm: &'a dyn LlmProvider,
    sampling: SamplingSettings,
}

impl<'a> ResourceClassifier<'a> {
    /// Builds a classifier over `llm`.
    pub fn new(llm: &'a dyn LlmProvider, sampling: SamplingSettings) -> Self {
        Self { llm, sampling }
    }

    /// Classifies `query`; call failures fall back to `{virtual_machine, storage}`.
    pub fn classify(&self, query: &str) -> Classification {
        let request = self.sampling.request(CLASSIFIER_INSTRUCTIONS, query);
        let classification = match self.llm.complete(&request) {
            Ok(response) => parse_labels(&response),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "classifier call failed; using fallback labels");
                Classification::fallback()
            }
        };
        if !classification.unrecognized.is_empty() {
            warn!(tokens = ?classification.unrecognized, "classifier returned unknown labels");
        }
        debug!(
            labels = ?classification.labels,
            fallback = classification.used_fallback,
            "query classified"
        );
        classification
    }
}
