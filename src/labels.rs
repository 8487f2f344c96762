//! Resource-type labels shared by the template store, the classifier and retrieval.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Closed set of Azure resource categories the generator knows templates for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceLabel {
    /// Virtual machines.
    VirtualMachine,
    /// Azure Kubernetes Service clusters.
    Aks,
    /// Storage accounts.
    Storage,
    /// Virtual networks.
    Vnet,
    /// Load balancers.
    Lb,
}

impl ResourceLabel {
    /// Every label, in declaration order.
    pub const ALL: [ResourceLabel; 5] = [
        ResourceLabel::VirtualMachine,
        ResourceLabel::Aks,
        ResourceLabel::Storage,
        ResourceLabel::Vnet,
        ResourceLabel::Lb,
    ];

    /// Token used in template file names and classifier output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VirtualMachine => "virtual_machine",
            Self::Aks => "aks",
            Self::Storage => "storage",
            Self::Vnet => "vnet",
            Self::Lb => "lb",
        }
    }

    /// Human-readable name shown to users and embedded in prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::VirtualMachine => "Virtual Machines",
            Self::Aks => "AKS (Azure Kubernetes Service)",
            Self::Storage => "Storage Accounts",
            Self::Vnet => "Virtual Networks",
            Self::Lb => "Load Balancers",
        }
    }

    /// Case-insensitive lookup of a label token; `None` for anything outside the set.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        Self::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(token))
    }
}

impl fmt::Display for ResourceLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a token is not one of the five labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabel(pub String);

impl fmt::Display for UnknownLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown resource label '{}'", self.0)
    }
}

impl std::error::Error for UnknownLabel {}

impl FromStr for ResourceLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| UnknownLabel(s.to_string()))
    }
}

/// Labels used whenever classification yields nothing usable.
pub fn fallback_labels() -> BTreeSet<ResourceLabel> {
    BTreeSet::from([ResourceLabel::VirtualMachine, ResourceLabel::Storage])
}

/// Bulleted list of supported resources, one per line.
pub fn supported_resources_list() -> String {
    ResourceLabel::ALL
        .iter()
        .map(|label| format!("- {}", label.display_name()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Predicate over chunk labels restricting which chunks retrieval may return.
///
/// An empty filter matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelFilter {
    labels: BTreeSet<ResourceLabel>,
}

impl LabelFilter {
    /// Builds a filter admitting exactly the given labels.
    pub fn new(labels: impl IntoIterator<Item = ResourceLabel>) -> Self {
        Self {
            labels: labels.into_iter().collect(),
        }
    }

    /// Labels admitted by this filter.
    pub fn labels(&self) -> &BTreeSet<ResourceLabel> {
        &self.labels
    }

    /// True when no label is admitted.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Whether a chunk carrying the raw `label` passes the filter.
    ///
    /// Labels outside the known set never match.
    pub fn matches(&self, label: &str) -> bool {
        ResourceLabel::parse(label).is_some_and(|parsed| self.labels.contains(&parsed))
    }
}
