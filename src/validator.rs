//! Scope check run before any retrieval work.
//!
//! The model is asked for a two-line verdict (`valid: <bool>` / `reason: <text>`).
//! Parsing is strict and isolated in [`parse_validation`]; the stage fails
//! closed whenever the verdict cannot be read or the call itself fails.

use tracing::{debug, warn};

use crate::llm::{LlmProvider, SamplingSettings};

/// Instruction sent with every validation call.
pub const VALIDATION_INSTRUCTIONS: &str = "\
You are a query validator for an Azure Infrastructure Generator.
Determine if the user's query is about Azure infrastructure deployment and within the scope of these resources:
- Virtual Machines
- AKS (Azure Kubernetes Service)
- Storage Accounts
- Virtual Networks
- Load Balancers

Respond with only true or false, followed by a brief reason.
Format: valid: <true/false>
reason: <brief explanation>

Examples of valid queries:
- \"Create a virtual machine with 2 cores\"
- \"Set up a storage account with private endpoints\"
- \"Deploy an AKS cluster with 3 nodes\"

Examples of invalid queries:
- \"What's the weather today?\"
- \"Help me with my homework\"
- \"How do I cook pasta?\"";

/// Reason reported when the model's answer has no `valid:` line.
pub const INVALID_FORMAT_REASON: &str = "Invalid query format";

/// Outcome of reading the model's raw verdict text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationParse {
    /// A `valid:` line was found.
    Parsed {
        /// Whether the `valid:` line mentions `true`.
        valid: bool,
        /// Text after `reason:`, or empty when absent.
        reason: String,
    },
    /// No `valid:` line was present.
    ParseFailure,
}

/// Scope decision handed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// True when the query may proceed.
    pub in_scope: bool,
    /// Explanation shown to the user on rejection.
    pub reason: String,
}

impl Verdict {
    /// Rejection carrying `reason`.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            in_scope: false,
            reason: reason.into(),
        }
    }
}

impl From<ValidationParse> for Verdict {
    fn from(parse: ValidationParse) -> Self {
        match parse {
            ValidationParse::Parsed { valid, reason } => Self {
                in_scope: valid,
                reason,
            },
            ValidationParse::ParseFailure => Self::rejected(INVALID_FORMAT_REASON),
        }
    }
}

/// Reads a `valid:` / `reason:` response.
///
/// Lines are matched case-insensitively; the first `valid:` line decides the
/// boolean by looking for `true`, the first `reason:` line supplies the reason.
pub fn parse_validation(response: &str) -> ValidationParse {
    let mut valid: Option<bool> = None;
    let mut reason: Option<String> = None;

    for line in response.lines().map(str::trim) {
        if valid.is_none() {
            if let Some(rest) = strip_prefix_ignore_case(line, "valid:") {
                valid = Some(rest.to_ascii_lowercase().contains("true"));
                continue;
            }
        }
        if reason.is_none() {
            if let Some(rest) = strip_prefix_ignore_case(line, "reason:") {
                reason = Some(rest.trim().to_string());
            }
        }
    }

    match valid {
        Some(valid) => ValidationParse::Parsed {
            valid,
            reason: reason.unwrap_or_default(),
        },
        None => ValidationParse::ParseFailure,
    }
}

fn strip_prefix_ignore_case<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &line[prefix.len()..])
}

/// Language-model backed scope check.
pub struct QueryValidator<'a> {
    llm: &'a dyn LlmProvider,
    sampling: SamplingSettings,
}

impl<'a> QueryValidator<'a> {
    /// Builds a validator over `llm`.
    pub fn new(llm: &'a dyn LlmProvider, sampling: SamplingSettings) -> Self {
        Self { llm, sampling }
    }

    /// Classifies `query` as in or out of scope. Never errors: call failures
    /// come back as a rejection.
    pub fn validate(&self, query: &str) -> Verdict {
        let request = self.sampling.request(VALIDATION_INSTRUCTIONS, query);
        match self.llm.complete(&request) {
            Ok(response) => {
                let parse = parse_validation(&response);
                if parse == ValidationParse::ParseFailure {
                    warn!("validator response had no `valid:` line; rejecting");
                }
                let verdict = Verdict::from(parse);
                debug!(in_scope = verdict.in_scope, reason = %verdict.reason, "query validated");
                verdict
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "validator call failed; rejecting");
                Verdict::rejected(format!("Error validating query: {err:#}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ProviderRequest;

    struct Canned(anyhow::Result<String>);

    impl LlmProvider for Canned {
        fn complete(&self, request: &ProviderRequest<'_>) -> anyhow::Result<String> {
            assert_eq!(request.system, VALIDATION_INSTRUCTIONS);
            match &self.0 {
                Ok(text) => Ok(text.clone()),
                Err(err) => Err(anyhow::anyhow!("{err}")),
            }
        }
    }

    #[test]
    fn parses_two_line_verdict() {
        assert_eq!(
            parse_validation("valid: true\nreason: ok"),
            ValidationParse::Parsed {
                valid: true,
                reason: "ok".to_string()
            }
        );
    }

    #[test]
    fn missing_valid_line_is_parse_failure() {
        assert_eq!(parse_validation("reason: nope"), ValidationParse::ParseFailure);
        assert_eq!(
            Verdict::from(parse_validation("reason: nope")),
            Verdict::rejected("Invalid query format")
        );
    }

    #[test]
    fn matching_is_case_insensitive_and_keeps_reason_case() {
        assert_eq!(
            parse_validation("  VALID: False\nReason: Not about Azure"),
            ValidationParse::Parsed {
                valid: false,
                reason: "Not about Azure".to_string()
            }
        );
        assert_eq!(
            parse_validation("Valid: TRUE"),
            ValidationParse::Parsed {
                valid: true,
                reason: String::new()
            }
        );
    }

    #[test]
    fn first_lines_win() {
        assert_eq!(
            parse_validation("valid: false\nreason: first\nvalid: true\nreason: second"),
            ValidationParse::Parsed {
                valid: false,
                reason: "first".to_string()
            }
        );
    }

    #[test]
    fn empty_response_fails_closed() {
        assert_eq!(parse_validation(""), ValidationParse::ParseFailure);
    }

    #[test]
    fn validate_uses_model_verdict() {
        let llm = Canned(Ok("valid: true\nreason: storage request".to_string()));
        let verdict = QueryValidator::new(&llm, SamplingSettings::default())
            .validate("create a storage account");
        assert!(verdict.in_scope);
        assert_eq!(verdict.reason, "storage request");
    }

    #[test]
    fn call_failure_is_rejection() {
        let llm = Canned(Err(anyhow::anyhow!("timed out")));
        let verdict = QueryValidator::new(&llm, SamplingSettings::default()).validate("anything");
        assert!(!verdict.in_scope);
        assert_eq!(verdict.reason, "Error validating query: timed out");
    }
}
