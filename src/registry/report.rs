//! registry::report
//!
//! Outcome summaries for registry operations.

use crate::core::types::TokenName;
use crate::rules::RuleExecutionError;

/// Result of [`TokenRegistry::regenerate_dependents`](super::TokenRegistry::regenerate_dependents).
///
/// Every dependent of the changed token lands in exactly one list, in the
/// order it was evaluated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegenerationReport {
    /// Tokens whose value changed.
    pub updated: Vec<TokenName>,
    /// Tokens re-evaluated to the same value.
    pub unchanged: Vec<TokenName>,
    /// Tokens whose evaluation failed, with the error. These kept their
    /// previous value.
    pub failed: Vec<(TokenName, RuleExecutionError)>,
}

impl RegenerationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_updated(&mut self, name: TokenName) {
        self.updated.push(name);
    }

    pub fn record_unchanged(&mut self, name: TokenName) {
        self.unchanged.push(name);
    }

    pub fn record_failure(&mut self, name: TokenName, error: RuleExecutionError) {
        self.failed.push((name, error));
    }

    /// Whether any evaluation failed.
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Number of tokens evaluated.
    pub fn evaluated(&self) -> usize {
        self.updated.len() + self.unchanged.len() + self.failed.len()
    }

    /// One-line summary for display.
    pub fn summary(&self) -> String {
        if self.has_failures() {
            format!(
                "Regenerated {} tokens: {} updated, {} unchanged, {} failed",
                self.evaluated(),
                self.updated.len(),
                self.unchanged.len(),
                self.failed.len()
            )
        } else {
            format!(
                "Regenerated {} tokens: {} updated, {} unchanged",
                self.evaluated(),
                self.updated.len(),
                self.unchanged.len()
            )
        }
    }
}

/// Result of a successful [`TokenRegistry::load`](super::TokenRegistry::load).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadSummary {
    /// Tokens added by the batch.
    pub loaded: usize,
    /// Tokens whose value came from a rule.
    pub computed: usize,
    /// Tokens whose rule failed to evaluate, in evaluation order. These
    /// were still added, keeping their seed value if they had one.
    pub failed: Vec<(TokenName, RuleExecutionError)>,
}

impl LoadSummary {
    /// Whether any rule in the batch failed to evaluate.
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Result of [`TokenRegistry::set`](super::TokenRegistry::set).
#[derive(Debug, Clone, PartialEq)]
pub struct SetOutcome {
    /// Whether the token's value changed.
    pub changed: bool,
    /// Version after the update.
    pub version: u64,
    /// Evaluation error for a new rule. The structural change is kept and
    /// the token retains its previous value.
    pub error: Option<RuleExecutionError>,
}
