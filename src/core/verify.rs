//! core::verify
//!
//! Fast verification of registry invariants.
//!
//! # Checks
//!
//! - The dependency graph sorts (it is acyclic)
//! - Each token's dependencies match its rule and its graph edges
//! - Every dependency names an existing token
//! - Every token has a value, unless its rule failed and recorded why
//!
//! # Invariants
//!
//! - Never mutates the registry
//! - Must be deterministic: errors are reported in token order

use indexmap::IndexSet;
use thiserror::Error;

use super::graph::GraphError;
use super::types::TokenName;
use crate::registry::TokenRegistry;

/// Errors from verification.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum VerifyError {
    #[error("dependency graph is cyclic: {0}")]
    CycleDetected(GraphError),

    #[error("dependencies of '{token}' disagree: rule has {rule:?}, token has {stored:?}, graph has {graph:?}")]
    DependencyMismatch {
        token: TokenName,
        rule: Vec<TokenName>,
        stored: Vec<TokenName>,
        graph: Vec<TokenName>,
    },

    #[error("'{token}' depends on missing token '{reference}'")]
    DanglingReference {
        token: TokenName,
        reference: TokenName,
    },

    /// No value and no recorded rule failure to explain it.
    #[error("token has no value: {0}")]
    Unresolved(TokenName),
}

/// Result of fast verification.
#[derive(Debug)]
pub struct VerifyResult {
    /// Whether verification passed
    pub ok: bool,
    /// Errors found during verification
    pub errors: Vec<VerifyError>,
}

impl VerifyResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            ok: true,
            errors: vec![],
        }
    }

    /// Create a failed result with errors.
    pub fn failure(errors: Vec<VerifyError>) -> Self {
        Self { ok: false, errors }
    }
}

/// Verify a registry's structural invariants.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use rafters_tokens::color::mock::MockColorMath;
/// use rafters_tokens::core::verify::fast_verify;
/// use rafters_tokens::registry::TokenRegistry;
///
/// let registry = TokenRegistry::new(Arc::new(MockColorMath::new()));
/// assert!(fast_verify(&registry).ok);
/// ```
pub fn fast_verify(registry: &TokenRegistry) -> VerifyResult {
    let mut errors = Vec::new();
    let graph = registry.graph();

    if let Err(err) = graph.topological_sort() {
        errors.push(VerifyError::CycleDetected(err));
    }

    for token in registry.tokens() {
        let name = token.name();
        let from_rule = token
            .rule()
            .map(|rule| rule.dependencies())
            .unwrap_or_default();
        let stored = token.dependencies();
        let edges = graph.dependencies(name).cloned().unwrap_or_default();

        if !same_set(&from_rule, stored) || !same_set(stored, &edges) {
            errors.push(VerifyError::DependencyMismatch {
                token: name.clone(),
                rule: from_rule.into_iter().collect(),
                stored: stored.iter().cloned().collect(),
                graph: edges.into_iter().collect(),
            });
        }

        for reference in stored {
            if registry.get(reference).is_none() {
                errors.push(VerifyError::DanglingReference {
                    token: name.clone(),
                    reference: reference.clone(),
                });
            }
        }

        if token.value().is_none() && token.last_error().is_none() {
            errors.push(VerifyError::Unresolved(name.clone()));
        }
    }

    if errors.is_empty() {
        VerifyResult::success()
    } else {
        VerifyResult::failure(errors)
    }
}

fn same_set(a: &IndexSet<TokenName>, b: &IndexSet<TokenName>) -> bool {
    a.len() == b.len() && a.iter().all(|name| b.contains(name))
}
