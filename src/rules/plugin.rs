//! rules::plugin
//!
//! Registry of executors for custom rule kinds.
//!
//! A plugin registered under a built-in kind (`calc`, `state`, ...)
//! overrides the built-in evaluation for that kind.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use super::{Rule, RuleExecutionError};
use crate::core::types::{TokenName, TokenValue};

/// Executor for one rule kind.
///
/// Receives the parsed rule and a resolver for the values of its
/// dependencies.
pub type RuleExecutorFn = Arc<
    dyn Fn(&Rule, &dyn Fn(&TokenName) -> Option<TokenValue>) -> Result<TokenValue, RuleExecutionError>
        + Send
        + Sync,
>;

/// Custom rule executors keyed by lowercase kind.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    executors: IndexMap<String, RuleExecutorFn>,
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("kinds", &self.executors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `executor` for `kind`, replacing any previous executor.
    ///
    /// # Example
    ///
    /// ```
    /// use rafters_tokens::rules::PluginRegistry;
    /// use rafters_tokens::core::types::TokenValue;
    ///
    /// let mut plugins = PluginRegistry::new();
    /// plugins.register("Fluid", |_rule, _resolve| Ok(TokenValue::from("clamp(1rem, 2vw, 2rem)")));
    ///
    /// assert!(plugins.contains("fluid"));
    /// ```
    pub fn register<F>(&mut self, kind: &str, executor: F)
    where
        F: Fn(&Rule, &dyn Fn(&TokenName) -> Option<TokenValue>) -> Result<TokenValue, RuleExecutionError>
            + Send
            + Sync
            + 'static,
    {
        self.register_arc(kind, Arc::new(executor));
    }

    /// Register an already shared executor.
    pub fn register_arc(&mut self, kind: &str, executor: RuleExecutorFn) {
        let kind = kind.to_ascii_lowercase();
        if self.executors.insert(kind.clone(), executor).is_some() {
            debug!(kind = %kind, "replaced rule plugin");
        } else {
            debug!(kind = %kind, "registered rule plugin");
        }
    }

    /// Executor for `kind`, if registered.
    pub fn lookup(&self, kind: &str) -> Option<RuleExecutorFn> {
        self.executors.get(&kind.to_ascii_lowercase()).cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.executors.contains_key(&kind.to_ascii_lowercase())
    }

    /// Registered kinds in registration order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.executors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.executors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_case_insensitive() {
        let mut plugins = PluginRegistry::new();
        plugins.register("Fluid", |_, _| Ok(TokenValue::Number(1.0)));

        assert!(plugins.contains("FLUID"));
        assert!(plugins.lookup("fluid").is_some());
        assert_eq!(plugins.kinds().collect::<Vec<_>>(), vec!["fluid"]);
    }

    #[test]
    fn last_registration_wins() {
        let mut plugins = PluginRegistry::new();
        plugins.register("fluid", |_, _| Ok(TokenValue::Number(1.0)));
        plugins.register("fluid", |_, _| Ok(TokenValue::Number(2.0)));
        assert_eq!(plugins.len(), 1);

        let rule = Rule::Custom {
            kind: "fluid".into(),
            args: vec![],
        };
        let executor = plugins.lookup("fluid").unwrap();
        assert_eq!(executor(&rule, &|_| None), Ok(TokenValue::Number(2.0)));
    }

    #[test]
    fn empty() {
        let plugins = PluginRegistry::new();
        assert!(plugins.is_empty());
        assert!(plugins.lookup("calc").is_none());
    }
}
