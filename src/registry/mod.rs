//! registry
//!
//! The token registry: owner of every token and of the dependency graph
//! for one design system.
//!
//! # Lifecycle
//!
//! 1. [`TokenRegistry::load`] adds a batch of definitions. The batch is
//!    staged and validated before anything is committed, then evaluated.
//!    A rule that fails to evaluate is reported, not fatal.
//! 2. [`TokenRegistry::set`] changes one token's literal value or rule.
//! 3. [`TokenRegistry::regenerate_dependents`] recomputes everything
//!    downstream of a changed token, in dependency order.
//!
//! # Invariants
//!
//! - The dependency graph is acyclic at all times. Edges that would close
//!   a cycle are rejected before insertion.
//! - A token's `dependencies` always equal the references of its rule and
//!   its outgoing edges in the graph.
//! - Only the registry mutates a token.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use rafters_tokens::color::mock::MockColorMath;
//! use rafters_tokens::core::types::{Category, TokenName, TokenValue};
//! use rafters_tokens::registry::{TokenDefinition, TokenRegistry, TokenUpdate};
//!
//! let mut registry = TokenRegistry::new(Arc::new(MockColorMath::new()));
//! let base = TokenName::new("spacing-base").unwrap();
//! let double = TokenName::new("spacing-double").unwrap();
//!
//! registry
//!     .load(vec![
//!         TokenDefinition::literal(base.clone(), Category::Spacing, 4.0),
//!         TokenDefinition::computed(double.clone(), Category::Spacing, "calc({spacing-base} * 2)"),
//!     ])
//!     .unwrap();
//! assert_eq!(registry.value(&double), Some(&TokenValue::Number(8.0)));
//!
//! registry.set(&base, TokenUpdate::Value(TokenValue::Number(5.0))).unwrap();
//! let report = registry.regenerate_dependents(&base).unwrap();
//! assert_eq!(report.updated, vec![double.clone()]);
//! assert_eq!(registry.value(&double), Some(&TokenValue::Number(10.0)));
//! ```

pub mod report;
pub mod shared;

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::color::ColorMath;
use crate::core::config::EngineConfig;
use crate::core::graph::{DependencyGraph, GraphError};
use crate::core::types::{Category, Fingerprint, Namespace, TokenName, TokenValue};
use crate::rules::{Rule, RuleExecutionError, RuleExecutor, RuleParseError, RuleParser};

pub use report::{LoadSummary, RegenerationReport, SetOutcome};
pub use shared::SharedRegistry;

/// Errors from [`TokenRegistry::load`].
///
/// Any error aborts the whole batch and the registry is left as it was.
/// Rule evaluation failures are not errors here; they are reported in
/// [`LoadSummary::failed`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LoadError {
    #[error("duplicate token: {0}")]
    DuplicateToken(TokenName),

    #[error("token '{0}' has neither a value nor a rule")]
    MissingValue(TokenName),

    #[error("loading {count} tokens would exceed the limit of {max}")]
    TooManyTokens { count: usize, max: usize },

    #[error("invalid rule for '{token}': {source}")]
    Parse {
        token: TokenName,
        source: RuleParseError,
    },

    #[error("'{token}' references unknown token '{reference}'")]
    UnknownTokenReference {
        token: TokenName,
        reference: TokenName,
    },

    #[error(transparent)]
    Cycle(#[from] GraphError),
}

/// Errors from [`TokenRegistry::set`].
///
/// A rejected update leaves the token exactly as it was.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SetError {
    #[error("unknown token: {0}")]
    UnknownToken(TokenName),

    #[error("invalid rule for '{token}': {source}")]
    Parse {
        token: TokenName,
        source: RuleParseError,
    },

    #[error("'{token}' references unknown token '{reference}'")]
    UnknownTokenReference {
        token: TokenName,
        reference: TokenName,
    },

    #[error(transparent)]
    Cycle(#[from] GraphError),
}

/// Errors from other registry operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistryError {
    #[error("unknown token: {0}")]
    UnknownToken(TokenName),

    #[error("cannot remove '{token}': still used by {}", format_names(.dependents))]
    HasDependents {
        token: TokenName,
        dependents: Vec<TokenName>,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Set(#[from] SetError),

    #[error("registry lock poisoned by a panicking writer")]
    Poisoned,
}

fn format_names(names: &[TokenName]) -> String {
    names
        .iter()
        .map(TokenName::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A named, versioned design value.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    name: TokenName,
    category: Category,
    namespace: Namespace,
    value: Option<TokenValue>,
    rule: Option<Rule>,
    dependencies: IndexSet<TokenName>,
    version: u64,
    last_error: Option<RuleExecutionError>,
}

impl Token {
    pub fn name(&self) -> &TokenName {
        &self.name
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// Current value; `None` until a rule without a seed value first
    /// evaluates successfully.
    pub fn value(&self) -> Option<&TokenValue> {
        self.value.as_ref()
    }

    /// Generation rule; `None` for root tokens.
    pub fn rule(&self) -> Option<&Rule> {
        self.rule.as_ref()
    }

    /// Tokens the rule reads.
    pub fn dependencies(&self) -> &IndexSet<TokenName> {
        &self.dependencies
    }

    /// Incremented each time the value changes.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Error from the latest evaluation, if it failed.
    pub fn last_error(&self) -> Option<&RuleExecutionError> {
        self.last_error.as_ref()
    }

    pub fn is_computed(&self) -> bool {
        self.rule.is_some()
    }

    /// Store an evaluation result. Returns whether the value changed.
    fn assign(&mut self, value: TokenValue) -> bool {
        self.last_error = None;
        if self.value.as_ref() == Some(&value) {
            return false;
        }
        self.value = Some(value);
        self.version += 1;
        true
    }

    fn replace_rule(&mut self, rule: Option<Rule>) {
        self.dependencies = rule.as_ref().map(Rule::dependencies).unwrap_or_default();
        self.rule = rule;
    }
}

/// Input form of a token.
///
/// # Example
///
/// ```
/// use rafters_tokens::registry::TokenDefinition;
///
/// let def: TokenDefinition = serde_json::from_str(
///     r#"{ "name": "primary-hover", "category": "color", "rule": "state(primary, 1.1, hover)" }"#,
/// ).unwrap();
/// assert_eq!(def.namespace.as_str(), "default");
/// assert!(def.value.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenDefinition {
    pub name: TokenName,
    pub category: Category,
    #[serde(default)]
    pub namespace: Namespace,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<TokenValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

impl TokenDefinition {
    /// A root token with a literal value.
    pub fn literal(name: TokenName, category: Category, value: impl Into<TokenValue>) -> Self {
        Self {
            name,
            category,
            namespace: Namespace::default(),
            value: Some(value.into()),
            rule: None,
        }
    }

    /// A token computed by `rule`.
    pub fn computed(name: TokenName, category: Category, rule: impl Into<String>) -> Self {
        Self {
            name,
            category,
            namespace: Namespace::default(),
            value: None,
            rule: Some(rule.into()),
        }
    }

    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = namespace;
        self
    }

    /// Parse a JSON array of definitions.
    pub fn from_json(json: &str) -> Result<Vec<Self>, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Starting value for a computed token (the seed of `contrast` rules).
    pub fn with_value(mut self, value: impl Into<TokenValue>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Change applied by [`TokenRegistry::set`].
#[derive(Debug, Clone, PartialEq)]
pub enum TokenUpdate {
    /// Literal override. Drops the rule; the token becomes a root.
    Value(TokenValue),
    /// New rule text.
    Rule(String),
}

/// Owner of all tokens and the dependency graph of one design system.
#[derive(Debug, Clone)]
pub struct TokenRegistry {
    tokens: IndexMap<TokenName, Token>,
    graph: DependencyGraph,
    parser: RuleParser,
    executor: RuleExecutor,
    config: EngineConfig,
}

impl TokenRegistry {
    /// Create an empty registry using `color` for color operations.
    pub fn new(color: Arc<dyn ColorMath>) -> Self {
        let config = EngineConfig::default();
        Self {
            tokens: IndexMap::new(),
            graph: DependencyGraph::new(),
            parser: RuleParser::new().with_max_length(config.max_rule_length()),
            executor: RuleExecutor::new(color).with_config(config.clone()),
            config,
        }
    }

    /// Apply contrast ratios and limits from `config`.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.parser = self.parser.with_max_length(config.max_rule_length());
        self.executor.set_config(config.clone());
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register an executor for a custom rule kind.
    ///
    /// Rules of that kind are accepted by later `load` and `set` calls.
    /// Registering a built-in kind overrides its evaluation.
    pub fn register_plugin<F>(&mut self, kind: &str, executor: F)
    where
        F: Fn(&Rule, &dyn Fn(&TokenName) -> Option<TokenValue>) -> Result<TokenValue, RuleExecutionError>
            + Send
            + Sync
            + 'static,
    {
        self.executor.plugins_mut().register(kind, executor);
        self.parser.add_custom_kind(kind);
    }

    /// Add a batch of token definitions.
    ///
    /// Structural checks are all-or-nothing: names, rules and references
    /// are validated and dependency edges are inserted into a staged copy
    /// of the graph before the registry changes. Computed tokens are then
    /// evaluated in dependency order. A token whose rule fails keeps its
    /// seed value (or none), records the error as its
    /// [`Token::last_error`], and is listed in [`LoadSummary::failed`];
    /// the rest of the batch is still evaluated and added.
    ///
    /// # Errors
    ///
    /// Returns `LoadError` for duplicate names, tokens with neither value nor
    /// rule, rules that do not parse, references to unknown tokens, and
    /// cycles.
    pub fn load(&mut self, defs: Vec<TokenDefinition>) -> Result<LoadSummary, LoadError> {
        let max = self.config.max_tokens();
        let count = self.tokens.len() + defs.len();
        if count > max {
            return Err(LoadError::TooManyTokens { count, max });
        }

        let mut staged: IndexMap<TokenName, Token> = IndexMap::with_capacity(defs.len());
        for def in defs {
            if self.tokens.contains_key(&def.name) || staged.contains_key(&def.name) {
                return Err(LoadError::DuplicateToken(def.name));
            }
            if def.value.is_none() && def.rule.is_none() {
                return Err(LoadError::MissingValue(def.name));
            }

            let rule = match def.rule.as_deref() {
                Some(text) => Some(self.parser.parse(text).map_err(|source| LoadError::Parse {
                    token: def.name.clone(),
                    source,
                })?),
                None => None,
            };

            let mut token = Token {
                name: def.name.clone(),
                category: def.category,
                namespace: def.namespace,
                value: def.value,
                rule: None,
                dependencies: IndexSet::new(),
                version: 0,
                last_error: None,
            };
            token.replace_rule(rule);
            staged.insert(def.name, token);
        }

        let mut graph = self.graph.clone();
        for name in staged.keys() {
            graph.add_node(name.clone());
        }
        for (name, token) in &staged {
            for reference in &token.dependencies {
                if !staged.contains_key(reference) && !self.tokens.contains_key(reference) {
                    return Err(LoadError::UnknownTokenReference {
                        token: name.clone(),
                        reference: reference.clone(),
                    });
                }
                graph.add_edge(name, reference)?;
            }
        }

        let order = graph.topological_sort()?;
        let mut computed = 0;
        let mut failed = Vec::new();
        for name in &order {
            let result = {
                let Some(token) = staged.get(name) else {
                    continue;
                };
                let Some(rule) = &token.rule else {
                    continue;
                };
                let resolve = |dep: &TokenName| {
                    staged
                        .get(dep)
                        .or_else(|| self.tokens.get(dep))
                        .and_then(|t| t.value.clone())
                };
                self.executor.execute(rule, token.value.as_ref(), &resolve)
            };

            let Some(token) = staged.get_mut(name) else {
                continue;
            };
            match result {
                Ok(value) => {
                    debug!(token = %name, %value, "evaluated token");
                    token.value = Some(value);
                    computed += 1;
                }
                Err(err) => {
                    warn!(token = %name, error = %err, "rule failed to evaluate during load");
                    token.last_error = Some(err.clone());
                    failed.push((name.clone(), err));
                }
            }
        }

        let loaded = staged.len();
        for token in staged.values_mut() {
            token.version = 1;
        }
        self.graph = graph;
        self.tokens.extend(staged);

        info!(
            loaded,
            computed,
            failed = failed.len(),
            total = self.tokens.len(),
            "loaded token batch"
        );
        Ok(LoadSummary {
            loaded,
            computed,
            failed,
        })
    }

    pub fn get(&self, name: &TokenName) -> Option<&Token> {
        self.tokens.get(name)
    }

    pub fn value(&self, name: &TokenName) -> Option<&TokenValue> {
        self.tokens.get(name).and_then(Token::value)
    }

    /// Change one token's literal value or rule.
    ///
    /// A new rule is parsed and checked before anything changes; on a
    /// cycle or unknown reference the token keeps its previous rule and
    /// edges. Once committed, the rule is evaluated immediately. An
    /// evaluation failure is reported in [`SetOutcome::error`] and the
    /// token keeps its previous value.
    ///
    /// Dependents are not recomputed; follow with
    /// [`regenerate_dependents`](Self::regenerate_dependents).
    ///
    /// # Errors
    ///
    /// Returns `SetError` if the token does not exist, or the rule does not
    /// parse, references an unknown token or would close a cycle.
    pub fn set(&mut self, name: &TokenName, update: TokenUpdate) -> Result<SetOutcome, SetError> {
        if !self.tokens.contains_key(name) {
            return Err(SetError::UnknownToken(name.clone()));
        }

        match update {
            TokenUpdate::Value(value) => {
                self.graph.clear_dependencies(name);
                let token = self
                    .tokens
                    .get_mut(name)
                    .ok_or_else(|| SetError::UnknownToken(name.clone()))?;
                token.replace_rule(None);
                let changed = token.assign(value);
                debug!(token = %name, changed, "set literal value");
                Ok(SetOutcome {
                    changed,
                    version: token.version,
                    error: None,
                })
            }
            TokenUpdate::Rule(text) => {
                let rule = self.parser.parse(&text).map_err(|source| SetError::Parse {
                    token: name.clone(),
                    source,
                })?;
                let dependencies = rule.dependencies();

                for reference in &dependencies {
                    if !self.tokens.contains_key(reference) {
                        return Err(SetError::UnknownTokenReference {
                            token: name.clone(),
                            reference: reference.clone(),
                        });
                    }
                    if let Some(cycle) = self.graph.would_create_cycle(name, reference) {
                        debug!(token = %name, %cycle, "rejected rule update");
                        return Err(SetError::Cycle(GraphError::CircularDependency { cycle }));
                    }
                }

                let previous = self.graph.clear_dependencies(name);
                for reference in &dependencies {
                    if let Err(err) = self.graph.add_edge(name, reference) {
                        self.restore_edges(name, &previous)?;
                        return Err(err.into());
                    }
                }
                if let Some(token) = self.tokens.get_mut(name) {
                    token.replace_rule(Some(rule));
                }

                let result = self.evaluate(name);
                let token = self
                    .tokens
                    .get_mut(name)
                    .ok_or_else(|| SetError::UnknownToken(name.clone()))?;
                let (changed, error) = match result {
                    Some(Ok(value)) => (token.assign(value), None),
                    Some(Err(err)) => {
                        warn!(token = %name, error = %err, "new rule failed to evaluate; keeping previous value");
                        token.last_error = Some(err.clone());
                        (false, Some(err))
                    }
                    None => (false, None),
                };
                Ok(SetOutcome {
                    changed,
                    version: token.version,
                    error,
                })
            }
        }
    }

    /// Put back edges removed by `clear_dependencies`.
    fn restore_edges(
        &mut self,
        name: &TokenName,
        previous: &IndexSet<TokenName>,
    ) -> Result<(), GraphError> {
        self.graph.clear_dependencies(name);
        for dep in previous {
            self.graph.add_edge(name, dep)?;
        }
        Ok(())
    }

    /// Evaluate a token's rule against the current values.
    ///
    /// `None` if the token does not exist or has no rule.
    fn evaluate(&self, name: &TokenName) -> Option<Result<TokenValue, RuleExecutionError>> {
        let token = self.tokens.get(name)?;
        let rule = token.rule.as_ref()?;
        let resolve = |dep: &TokenName| self.tokens.get(dep).and_then(|t| t.value.clone());
        Some(self.executor.execute(rule, token.value.as_ref(), &resolve))
    }

    /// Recompute every token downstream of `changed`, in dependency order.
    ///
    /// Only the transitive dependents of `changed` are evaluated. A failing
    /// token keeps its last good value and is listed in
    /// [`RegenerationReport::failed`]; tokens after it are still evaluated,
    /// against that last good value.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::UnknownToken` if `changed` does not exist.
    pub fn regenerate_dependents(
        &mut self,
        changed: &TokenName,
    ) -> Result<RegenerationReport, RegistryError> {
        if !self.tokens.contains_key(changed) {
            return Err(RegistryError::UnknownToken(changed.clone()));
        }

        let affected = self.graph.transitive_dependents(changed);
        let mut report = RegenerationReport::new();
        if affected.is_empty() {
            return Ok(report);
        }

        let order = self.graph.topological_sort()?;
        for name in order.into_iter().filter(|n| affected.contains(n)) {
            let Some(result) = self.evaluate(&name) else {
                continue;
            };
            let Some(token) = self.tokens.get_mut(&name) else {
                continue;
            };
            match result {
                Ok(value) => {
                    if token.assign(value) {
                        debug!(token = %name, version = token.version, "regenerated token");
                        report.record_updated(name);
                    } else {
                        report.record_unchanged(name);
                    }
                }
                Err(err) => {
                    warn!(token = %name, error = %err, "regeneration failed; keeping last value");
                    token.last_error = Some(err.clone());
                    report.record_failure(name, err);
                }
            }
        }

        debug!(changed = %changed, "{}", report.summary());
        Ok(report)
    }

    /// Whether giving `dependent` exactly the dependencies `proposed` keeps
    /// the graph acyclic. Read-only.
    ///
    /// The token's current dependencies play no part in the answer.
    pub fn validate_no_cycle<'a>(
        &self,
        dependent: &TokenName,
        proposed: impl IntoIterator<Item = &'a TokenName>,
    ) -> bool {
        // Paths into `dependent` never use its own outgoing edges.
        proposed
            .into_iter()
            .all(|dep| self.graph.would_create_cycle(dependent, dep).is_none())
    }

    /// All token names, dependencies before dependents.
    pub fn topological_sort(&self) -> Result<Vec<TokenName>, GraphError> {
        self.graph.topological_sort()
    }

    /// Remove a token nothing depends on.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::HasDependents` while other tokens reference
    /// it, or `RegistryError::UnknownToken`.
    pub fn remove_token(&mut self, name: &TokenName) -> Result<Token, RegistryError> {
        if let Some(dependents) = self.graph.dependents(name) {
            if !dependents.is_empty() {
                return Err(RegistryError::HasDependents {
                    token: name.clone(),
                    dependents: dependents.iter().cloned().collect(),
                });
            }
        }
        let token = self
            .tokens
            .shift_remove(name)
            .ok_or_else(|| RegistryError::UnknownToken(name.clone()))?;
        self.graph.remove_token(name);
        debug!(token = %name, "removed token");
        Ok(token)
    }

    /// Direct dependencies of a token.
    pub fn dependencies(&self, name: &TokenName) -> Option<&IndexSet<TokenName>> {
        self.tokens.get(name).map(Token::dependencies)
    }

    /// Direct dependents of a token.
    pub fn dependents(&self, name: &TokenName) -> Option<&IndexSet<TokenName>> {
        self.graph.dependents(name)
    }

    /// Tokens in insertion order.
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.values()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &Token> {
        self.tokens.values().filter(move |t| t.category == category)
    }

    pub fn in_namespace<'a>(&'a self, namespace: &'a Namespace) -> impl Iterator<Item = &'a Token> {
        self.tokens.values().filter(move |t| &t.namespace == namespace)
    }

    /// Hash over every resolved value. Equal token sets give equal
    /// fingerprints regardless of load order.
    pub fn fingerprint(&self) -> Fingerprint {
        let values: Vec<(TokenName, TokenValue)> = self
            .tokens
            .values()
            .filter_map(|t| t.value.clone().map(|v| (t.name.clone(), v)))
            .collect();
        Fingerprint::compute(&values)
    }

    pub(crate) fn graph(&self) -> &DependencyGraph {
        &self.graph
    }
}
