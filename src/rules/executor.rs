//! rules::executor
//!
//! Evaluates parsed rules.
//!
//! # Design
//!
//! The executor is a pure function of the rule, the token's previous
//! value, and a resolver that returns already-computed dependency values.
//! It never looks tokens up on its own and never triggers recursive
//! computation; ordering is the registry's job.
//!
//! Color operations are delegated to the [`ColorMath`] collaborator.
//! Plugins registered for a rule's kind take precedence over the built-in
//! evaluation.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use super::expr::{BinaryOp, Expr};
use super::plugin::PluginRegistry;
use super::{ContrastStandard, Rule};
use crate::color::{ColorMath, ColorMathError};
use crate::core::config::EngineConfig;
use crate::core::types::{Channel, TokenName, TokenValue};

/// Errors from rule evaluation.
///
/// `Clone + PartialEq` so a token can keep the error from its latest
/// failed evaluation.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuleExecutionError {
    #[error("reference to '{0}' has no resolved value")]
    UnresolvedReference(TokenName),

    #[error("token '{0}' has no numeric value")]
    NotNumeric(TokenName),

    #[error("division by zero")]
    DivisionByZero,

    #[error("expression result is not a finite number")]
    NonFinite,

    #[error("scale '{family}' has no position {position}")]
    PositionNotFound { family: TokenName, position: u32 },

    /// `best_ratio` is the ratio of the collaborator's closest candidate,
    /// when it offered one.
    #[error("cannot reach {standard} contrast against '{target}'{}", format_best(.best_ratio))]
    UnsatisfiableContrast {
        target: TokenName,
        standard: ContrastStandard,
        best_ratio: Option<f64>,
    },

    #[error("no executor for rule kind '{0}'")]
    UnknownRuleKind(String),

    #[error(transparent)]
    ColorMath(#[from] ColorMathError),

    #[error("plugin '{kind}' failed: {message}")]
    Plugin { kind: String, message: String },
}

fn format_best(best_ratio: &Option<f64>) -> String {
    best_ratio
        .map(|ratio| format!(" (best ratio {ratio:.2})"))
        .unwrap_or_default()
}

/// Rule evaluator.
#[derive(Clone)]
pub struct RuleExecutor {
    color: Arc<dyn ColorMath>,
    plugins: PluginRegistry,
    config: EngineConfig,
}

impl fmt::Debug for RuleExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleExecutor")
            .field("plugins", &self.plugins)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RuleExecutor {
    /// Create an executor with default configuration and no plugins.
    pub fn new(color: Arc<dyn ColorMath>) -> Self {
        Self {
            color,
            plugins: PluginRegistry::new(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_plugins(mut self, plugins: PluginRegistry) -> Self {
        self.plugins = plugins;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    pub fn plugins(&self) -> &PluginRegistry {
        &self.plugins
    }

    pub fn plugins_mut(&mut self) -> &mut PluginRegistry {
        &mut self.plugins
    }

    /// Evaluate `rule`.
    ///
    /// `previous` is the token's current value, if any; `contrast` rules
    /// use it as the starting point. `resolve` returns the value of a
    /// dependency.
    ///
    /// # Errors
    ///
    /// Returns `RuleExecutionError` if a dependency is unresolved, an
    /// arithmetic result is not finite, or the collaborator or a plugin
    /// fails.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use rafters_tokens::color::mock::MockColorMath;
    /// use rafters_tokens::core::types::TokenValue;
    /// use rafters_tokens::rules::{parse, RuleExecutor};
    ///
    /// let executor = RuleExecutor::new(Arc::new(MockColorMath::new()));
    /// let rule = parse("calc(base * 2 + 4)").unwrap();
    ///
    /// let value = executor
    ///     .execute(&rule, None, &|_| Some(TokenValue::from("8px")))
    ///     .unwrap();
    /// assert_eq!(value, TokenValue::Number(20.0));
    /// ```
    pub fn execute(
        &self,
        rule: &Rule,
        previous: Option<&TokenValue>,
        resolve: &dyn Fn(&TokenName) -> Option<TokenValue>,
    ) -> Result<TokenValue, RuleExecutionError> {
        if let Some(plugin) = self.plugins.lookup(rule.kind()) {
            trace!(kind = rule.kind(), "dispatching rule to plugin");
            return plugin(rule, resolve);
        }

        let lookup = |name: &TokenName| {
            resolve(name).ok_or_else(|| RuleExecutionError::UnresolvedReference(name.clone()))
        };

        match rule {
            Rule::Calc(expr) => {
                let n = self.eval(expr, &lookup)?;
                if !n.is_finite() {
                    return Err(RuleExecutionError::NonFinite);
                }
                Ok(TokenValue::Number(n))
            }
            Rule::State { base, factor, .. } => {
                let base = lookup(base)?;
                Ok(self
                    .color
                    .adjust_channel(&base, Channel::Lightness, *factor)?)
            }
            Rule::Scale { family, position } => {
                let base = lookup(family)?;
                self.color
                    .resolve_scale_position(family, &base, *position)
                    .ok_or_else(|| RuleExecutionError::PositionNotFound {
                        family: family.clone(),
                        position: *position,
                    })
            }
            Rule::Contrast { target, standard } => {
                let target_value = lookup(target)?;
                let seed = previous.cloned().unwrap_or_else(|| target_value.clone());
                let min_ratio = self.config.min_ratio(*standard);

                let unsatisfiable = |best_ratio| RuleExecutionError::UnsatisfiableContrast {
                    target: target.clone(),
                    standard: *standard,
                    best_ratio,
                };

                match self.color.adjust_for_contrast(&seed, &target_value, min_ratio) {
                    Some(candidate) => {
                        let ratio = self.color.contrast_ratio(&candidate, &target_value)?;
                        if ratio < min_ratio {
                            return Err(unsatisfiable(Some(ratio)));
                        }
                        Ok(candidate)
                    }
                    None => Err(unsatisfiable(None)),
                }
            }
            Rule::Invert { base } => {
                let base = lookup(base)?;
                Ok(self.color.invert(&base)?)
            }
            Rule::Custom { kind, .. } => Err(RuleExecutionError::UnknownRuleKind(kind.clone())),
        }
    }

    fn eval(
        &self,
        expr: &Expr,
        lookup: &dyn Fn(&TokenName) -> Result<TokenValue, RuleExecutionError>,
    ) -> Result<f64, RuleExecutionError> {
        match expr {
            Expr::Number(n) => Ok(*n),
            Expr::Ref(reference) => {
                let value = lookup(&reference.token)?;
                match reference.channel {
                    Some(channel) => Ok(self.color.channel(&value, channel)?),
                    None => value
                        .as_number()
                        .ok_or_else(|| RuleExecutionError::NotNumeric(reference.token.clone())),
                }
            }
            Expr::Neg(inner) => Ok(-self.eval(inner, lookup)?),
            Expr::Binary { op, lhs, rhs } => {
                let a = self.eval(lhs, lookup)?;
                let b = self.eval(rhs, lookup)?;
                match op {
                    BinaryOp::Add => Ok(a + b),
                    BinaryOp::Sub => Ok(a - b),
                    BinaryOp::Mul => Ok(a * b),
                    BinaryOp::Div if b == 0.0 => Err(RuleExecutionError::DivisionByZero),
                    BinaryOp::Div => Ok(a / b),
                }
            }
        }
    }
}
