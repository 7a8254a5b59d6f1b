//! rules
//!
//! Rule language for computed tokens.
//!
//! A rule names how a token's value is derived from other tokens:
//!
//! ```text
//! calc({spacing-base} * 2)
//! state(primary, 1.1, hover)
//! scale(blue, 600)
//! contrast(surface, AA)
//! invert(background)
//! ```
//!
//! [`parse`] turns text into a [`Rule`]; [`RuleExecutor`] evaluates a rule
//! against resolved dependency values. Unknown kinds can be supplied by
//! plugins registered in a [`PluginRegistry`].

pub mod executor;
pub mod expr;
pub(crate) mod grammar;
pub mod parser;
pub mod plugin;

use std::fmt;
use std::str::FromStr;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::core::types::TokenName;

pub use executor::{RuleExecutionError, RuleExecutor};
pub use expr::{BinaryOp, Expr, Reference};
pub use parser::{parse, RuleParseError, RuleParser};
pub use plugin::{PluginRegistry, RuleExecutorFn};

/// Interaction states a `state(...)` rule can derive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateName {
    Hover,
    Active,
    Focus,
    Disabled,
}

impl StateName {
    pub fn as_str(self) -> &'static str {
        match self {
            StateName::Hover => "hover",
            StateName::Active => "active",
            StateName::Focus => "focus",
            StateName::Disabled => "disabled",
        }
    }
}

impl FromStr for StateName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hover" => Ok(StateName::Hover),
            "active" => Ok(StateName::Active),
            "focus" => Ok(StateName::Focus),
            "disabled" => Ok(StateName::Disabled),
            other => Err(format!(
                "unknown state '{other}' (expected hover, active, focus or disabled)"
            )),
        }
    }
}

impl fmt::Display for StateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// WCAG contrast levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContrastStandard {
    #[serde(rename = "AA")]
    Aa,
    #[serde(rename = "AAA")]
    Aaa,
    #[serde(rename = "AA-large")]
    AaLarge,
}

impl ContrastStandard {
    pub fn as_str(self) -> &'static str {
        match self {
            ContrastStandard::Aa => "AA",
            ContrastStandard::Aaa => "AAA",
            ContrastStandard::AaLarge => "AA-large",
        }
    }
}

impl FromStr for ContrastStandard {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aa" => Ok(ContrastStandard::Aa),
            "aaa" => Ok(ContrastStandard::Aaa),
            "aa-large" | "aa_large" => Ok(ContrastStandard::AaLarge),
            _ => Err(format!(
                "unknown contrast standard '{s}' (expected AA, AAA or AA-large)"
            )),
        }
    }
}

impl fmt::Display for ContrastStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An argument to a custom rule kind.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleArg {
    Ref(TokenName),
    Number(f64),
    Text(String),
}

impl fmt::Display for RuleArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleArg::Ref(name) => write!(f, "{name}"),
            RuleArg::Number(n) => write!(f, "{n}"),
            RuleArg::Text(s) => write!(f, "\"{s}\""),
        }
    }
}

/// A parsed rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    /// Arithmetic over numbers and token references.
    Calc(Expr),

    /// Lightness-adjusted variant of a base token for an interaction state.
    State {
        base: TokenName,
        factor: f64,
        state: StateName,
    },

    /// A position on a color family's scale.
    Scale { family: TokenName, position: u32 },

    /// A color meeting a minimum contrast ratio against `target`.
    Contrast {
        target: TokenName,
        standard: ContrastStandard,
    },

    /// The inverse of a base token.
    Invert { base: TokenName },

    /// A kind handled by a registered plugin.
    Custom { kind: String, args: Vec<RuleArg> },
}

impl Rule {
    /// Lowercase kind keyword (`"calc"`, `"state"`, ...).
    pub fn kind(&self) -> &str {
        match self {
            Rule::Calc(_) => "calc",
            Rule::State { .. } => "state",
            Rule::Scale { .. } => "scale",
            Rule::Contrast { .. } => "contrast",
            Rule::Invert { .. } => "invert",
            Rule::Custom { kind, .. } => kind,
        }
    }

    /// Tokens this rule reads, without duplicates, in order of appearance.
    pub fn dependencies(&self) -> IndexSet<TokenName> {
        match self {
            Rule::Calc(expr) => expr.references(),
            Rule::State { base, .. } | Rule::Invert { base } => IndexSet::from([base.clone()]),
            Rule::Scale { family, .. } => IndexSet::from([family.clone()]),
            Rule::Contrast { target, .. } => IndexSet::from([target.clone()]),
            Rule::Custom { args, .. } => args
                .iter()
                .filter_map(|arg| match arg {
                    RuleArg::Ref(name) => Some(name.clone()),
                    _ => None,
                })
                .collect(),
        }
    }
}

impl fmt::Display for Rule {
    /// Canonical text; parsing it yields an equal rule.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Calc(expr) => write!(f, "calc({expr})"),
            Rule::State {
                base,
                factor,
                state,
            } => write!(f, "state({base}, {factor}, {state})"),
            Rule::Scale { family, position } => write!(f, "scale({family}, {position})"),
            Rule::Contrast { target, standard } => write!(f, "contrast({target}, {standard})"),
            Rule::Invert { base } => write!(f, "invert({base})"),
            Rule::Custom { kind, args } => {
                write!(f, "{kind}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}
