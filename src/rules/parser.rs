//! rules::parser
//!
//! Turns rule text into a typed [`Rule`].
//!
//! # Syntax
//!
//! Every rule is a call: `kind(arg, arg, ...)`. The keyword is
//! case-insensitive.
//!
//! | Kind | Arguments |
//! |---|---|
//! | `calc` | one arithmetic expression |
//! | `state` | token, numeric factor, state name |
//! | `scale` | family token, integer position |
//! | `contrast` | target token, standard (`AA`, `AAA`, `AA-large`) |
//! | `invert` | token |
//!
//! Custom kinds are accepted only by a parser built with
//! [`RuleParser::with_custom_kinds`]; their arguments are token
//! references, numbers, or quoted strings.
//!
//! Parsing is pure: it never consults a registry.

use std::collections::BTreeSet;

use nom::Finish;
use thiserror::Error;

use super::expr::Expr;
use super::grammar::{arguments, call_head, calc_arguments, offset, RawArg};
use super::{ContrastStandard, Rule, RuleArg, StateName};
use crate::core::config::DEFAULT_MAX_RULE_LENGTH;
use crate::core::types::{TokenName, TypeError};

/// Kinds every parser accepts.
const BUILTIN_KINDS: [&str; 5] = ["calc", "state", "scale", "contrast", "invert"];

/// Errors from rule parsing.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RuleParseError {
    #[error("rule expression is empty")]
    Empty,

    #[error("rule expression is {length} bytes, limit is {max}")]
    TooLong { length: usize, max: usize },

    #[error("expected `kind(arguments)` at position {position}")]
    ExpectedCall { position: usize },

    #[error("unknown rule kind '{0}'")]
    UnknownKind(String),

    #[error("{kind}() takes {expected} argument(s), found {found}")]
    Arity {
        kind: String,
        expected: usize,
        found: usize,
    },

    #[error("unbalanced parentheses at position {position}")]
    UnbalancedParens { position: usize },

    #[error("unexpected '{found}' at position {position}")]
    UnexpectedToken { found: String, position: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unterminated string starting at position {position}")]
    UnterminatedString { position: usize },

    #[error("invalid number '{0}'")]
    InvalidNumber(String),

    #[error("invalid argument {index} to {kind}(): {reason}")]
    InvalidArgument {
        kind: String,
        index: usize,
        reason: String,
    },

    #[error(transparent)]
    InvalidTokenName(#[from] TypeError),

    #[error("unexpected input after rule at position {position}")]
    TrailingInput { position: usize },
}

/// Parse rule text using the built-in kinds only.
///
/// # Example
///
/// ```
/// use rafters_tokens::rules::{parse, Rule};
///
/// let rule = parse("state(primary, 1.1, hover)").unwrap();
/// assert_eq!(rule.kind(), "state");
/// assert_eq!(rule.dependencies().len(), 1);
///
/// assert!(parse("calc(primary.l * 0.8").is_err());
/// ```
pub fn parse(text: &str) -> Result<Rule, RuleParseError> {
    RuleParser::new().parse(text)
}

/// A rule parser, optionally aware of custom rule kinds.
#[derive(Debug, Clone)]
pub struct RuleParser {
    custom_kinds: BTreeSet<String>,
    max_length: usize,
}

impl Default for RuleParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleParser {
    /// A parser for the built-in kinds.
    pub fn new() -> Self {
        Self {
            custom_kinds: BTreeSet::new(),
            max_length: DEFAULT_MAX_RULE_LENGTH,
        }
    }

    /// Also accept the given custom kinds (case-insensitive).
    pub fn with_custom_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.custom_kinds
            .extend(kinds.into_iter().map(|k| k.as_ref().to_ascii_lowercase()));
        self
    }

    /// Reject rule text longer than `max` bytes.
    pub fn with_max_length(mut self, max: usize) -> Self {
        self.max_length = max;
        self
    }

    /// Register one more custom kind.
    pub fn add_custom_kind(&mut self, kind: &str) {
        self.custom_kinds.insert(kind.to_ascii_lowercase());
    }

    /// Parse rule text.
    ///
    /// # Errors
    ///
    /// Returns `RuleParseError` for an unknown kind, a wrong argument count,
    /// malformed expression syntax, or a numeric literal that does not parse.
    pub fn parse(&self, text: &str) -> Result<Rule, RuleParseError> {
        if text.len() > self.max_length {
            return Err(RuleParseError::TooLong {
                length: text.len(),
                max: self.max_length,
            });
        }
        if text.trim().is_empty() {
            return Err(RuleParseError::Empty);
        }

        check_balance(text)?;

        let (body, kind) = call_head(text)
            .finish()
            .map_err(|err| RuleParseError::ExpectedCall {
                position: offset(text, err.input),
            })?;
        let kind = kind.to_ascii_lowercase();
        if !BUILTIN_KINDS.contains(&kind.as_str()) && !self.custom_kinds.contains(&kind) {
            return Err(RuleParseError::UnknownKind(kind));
        }

        if kind == "calc" {
            let (rest, exprs) = calc_arguments(body)
                .finish()
                .map_err(|err| err.into_parse_error(text))?;
            expect_end(text, rest)?;
            let found = exprs.len();
            let [expr]: [Expr; 1] = exprs.try_into().map_err(|_| RuleParseError::Arity {
                kind,
                expected: 1,
                found,
            })?;
            return Ok(Rule::Calc(expr));
        }

        let (rest, args) = arguments(body)
            .finish()
            .map_err(|err| err.into_parse_error(text))?;
        expect_end(text, rest)?;
        build(kind, args)
    }
}

/// Give parsed arguments their per-kind meaning.
fn build(kind: String, args: Vec<RawArg>) -> Result<Rule, RuleParseError> {
    match kind.as_str() {
        "state" => {
            let args = expect_arity(&kind, args, 3)?;
            let base = token_arg(&kind, 1, &args[0])?;
            let factor = number_arg(&kind, 2, &args[1])?;
            let state = word_arg(&kind, 3, &args[2])?
                .parse::<StateName>()
                .map_err(|reason| invalid(&kind, 3, reason))?;
            Ok(Rule::State {
                base,
                factor,
                state,
            })
        }
        "scale" => {
            let args = expect_arity(&kind, args, 2)?;
            let family = token_arg(&kind, 1, &args[0])?;
            let position = position_arg(&kind, 2, &args[1])?;
            Ok(Rule::Scale { family, position })
        }
        "contrast" => {
            let args = expect_arity(&kind, args, 2)?;
            let target = token_arg(&kind, 1, &args[0])?;
            let standard = word_arg(&kind, 2, &args[1])?
                .parse::<ContrastStandard>()
                .map_err(|reason| invalid(&kind, 2, reason))?;
            Ok(Rule::Contrast { target, standard })
        }
        "invert" => {
            let args = expect_arity(&kind, args, 1)?;
            let base = token_arg(&kind, 1, &args[0])?;
            Ok(Rule::Invert { base })
        }
        _ => {
            let args = args
                .into_iter()
                .map(|arg| match arg {
                    RawArg::Quoted(s) => Ok(RuleArg::Text(s)),
                    RawArg::Number(n) => Ok(RuleArg::Number(n)),
                    RawArg::Bare(s) => Ok(RuleArg::Ref(TokenName::new(s)?)),
                })
                .collect::<Result<Vec<_>, RuleParseError>>()?;
            Ok(Rule::Custom { kind, args })
        }
    }
}

/// Only whitespace may follow the closing parenthesis.
fn expect_end(text: &str, rest: &str) -> Result<(), RuleParseError> {
    let rest = rest.trim_start();
    if rest.is_empty() {
        return Ok(());
    }
    Err(RuleParseError::TrailingInput {
        position: offset(text, rest),
    })
}

fn invalid(kind: &str, index: usize, reason: impl ToString) -> RuleParseError {
    RuleParseError::InvalidArgument {
        kind: kind.to_string(),
        index,
        reason: reason.to_string(),
    }
}

/// Check parentheses outside string literals balance.
fn check_balance(text: &str) -> Result<(), RuleParseError> {
    let mut depth: usize = 0;
    let mut last_open = 0;
    let mut quote: Option<char> = None;

    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => {
                depth += 1;
                last_open = i;
            }
            (None, ')') => {
                depth = depth
                    .checked_sub(1)
                    .ok_or(RuleParseError::UnbalancedParens { position: i })?;
            }
            _ => {}
        }
    }

    if depth > 0 {
        return Err(RuleParseError::UnbalancedParens {
            position: last_open,
        });
    }
    Ok(())
}

fn expect_arity(
    kind: &str,
    args: Vec<RawArg>,
    expected: usize,
) -> Result<Vec<RawArg>, RuleParseError> {
    if args.len() != expected {
        return Err(RuleParseError::Arity {
            kind: kind.to_string(),
            expected,
            found: args.len(),
        });
    }
    Ok(args)
}

fn token_arg(kind: &str, index: usize, arg: &RawArg) -> Result<TokenName, RuleParseError> {
    match arg {
        RawArg::Bare(s) | RawArg::Quoted(s) => Ok(TokenName::new(s.as_str())?),
        RawArg::Number(n) => Err(invalid(kind, index, format!("expected a token, found {n}"))),
    }
}

fn number_arg(kind: &str, index: usize, arg: &RawArg) -> Result<f64, RuleParseError> {
    match arg {
        RawArg::Number(n) => Ok(*n),
        other => Err(invalid(
            kind,
            index,
            format!("expected a number, found '{}'", other.word().unwrap_or_default()),
        )),
    }
}

fn word_arg<'a>(kind: &str, index: usize, arg: &'a RawArg) -> Result<&'a str, RuleParseError> {
    arg.word()
        .ok_or_else(|| invalid(kind, index, "expected a name, found a number"))
}

fn position_arg(kind: &str, index: usize, arg: &RawArg) -> Result<u32, RuleParseError> {
    let n = number_arg(kind, index, arg)?;
    if n < 0.0 || n.fract() != 0.0 || n > f64::from(u32::MAX) {
        return Err(invalid(
            kind,
            index,
            format!("expected a non-negative integer position, found {n}"),
        ));
    }
    // Range and integrality checked above.
    Ok(n as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Channel;
    use crate::rules::expr::{BinaryOp, Reference};

    fn name(s: &str) -> TokenName {
        TokenName::new(s).unwrap()
    }

    fn r(s: &str) -> Expr {
        Expr::Ref(Reference::new(name(s)))
    }

    mod calc {
        use super::*;

        #[test]
        fn channel_times_literal() {
            let rule = parse("calc(primary.l * 0.8)").unwrap();
            assert_eq!(
                rule,
                Rule::Calc(Expr::binary(
                    BinaryOp::Mul,
                    Expr::Ref(Reference::with_channel(name("primary"), Channel::Lightness)),
                    Expr::Number(0.8),
                ))
            );
        }

        #[test]
        fn precedence_and_left_associativity() {
            // a - b - c * 2 == (a - b) - (c * 2)
            let rule = parse("calc(a - b - c * 2)").unwrap();
            assert_eq!(
                rule,
                Rule::Calc(Expr::binary(
                    BinaryOp::Sub,
                    Expr::binary(BinaryOp::Sub, r("a"), r("b")),
                    Expr::binary(BinaryOp::Mul, r("c"), Expr::Number(2.0)),
                ))
            );
        }

        #[test]
        fn division_is_left_associative() {
            let rule = parse("calc(8 / 4 / 2)").unwrap();
            assert_eq!(
                rule,
                Rule::Calc(Expr::binary(
                    BinaryOp::Div,
                    Expr::binary(BinaryOp::Div, Expr::Number(8.0), Expr::Number(4.0)),
                    Expr::Number(2.0),
                ))
            );
        }

        #[test]
        fn parentheses_and_unary_minus() {
            let rule = parse("calc(-(a + 1) * 2)").unwrap();
            assert_eq!(
                rule,
                Rule::Calc(Expr::binary(
                    BinaryOp::Mul,
                    Expr::Neg(Box::new(Expr::binary(BinaryOp::Add, r("a"), Expr::Number(1.0)))),
                    Expr::Number(2.0),
                ))
            );
        }

        #[test]
        fn braced_hyphenated_reference() {
            let rule = parse("calc({spacing-4} * 2)").unwrap();
            let deps: Vec<String> = rule.dependencies().into_iter().map(String::from).collect();
            assert_eq!(deps, vec!["spacing-4"]);
        }

        #[test]
        fn dependencies_deduplicated() {
            let rule = parse("calc(a + b * a)").unwrap();
            assert_eq!(rule.dependencies().len(), 2);
        }

        #[test]
        fn missing_closing_paren() {
            assert!(matches!(
                parse("calc(primary.l * 0.8"),
                Err(RuleParseError::UnbalancedParens { .. })
            ));
        }

        #[test]
        fn stray_closing_paren() {
            assert_eq!(
                parse("calc(a))"),
                Err(RuleParseError::UnbalancedParens { position: 7 })
            );
        }

        #[test]
        fn dangling_operator() {
            assert_eq!(
                parse("calc(a *)"),
                Err(RuleParseError::UnexpectedToken {
                    found: ")".into(),
                    position: 8
                })
            );
        }

        #[test]
        fn unknown_operator_is_positioned() {
            assert_eq!(
                parse("calc(a % b)"),
                Err(RuleParseError::UnexpectedToken {
                    found: "%".into(),
                    position: 7
                })
            );
        }

        #[test]
        fn unclosed_brace_runs_to_the_end() {
            assert_eq!(parse("calc({primary)"), Err(RuleParseError::UnexpectedEnd));
        }

        #[test]
        fn whitespace_around_operators_and_commas() {
            assert_eq!(parse("calc( a*2 )"), parse("calc(a * 2)"));
            assert_eq!(
                parse("calc(a , b)"),
                Err(RuleParseError::Arity {
                    kind: "calc".into(),
                    expected: 1,
                    found: 2
                })
            );
        }

        #[test]
        fn adjacent_operands() {
            assert_eq!(
                parse("calc(a b)"),
                Err(RuleParseError::UnexpectedToken {
                    found: "b".into(),
                    position: 7
                })
            );
        }

        #[test]
        fn bad_number() {
            assert_eq!(
                parse("calc(1.2.3 + a)"),
                Err(RuleParseError::InvalidNumber("1.2.3".into()))
            );
        }

        #[test]
        fn unknown_channel() {
            assert!(matches!(
                parse("calc(primary.q)"),
                Err(RuleParseError::UnexpectedToken { .. })
            ));
        }

        #[test]
        fn arity() {
            assert_eq!(
                parse("calc()"),
                Err(RuleParseError::Arity {
                    kind: "calc".into(),
                    expected: 1,
                    found: 0
                })
            );
            assert_eq!(
                parse("calc(a, b)"),
                Err(RuleParseError::Arity {
                    kind: "calc".into(),
                    expected: 1,
                    found: 2
                })
            );
        }
    }

    mod state {
        use super::*;

        #[test]
        fn bare_and_quoted_state_names() {
            let expected = Rule::State {
                base: name("primary"),
                factor: 1.1,
                state: StateName::Hover,
            };
            assert_eq!(parse("state(primary, 1.1, hover)").unwrap(), expected);
            assert_eq!(parse("State(primary, 1.1, \"hover\")").unwrap(), expected);
        }

        #[test]
        fn factor_must_be_numeric() {
            assert!(matches!(
                parse("state(primary, big, hover)"),
                Err(RuleParseError::InvalidArgument { index: 2, .. })
            ));
        }

        #[test]
        fn unknown_state_name() {
            assert!(matches!(
                parse("state(primary, 1.1, wiggle)"),
                Err(RuleParseError::InvalidArgument { index: 3, .. })
            ));
        }

        #[test]
        fn wrong_arity() {
            assert_eq!(
                parse("state(primary, 1.1)"),
                Err(RuleParseError::Arity {
                    kind: "state".into(),
                    expected: 3,
                    found: 2
                })
            );
        }
    }

    mod scale {
        use super::*;

        #[test]
        fn family_and_position() {
            assert_eq!(
                parse("scale(blue, 600)").unwrap(),
                Rule::Scale {
                    family: name("blue"),
                    position: 600
                }
            );
        }

        #[test]
        fn fractional_position_rejected() {
            assert!(matches!(
                parse("scale(blue, 60.5)"),
                Err(RuleParseError::InvalidArgument { index: 2, .. })
            ));
        }

        #[test]
        fn negative_position_rejected() {
            assert!(matches!(
                parse("scale(blue, -100)"),
                Err(RuleParseError::InvalidArgument { .. })
            ));
        }
    }

    mod contrast {
        use super::*;

        #[test]
        fn standards() {
            assert_eq!(
                parse("contrast(bg, \"AAA\")").unwrap(),
                Rule::Contrast {
                    target: name("bg"),
                    standard: ContrastStandard::Aaa
                }
            );
            assert_eq!(
                parse("contrast(bg, AA-large)").unwrap(),
                Rule::Contrast {
                    target: name("bg"),
                    standard: ContrastStandard::AaLarge
                }
            );
        }

        #[test]
        fn unknown_standard() {
            assert!(matches!(
                parse("contrast(bg, AAAA)"),
                Err(RuleParseError::InvalidArgument { .. })
            ));
        }
    }

    mod invert {
        use super::*;

        #[test]
        fn single_token() {
            assert_eq!(
                parse("invert(surface-50)").unwrap(),
                Rule::Invert {
                    base: name("surface-50")
                }
            );
        }

        #[test]
        fn invalid_token_name() {
            assert!(matches!(
                parse("invert(\"not a name\")"),
                Err(RuleParseError::InvalidTokenName(_))
            ));
        }
    }

    mod structure {
        use super::*;

        #[test]
        fn unknown_kind() {
            assert_eq!(
                parse("lighten(primary, 0.1)"),
                Err(RuleParseError::UnknownKind("lighten".into()))
            );
        }

        #[test]
        fn custom_kind_accepted_when_configured() {
            let parser = RuleParser::new().with_custom_kinds(["Fluid"]);
            let rule = parser.parse("fluid(spacing-base, 1.5, \"vw\")").unwrap();
            assert_eq!(
                rule,
                Rule::Custom {
                    kind: "fluid".into(),
                    args: vec![
                        RuleArg::Ref(name("spacing-base")),
                        RuleArg::Number(1.5),
                        RuleArg::Text("vw".into()),
                    ]
                }
            );
            assert_eq!(rule.dependencies().len(), 1);
        }

        #[test]
        fn empty_and_whitespace() {
            assert_eq!(parse(""), Err(RuleParseError::Empty));
            assert_eq!(parse("   "), Err(RuleParseError::Empty));
        }

        #[test]
        fn not_a_call() {
            assert_eq!(
                parse("primary"),
                Err(RuleParseError::ExpectedCall { position: 7 })
            );
            assert_eq!(
                parse("  (primary)"),
                Err(RuleParseError::ExpectedCall { position: 2 })
            );
        }

        #[test]
        fn empty_argument_is_positioned() {
            assert_eq!(
                parse("state(primary,, hover)"),
                Err(RuleParseError::UnexpectedToken {
                    found: ",".into(),
                    position: 13
                })
            );
        }

        #[test]
        fn trailing_input() {
            assert!(matches!(
                parse("invert(a) extra"),
                Err(RuleParseError::TrailingInput { position: 10 })
            ));
        }

        #[test]
        fn too_long() {
            let parser = RuleParser::new().with_max_length(8);
            assert!(matches!(
                parser.parse("invert(primary)"),
                Err(RuleParseError::TooLong { max: 8, .. })
            ));
        }

        #[test]
        fn surrounding_whitespace_ignored() {
            assert!(parse("  invert( a )  ").is_ok());
        }

        #[test]
        fn unterminated_string() {
            assert!(matches!(
                parse("contrast(bg, \"AAA)"),
                Err(RuleParseError::UnbalancedParens { .. })
            ));
        }

        #[test]
        fn canonical_text_reparses() {
            for text in [
                "calc((a + {b-1}.l) * -2 / c)",
                "state(primary, 0.9, active)",
                "scale(blue, 600)",
                "contrast(bg, AA-large)",
                "invert(surface)",
            ] {
                let rule = parse(text).unwrap();
                let again = parse(&rule.to_string()).unwrap();
                assert_eq!(rule, again, "round-trip of {text}");
            }
        }
    }
}
