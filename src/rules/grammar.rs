//! rules::grammar
//!
//! nom combinators for rule text.
//!
//! ```text
//! call      := kind '(' args ')'
//! args      := (arg (',' arg)*)?
//! arg       := QUOTED | NUMBER | WORD
//! expr      := term (('+' | '-') term)*
//! term      := unary (('*' | '/') unary)*
//! unary     := '-' unary | primary
//! primary   := NUMBER | reference | '(' expr ')'
//! reference := (IDENT | '{' NAME '}') ('.' CHANNEL)?
//! ```
//!
//! Every combinator runs on a suffix of the full rule text, so the
//! remainder carried by a [`SyntaxError`] is enough to recover a byte
//! position.

use nom::branch::alt;
use nom::bytes::complete::{take_till, take_while, take_while1};
use nom::character::complete::{char, digit0, digit1, multispace0, one_of, satisfy};
use nom::combinator::{cut, map, opt, recognize, value};
use nom::error::{ErrorKind, ParseError};
use nom::multi::{many0, separated_list0};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::IResult;

use super::expr::{BinaryOp, Expr, Reference};
use super::parser::RuleParseError;
use crate::core::types::{Channel, TokenName};

pub(crate) type PResult<'a, O> = IResult<&'a str, O, SyntaxError<'a>>;

/// What went wrong at [`SyntaxError::input`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SyntaxErrorKind {
    /// The grammar expected something else here.
    Unexpected,
    /// A quote with no closing quote; the input starts at the opening quote.
    UnterminatedString,
    /// Well-formed syntax carrying an invalid value.
    Invalid(RuleParseError),
}

/// Parse failure with the unparsed remainder of the rule text.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SyntaxError<'a> {
    pub input: &'a str,
    pub kind: SyntaxErrorKind,
}

impl<'a> ParseError<&'a str> for SyntaxError<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        Self {
            input,
            kind: SyntaxErrorKind::Unexpected,
        }
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<'a> SyntaxError<'a> {
    fn failure(input: &'a str, kind: SyntaxErrorKind) -> nom::Err<Self> {
        nom::Err::Failure(Self { input, kind })
    }

    fn invalid(input: &'a str, err: impl Into<RuleParseError>) -> nom::Err<Self> {
        Self::failure(input, SyntaxErrorKind::Invalid(err.into()))
    }

    /// Convert to a positioned error against `original`, the full text
    /// this error's input is a suffix of.
    pub(crate) fn into_parse_error(self, original: &str) -> RuleParseError {
        match self.kind {
            SyntaxErrorKind::Invalid(err) => err,
            SyntaxErrorKind::UnterminatedString => RuleParseError::UnterminatedString {
                position: offset(original, self.input),
            },
            SyntaxErrorKind::Unexpected => {
                let rest = self.input.trim_start();
                if rest.is_empty() {
                    return RuleParseError::UnexpectedEnd;
                }
                RuleParseError::UnexpectedToken {
                    found: leading_lexeme(rest),
                    position: offset(original, rest),
                }
            }
        }
    }
}

/// Byte offset of `rest` within `original`, given `rest` is a suffix of it.
pub(crate) fn offset(original: &str, rest: &str) -> usize {
    original.len().saturating_sub(rest.len())
}

/// The word or single character an error points at.
fn leading_lexeme(rest: &str) -> String {
    let word: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if word.is_empty() {
        rest.chars().next().map(String::from).unwrap_or_default()
    } else {
        word
    }
}

/// A call argument before it is given a per-kind meaning.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawArg {
    Quoted(String),
    Bare(String),
    Number(f64),
}

impl RawArg {
    /// Text of a word argument, quoted or bare.
    pub(crate) fn word(&self) -> Option<&str> {
        match self {
            RawArg::Quoted(s) | RawArg::Bare(s) => Some(s),
            RawArg::Number(_) => None,
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// `kind(` with optional leading whitespace; yields the kind as written.
pub(crate) fn call_head(input: &str) -> PResult<'_, &str> {
    preceded(multispace0, terminated(take_while1(is_word_char), char('(')))(input)
}

/// Comma-separated arguments up to and including the closing `)`.
pub(crate) fn arguments(input: &str) -> PResult<'_, Vec<RawArg>> {
    terminated(
        separated_list0(char(','), delimited(multispace0, argument, multispace0)),
        preceded(multispace0, char(')')),
    )(input)
}

fn argument(input: &str) -> PResult<'_, RawArg> {
    alt((
        map(quoted, |s| RawArg::Quoted(s.to_string())),
        map(signed_number, RawArg::Number),
        map(take_while1(is_word_char), |s: &str| RawArg::Bare(s.to_string())),
    ))(input)
}

/// Single- or double-quoted text without escapes.
fn quoted(input: &str) -> PResult<'_, &str> {
    let (rest, quote) = one_of::<_, _, SyntaxError>("\"'")(input)?;
    match rest.find(quote) {
        Some(end) => Ok((&rest[end + 1..], &rest[..end])),
        None => Err(SyntaxError::failure(
            input,
            SyntaxErrorKind::UnterminatedString,
        )),
    }
}

/// Digits with any run of digits and dots after them, and an optional
/// exponent. Malformed runs such as `1.2.3` are caught by [`number`].
fn number_text(input: &str) -> PResult<'_, &str> {
    recognize(tuple((
        alt((digit1, recognize(pair(char('.'), digit1)))),
        take_while(|c: char| c.is_ascii_digit() || c == '.'),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit0))),
    )))(input)
}

fn to_number<'a>(input: &'a str, rest: &'a str, text: &str) -> PResult<'a, f64> {
    text.parse::<f64>()
        .map(|n| (rest, n))
        .map_err(|_| SyntaxError::invalid(input, RuleParseError::InvalidNumber(text.to_string())))
}

fn number(input: &str) -> PResult<'_, f64> {
    let (rest, text) = number_text(input)?;
    to_number(input, rest, text)
}

fn signed_number(input: &str) -> PResult<'_, f64> {
    let (rest, text) = recognize(pair(opt(one_of("+-")), number_text))(input)?;
    to_number(input, rest, text)
}

/// Expressions of a `calc(...)` body up to and including the closing `)`.
pub(crate) fn calc_arguments(input: &str) -> PResult<'_, Vec<Expr>> {
    terminated(
        separated_list0(preceded(multispace0, char(',')), expr),
        preceded(multispace0, char(')')),
    )(input)
}

fn expr(input: &str) -> PResult<'_, Expr> {
    let (input, first) = term(input)?;
    let (input, rest) = many0(pair(preceded(multispace0, additive), cut(term)))(input)?;
    Ok((input, fold(first, rest)))
}

fn term(input: &str) -> PResult<'_, Expr> {
    let (input, first) = unary(input)?;
    let (input, rest) = many0(pair(preceded(multispace0, multiplicative), cut(unary)))(input)?;
    Ok((input, fold(first, rest)))
}

/// Left-associative fold of `first op rhs op rhs ...`.
fn fold(first: Expr, rest: Vec<(BinaryOp, Expr)>) -> Expr {
    rest.into_iter()
        .fold(first, |lhs, (op, rhs)| Expr::binary(op, lhs, rhs))
}

fn additive(input: &str) -> PResult<'_, BinaryOp> {
    alt((
        value(BinaryOp::Add, char('+')),
        value(BinaryOp::Sub, char('-')),
    ))(input)
}

fn multiplicative(input: &str) -> PResult<'_, BinaryOp> {
    alt((
        value(BinaryOp::Mul, char('*')),
        value(BinaryOp::Div, char('/')),
    ))(input)
}

fn unary(input: &str) -> PResult<'_, Expr> {
    preceded(
        multispace0,
        alt((
            map(preceded(char('-'), cut(unary)), |e| Expr::Neg(Box::new(e))),
            primary,
        )),
    )(input)
}

fn primary(input: &str) -> PResult<'_, Expr> {
    alt((
        map(number, Expr::Number),
        map(reference, Expr::Ref),
        delimited(
            char('('),
            cut(expr),
            cut(preceded(multispace0, char(')'))),
        ),
    ))(input)
}

fn reference(input: &str) -> PResult<'_, Reference> {
    let (rest, raw) = alt((braced, identifier))(input)?;
    let token = TokenName::new(raw.trim()).map_err(|err| SyntaxError::invalid(input, err))?;
    let (rest, channel) = opt(preceded(char('.'), cut(channel)))(rest)?;
    Ok((rest, Reference { token, channel }))
}

/// `{name}`; the name may contain hyphens.
fn braced(input: &str) -> PResult<'_, &str> {
    preceded(
        char('{'),
        cut(terminated(take_till(|c: char| c == '}'), char('}'))),
    )(input)
}

/// `[A-Za-z_][A-Za-z0-9_]*`
fn identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        satisfy(|c| c.is_ascii_alphabetic() || c == '_'),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

fn channel(input: &str) -> PResult<'_, Channel> {
    let (rest, name) = take_while1::<_, _, SyntaxError>(|c: char| c.is_ascii_alphanumeric())(input)?;
    name.parse::<Channel>()
        .map(|channel| (rest, channel))
        .map_err(|_| SyntaxError::failure(input, SyntaxErrorKind::Unexpected))
}

#[cfg(test)]
mod tests {
    use nom::Finish;

    use super::*;

    fn name(s: &str) -> TokenName {
        TokenName::new(s).unwrap()
    }

    fn expr_error(text: &str) -> RuleParseError {
        expr(text).finish().unwrap_err().into_parse_error(text)
    }

    #[test]
    fn exponent_numbers() {
        assert_eq!(number("1.5e2"), Ok(("", 150.0)));
        assert_eq!(number("2E-1 rest"), Ok((" rest", 0.2)));
        assert_eq!(signed_number("-.5,"), Ok((",", -0.5)));
    }

    #[test]
    fn malformed_number_rejected() {
        assert_eq!(
            expr_error("1.2.3"),
            RuleParseError::InvalidNumber("1.2.3".into())
        );
        assert_eq!(expr_error("4e"), RuleParseError::InvalidNumber("4e".into()));
    }

    #[test]
    fn channel_suffix() {
        assert_eq!(
            expr("primary.l"),
            Ok((
                "",
                Expr::Ref(Reference::with_channel(name("primary"), Channel::Lightness))
            ))
        );
    }

    #[test]
    fn braced_reference_allows_hyphens() {
        assert_eq!(
            expr("{spacing-4}-2"),
            Ok((
                "",
                Expr::binary(
                    BinaryOp::Sub,
                    Expr::Ref(Reference::new(name("spacing-4"))),
                    Expr::Number(2.0)
                )
            ))
        );
    }

    #[test]
    fn unterminated_brace_is_unexpected_end() {
        assert_eq!(expr_error("{primary"), RuleParseError::UnexpectedEnd);
    }

    #[test]
    fn operand_error_points_at_offending_text() {
        let text = "calc(a * %)";
        let err = expr(&text[5..]).finish().unwrap_err().into_parse_error(text);
        assert_eq!(
            err,
            RuleParseError::UnexpectedToken {
                found: "%".into(),
                position: 9
            }
        );
    }

    #[test]
    fn unterminated_string_position() {
        let text = "f(a, \"open";
        let err = arguments(&text[2..]).finish().unwrap_err().into_parse_error(text);
        assert_eq!(err, RuleParseError::UnterminatedString { position: 5 });
    }

    #[test]
    fn arguments_classified() {
        assert_eq!(
            arguments(" blue , 600, 'AA-large', -1.5e1)"),
            Ok((
                "",
                vec![
                    RawArg::Bare("blue".into()),
                    RawArg::Number(600.0),
                    RawArg::Quoted("AA-large".into()),
                    RawArg::Number(-15.0),
                ]
            ))
        );
        assert_eq!(arguments(")"), Ok(("", vec![])));
    }

    #[test]
    fn call_head_keeps_case() {
        assert_eq!(call_head("  State(x)"), Ok(("x)", "State")));
        assert!(call_head("state (x)").is_err());
    }
}
