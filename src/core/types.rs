//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`TokenName`] - Validated token identifier
//! - [`Namespace`] - Validated grouping label for tokens
//! - [`Category`] - Closed set of token categories
//! - [`Channel`] - Numeric property of a structured value
//! - [`ColorValue`] - OKLCH color, opaque to the engine
//! - [`TokenValue`] - Literal or structured token value
//! - [`Fingerprint`] - Hash of resolved values for determinism checks
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use rafters_tokens::core::types::{Namespace, TokenName};
//!
//! // Valid constructions
//! let name = TokenName::new("primary-500").unwrap();
//! let ns = Namespace::new("brand/web").unwrap();
//!
//! // Invalid constructions fail at creation time
//! assert!(TokenName::new("primary.l").is_err());
//! assert!(TokenName::new("500").is_err());
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid token name: {0}")]
    InvalidTokenName(String),

    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),

    #[error("unknown category: {0}")]
    UnknownCategory(String),

    #[error("unknown channel: {0}")]
    UnknownChannel(String),
}

/// Longest accepted token name, in bytes.
pub const MAX_TOKEN_NAME_LEN: usize = 128;

/// A validated design token name.
///
/// Token names must:
/// - Be non-empty and at most [`MAX_TOKEN_NAME_LEN`] bytes
/// - Start with an ASCII letter or `_`
/// - Contain only ASCII alphanumerics, `_` and `-`
///
/// `.` is not allowed because it selects a channel inside `calc`
/// expressions (`primary.l`).
///
/// # Example
///
/// ```
/// use rafters_tokens::core::types::TokenName;
///
/// let name = TokenName::new("spacing-4").unwrap();
/// assert_eq!(name.as_str(), "spacing-4");
///
/// assert!(TokenName::new("").is_err());
/// assert!(TokenName::new("-leading").is_err());
/// assert!(TokenName::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenName(String);

impl TokenName {
    /// Create a new validated token name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidTokenName` if the name violates the naming rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        let mut chars = name.chars();
        let first = chars
            .next()
            .ok_or_else(|| TypeError::InvalidTokenName("token name cannot be empty".into()))?;

        if name.len() > MAX_TOKEN_NAME_LEN {
            return Err(TypeError::InvalidTokenName(format!(
                "token name cannot exceed {MAX_TOKEN_NAME_LEN} bytes"
            )));
        }

        if !(first.is_ascii_alphabetic() || first == '_') {
            return Err(TypeError::InvalidTokenName(format!(
                "'{name}' must start with a letter or '_'"
            )));
        }

        if let Some(c) = chars.find(|c| !is_name_char(*c)) {
            return Err(TypeError::InvalidTokenName(format!(
                "'{name}' cannot contain '{}'",
                c.escape_default()
            )));
        }

        Ok(())
    }

    /// Get the token name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Characters allowed after the first character of a token name.
pub(crate) fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

impl TryFrom<String> for TokenName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl TryFrom<&str> for TokenName {
    type Error = TypeError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<TokenName> for String {
    fn from(name: TokenName) -> Self {
        name.0
    }
}

impl AsRef<str> for TokenName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for TokenName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated namespace label used to group tokens.
///
/// Follows the token name rules, with `/` and `.` additionally allowed as
/// separators (`brand/web`, `theme.dark`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Namespace(String);

impl Namespace {
    /// The namespace used when a definition does not name one.
    pub const DEFAULT: &'static str = "default";

    /// Create a new validated namespace.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidNamespace` if the label is empty, starts
    /// or ends with a separator, or contains other characters.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(TypeError::InvalidNamespace(
                "namespace cannot be empty".into(),
            ));
        }
        let is_sep = |c: char| c == '/' || c == '.';
        if name.starts_with(is_sep) || name.ends_with(is_sep) {
            return Err(TypeError::InvalidNamespace(format!(
                "'{name}' cannot start or end with a separator"
            )));
        }
        if let Some(c) = name.chars().find(|c| !(is_name_char(*c) || is_sep(*c))) {
            return Err(TypeError::InvalidNamespace(format!(
                "'{name}' cannot contain '{}'",
                c.escape_default()
            )));
        }
        Ok(Self(name))
    }

    /// Get the namespace as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Self(Self::DEFAULT.to_string())
    }
}

impl TryFrom<String> for Namespace {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Namespace> for String {
    fn from(ns: Namespace) -> Self {
        ns.0
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token category. Used for grouping and filtering only; graph logic
/// never looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Color,
    Spacing,
    FontSize,
    FontFamily,
    FontWeight,
    LineHeight,
    Motion,
    Easing,
    Shadow,
    Radius,
    Opacity,
    ZIndex,
    Breakpoint,
    BorderWidth,
    Other,
}

impl Category {
    /// All categories, in declaration order.
    pub const ALL: [Category; 15] = [
        Category::Color,
        Category::Spacing,
        Category::FontSize,
        Category::FontFamily,
        Category::FontWeight,
        Category::LineHeight,
        Category::Motion,
        Category::Easing,
        Category::Shadow,
        Category::Radius,
        Category::Opacity,
        Category::ZIndex,
        Category::Breakpoint,
        Category::BorderWidth,
        Category::Other,
    ];

    /// The kebab-case wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Color => "color",
            Category::Spacing => "spacing",
            Category::FontSize => "font-size",
            Category::FontFamily => "font-family",
            Category::FontWeight => "font-weight",
            Category::LineHeight => "line-height",
            Category::Motion => "motion",
            Category::Easing => "easing",
            Category::Shadow => "shadow",
            Category::Radius => "radius",
            Category::Opacity => "opacity",
            Category::ZIndex => "z-index",
            Category::Breakpoint => "breakpoint",
            Category::BorderWidth => "border-width",
            Category::Other => "other",
        }
    }
}

impl FromStr for Category {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| TypeError::UnknownCategory(s.to_string()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A numeric property of a structured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Lightness,
    Chroma,
    Hue,
    Alpha,
}

impl Channel {
    /// Short spelling used in canonical rule text.
    pub fn short(self) -> &'static str {
        match self {
            Channel::Lightness => "l",
            Channel::Chroma => "c",
            Channel::Hue => "h",
            Channel::Alpha => "alpha",
        }
    }
}

impl FromStr for Channel {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "l" | "lightness" => Ok(Channel::Lightness),
            "c" | "chroma" => Ok(Channel::Chroma),
            "h" | "hue" => Ok(Channel::Hue),
            "a" | "alpha" => Ok(Channel::Alpha),
            _ => Err(TypeError::UnknownChannel(s.to_string())),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short())
    }
}

fn default_alpha() -> f64 {
    1.0
}

/// An OKLCH color.
///
/// The engine never interprets the channels; only the color-math
/// collaborator reads or writes them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColorValue {
    pub l: f64,
    pub c: f64,
    pub h: f64,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
}

impl ColorValue {
    /// Create an opaque color.
    pub fn oklch(l: f64, c: f64, h: f64) -> Self {
        Self {
            l,
            c,
            h,
            alpha: 1.0,
        }
    }

    /// Return a copy with a different alpha.
    pub fn with_alpha(self, alpha: f64) -> Self {
        Self { alpha, ..self }
    }
}

impl fmt::Display for ColorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "oklch({} {} {} / {})", self.l, self.c, self.h, self.alpha)
    }
}

/// The value of a token: a literal or a structured color.
///
/// Untagged on the wire: a JSON number, a string, or an
/// `{ "l", "c", "h", "alpha"? }` object.
///
/// # Example
///
/// ```
/// use rafters_tokens::core::types::{ColorValue, TokenValue};
///
/// let v: TokenValue = serde_json::from_str(r#"{"l": 0.6, "c": 0.2, "h": 220}"#).unwrap();
/// assert_eq!(v, TokenValue::Color(ColorValue::oklch(0.6, 0.2, 220.0)));
///
/// let n: TokenValue = serde_json::from_str("16").unwrap();
/// assert_eq!(n.as_number(), Some(16.0));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenValue {
    Number(f64),
    Text(String),
    Color(ColorValue),
}

impl TokenValue {
    /// Numeric view of the value.
    ///
    /// Numbers are returned as-is. Text yields its leading numeric part
    /// (`"16px"` gives `16.0`). Colors have no single numeric view.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            TokenValue::Number(n) => Some(*n),
            TokenValue::Text(s) => leading_number(s),
            TokenValue::Color(_) => None,
        }
    }

    /// The color, if this is a structured color value.
    pub fn as_color(&self) -> Option<&ColorValue> {
        match self {
            TokenValue::Color(c) => Some(c),
            _ => None,
        }
    }

    /// Canonical textual form used for hashing.
    fn canonical(&self) -> String {
        match self {
            TokenValue::Number(n) => format!("n:{n}"),
            TokenValue::Text(s) => format!("t:{s}"),
            TokenValue::Color(c) => format!("c:{}:{}:{}:{}", c.l, c.c, c.h, c.alpha),
        }
    }
}

/// Parse the longest numeric prefix of `s` (after trimming whitespace).
fn leading_number(s: &str) -> Option<f64> {
    let s = s.trim();
    let end = s
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || *c == '.' || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()?;
    s[..end].parse().ok()
}

impl From<f64> for TokenValue {
    fn from(n: f64) -> Self {
        TokenValue::Number(n)
    }
}

impl From<&str> for TokenValue {
    fn from(s: &str) -> Self {
        TokenValue::Text(s.to_string())
    }
}

impl From<String> for TokenValue {
    fn from(s: String) -> Self {
        TokenValue::Text(s)
    }
}

impl From<ColorValue> for TokenValue {
    fn from(c: ColorValue) -> Self {
        TokenValue::Color(c)
    }
}

impl fmt::Display for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenValue::Number(n) => write!(f, "{n}"),
            TokenValue::Text(s) => f.write_str(s),
            TokenValue::Color(c) => write!(f, "{c}"),
        }
    }
}

/// A hash over a set of resolved token values.
///
/// Used to check that evaluating the same token set twice yields the
/// same result, and as a cache key by hosts.
///
/// # Example
///
/// ```
/// use rafters_tokens::core::types::{Fingerprint, TokenName, TokenValue};
///
/// let values = vec![
///     (TokenName::new("a").unwrap(), TokenValue::Number(1.0)),
///     (TokenName::new("b").unwrap(), TokenValue::Number(2.0)),
/// ];
///
/// let fp = Fingerprint::compute(&values);
///
/// // Input order does not matter
/// let reversed: Vec<_> = values.iter().rev().cloned().collect();
/// assert_eq!(fp, Fingerprint::compute(&reversed));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute a fingerprint from a set of (name, value) pairs.
    ///
    /// The pairs are sorted by name before hashing so the result does not
    /// depend on input order.
    pub fn compute(values: &[(TokenName, TokenValue)]) -> Self {
        let mut sorted: Vec<_> = values.iter().collect();
        sorted.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));

        let mut hasher = Sha256::new();
        for (name, value) in sorted {
            hasher.update(name.as_str().as_bytes());
            hasher.update(b"\0");
            hasher.update(value.canonical().as_bytes());
            hasher.update(b"\n");
        }

        Self(hex::encode(hasher.finalize()))
    }

    /// Get the fingerprint as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod token_name {
        use super::*;

        #[test]
        fn valid_token_names() {
            assert!(TokenName::new("primary").is_ok());
            assert!(TokenName::new("primary-500").is_ok());
            assert!(TokenName::new("_private").is_ok());
            assert!(TokenName::new("spacing_base").is_ok());
            assert!(TokenName::new("CamelCase").is_ok());
        }

        #[test]
        fn empty_name_rejected() {
            assert!(TokenName::new("").is_err());
        }

        #[test]
        fn leading_digit_or_dash_rejected() {
            assert!(TokenName::new("500").is_err());
            assert!(TokenName::new("-primary").is_err());
        }

        #[test]
        fn dot_rejected() {
            assert!(TokenName::new("primary.l").is_err());
        }

        #[test]
        fn whitespace_and_symbols_rejected() {
            assert!(TokenName::new("has space").is_err());
            assert!(TokenName::new("a+b").is_err());
            assert!(TokenName::new("a{b}").is_err());
        }

        #[test]
        fn overlong_name_rejected() {
            let long = "a".repeat(MAX_TOKEN_NAME_LEN + 1);
            assert!(TokenName::new(long).is_err());
            let max = "a".repeat(MAX_TOKEN_NAME_LEN);
            assert!(TokenName::new(max).is_ok());
        }

        #[test]
        fn serde_rejects_invalid() {
            let result: Result<TokenName, _> = serde_json::from_str("\"not valid\"");
            assert!(result.is_err());
        }
    }

    mod namespace {
        use super::*;

        #[test]
        fn separators_allowed_inside() {
            assert!(Namespace::new("brand/web").is_ok());
            assert!(Namespace::new("theme.dark").is_ok());
        }

        #[test]
        fn separators_rejected_at_edges() {
            assert!(Namespace::new("/brand").is_err());
            assert!(Namespace::new("brand.").is_err());
        }

        #[test]
        fn default_namespace() {
            assert_eq!(Namespace::default().as_str(), "default");
        }
    }

    mod category {
        use super::*;

        #[test]
        fn parses_kebab_case() {
            assert_eq!("z-index".parse::<Category>().unwrap(), Category::ZIndex);
            assert_eq!("font-size".parse::<Category>().unwrap(), Category::FontSize);
            assert!("fontsize".parse::<Category>().is_err());
        }

        #[test]
        fn serde_matches_as_str() {
            for category in Category::ALL {
                let json = serde_json::to_string(&category).unwrap();
                assert_eq!(json, format!("\"{}\"", category.as_str()));
            }
        }
    }

    mod channel {
        use super::*;

        #[test]
        fn accepts_short_and_long_spellings() {
            assert_eq!("l".parse::<Channel>().unwrap(), Channel::Lightness);
            assert_eq!("Lightness".parse::<Channel>().unwrap(), Channel::Lightness);
            assert_eq!("a".parse::<Channel>().unwrap(), Channel::Alpha);
            assert!("x".parse::<Channel>().is_err());
        }
    }

    mod token_value {
        use super::*;

        #[test]
        fn untagged_number_text_and_color() {
            let n: TokenValue = serde_json::from_str("1.5").unwrap();
            assert_eq!(n, TokenValue::Number(1.5));

            let t: TokenValue = serde_json::from_str("\"1rem\"").unwrap();
            assert_eq!(t, TokenValue::Text("1rem".into()));

            let c: TokenValue =
                serde_json::from_str(r#"{"l": 1.0, "c": 0.0, "h": 0.0, "alpha": 0.5}"#).unwrap();
            assert_eq!(c, TokenValue::Color(ColorValue::oklch(1.0, 0.0, 0.0).with_alpha(0.5)));
        }

        #[test]
        fn text_leading_number() {
            assert_eq!(TokenValue::from("16px").as_number(), Some(16.0));
            assert_eq!(TokenValue::from("-0.5em").as_number(), Some(-0.5));
            assert_eq!(TokenValue::from("Inter").as_number(), None);
        }

        #[test]
        fn color_has_no_number() {
            let c = TokenValue::Color(ColorValue::oklch(0.5, 0.1, 10.0));
            assert_eq!(c.as_number(), None);
            assert!(c.as_color().is_some());
        }

        #[test]
        fn display_forms() {
            assert_eq!(TokenValue::Number(20.0).to_string(), "20");
            assert_eq!(TokenValue::Number(0.25).to_string(), "0.25");
            assert_eq!(
                TokenValue::Color(ColorValue::oklch(0.6, 0.2, 220.0)).to_string(),
                "oklch(0.6 0.2 220 / 1)"
            );
        }
    }

    mod fingerprint {
        use super::*;

        fn name(s: &str) -> TokenName {
            TokenName::new(s).unwrap()
        }

        #[test]
        fn differs_on_value_change() {
            let a = Fingerprint::compute(&[(name("a"), TokenValue::Number(1.0))]);
            let b = Fingerprint::compute(&[(name("a"), TokenValue::Number(2.0))]);
            assert_ne!(a, b);
        }

        #[test]
        fn distinguishes_number_from_text() {
            let a = Fingerprint::compute(&[(name("a"), TokenValue::Number(1.0))]);
            let b = Fingerprint::compute(&[(name("a"), TokenValue::Text("1".into()))]);
            assert_ne!(a, b);
        }

        #[test]
        fn is_hex_sha256() {
            let fp = Fingerprint::compute(&[]);
            assert_eq!(fp.as_str().len(), 64);
        }
    }
}
