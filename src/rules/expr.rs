//! rules::expr
//!
//! Expression tree for `calc(...)` rules.

use std::fmt;

use indexmap::IndexSet;

use crate::core::types::{Channel, TokenName};

/// A token reference inside an expression, optionally selecting a channel
/// of a structured value (`primary.l`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub token: TokenName,
    pub channel: Option<Channel>,
}

impl Reference {
    pub fn new(token: TokenName) -> Self {
        Self {
            token,
            channel: None,
        }
    }

    pub fn with_channel(token: TokenName, channel: Channel) -> Self {
        Self {
            token,
            channel: Some(channel),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.token.as_str();
        if name.contains('-') {
            write!(f, "{{{name}}}")?;
        } else {
            f.write_str(name)?;
        }
        if let Some(channel) = self.channel {
            write!(f, ".{channel}")?;
        }
        Ok(())
    }
}

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    /// Binding strength; higher binds tighter.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 1,
            BinaryOp::Mul | BinaryOp::Div => 2,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
        }
    }
}

/// An arithmetic expression over numeric literals and token references.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Ref(Reference),
    Neg(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
}

impl Expr {
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Collect referenced token names into `out`, in first-appearance order.
    pub fn collect_references(&self, out: &mut IndexSet<TokenName>) {
        match self {
            Expr::Number(_) => {}
            Expr::Ref(r) => {
                out.insert(r.token.clone());
            }
            Expr::Neg(inner) => inner.collect_references(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_references(out);
                rhs.collect_references(out);
            }
        }
    }

    /// Referenced token names, in first-appearance order.
    pub fn references(&self) -> IndexSet<TokenName> {
        let mut out = IndexSet::new();
        self.collect_references(&mut out);
        out
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Binary { op, .. } => op.precedence(),
            _ => u8::MAX,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parens: bool) -> fmt::Result {
        if parens {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

impl fmt::Display for Expr {
    /// Canonical text with only the parentheses precedence requires.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Ref(r) => write!(f, "{r}"),
            Expr::Neg(inner) => {
                f.write_str("-")?;
                inner.fmt_operand(f, matches!(**inner, Expr::Binary { .. }))
            }
            Expr::Binary { op, lhs, rhs } => {
                let p = op.precedence();
                lhs.fmt_operand(f, lhs.precedence() < p)?;
                write!(f, " {} ", op.symbol())?;
                rhs.fmt_operand(f, rhs.precedence() <= p)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(name: &str) -> Expr {
        Expr::Ref(Reference::new(TokenName::new(name).unwrap()))
    }

    #[test]
    fn display_minimal_parens() {
        // (a + b) * 2
        let e = Expr::binary(
            BinaryOp::Mul,
            Expr::binary(BinaryOp::Add, r("a"), r("b")),
            Expr::Number(2.0),
        );
        assert_eq!(e.to_string(), "(a + b) * 2");

        // a - (b - c) keeps the right-hand grouping
        let e = Expr::binary(
            BinaryOp::Sub,
            r("a"),
            Expr::binary(BinaryOp::Sub, r("b"), r("c")),
        );
        assert_eq!(e.to_string(), "a - (b - c)");

        // (a - b) - c needs none
        let e = Expr::binary(
            BinaryOp::Sub,
            Expr::binary(BinaryOp::Sub, r("a"), r("b")),
            r("c"),
        );
        assert_eq!(e.to_string(), "a - b - c");
    }

    #[test]
    fn display_hyphenated_reference_is_braced() {
        let reference = Reference::with_channel(
            TokenName::new("primary-500").unwrap(),
            Channel::Lightness,
        );
        assert_eq!(reference.to_string(), "{primary-500}.l");
    }

    #[test]
    fn references_are_deduplicated_in_order() {
        let e = Expr::binary(
            BinaryOp::Add,
            Expr::binary(BinaryOp::Mul, r("b"), r("a")),
            r("b"),
        );
        let refs: Vec<String> = e.references().into_iter().map(String::from).collect();
        assert_eq!(refs, vec!["b", "a"]);
    }
}
