//! Predicate expression parsing
//!
//! Wraps the pest-generated parser for the C-expression subset and exposes a
//! single entry point, [`parse`], producing the tagged [`Expr`] tree the rest
//! of the compiler walks. Identifiers are opaque strings; integer literals
//! keep their raw text (see [`parse_int`]).

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

#[derive(Parser)]
#[grammar = "expr/grammar.pest"]
struct PredicateParser;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("syntax error: {0}")]
    Pest(#[from] Box<pest::error::Error<Rule>>),

    #[error("invalid expression")]
    InvalidExpression,
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        ParseError::Pest(Box::new(err))
    }
}

/// Member access operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOp {
    /// `->` - dereference the pointer, then select the member
    Arrow,
    /// `.` - select the member within the same object
    Dot,
}

/// Binary operator
///
/// The grammar admits the full set so that unsupported operators fail in the
/// operator emitter with a precise error rather than at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    LogicalAnd,
    LogicalOr,
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::LogicalAnd => "&&",
            BinOp::LogicalOr => "||",
        };
        f.write_str(symbol)
    }
}

/// Expression tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// An identifier
    Name(String),
    /// An integer literal, kept as raw source text
    Number(String),
    /// `base -> member` or `base . member`
    Member {
        op: AccessOp,
        base: Box<Expr>,
        member: String,
    },
    /// `left op right`
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
}

/// Parse a predicate string into an [`Expr`].
///
/// Accepts `access`, and `access bin_op integer`; whitespace-insensitive.
pub fn parse(input: &str) -> Result<Expr, ParseError> {
    let mut pairs = PredicateParser::parse(Rule::predicate, input)?;
    let predicate = pairs.next().ok_or(ParseError::InvalidExpression)?;

    let mut inner = predicate.into_inner();
    let access = inner.next().ok_or(ParseError::InvalidExpression)?;
    let mut expr = build_access(access)?;

    if let Some(op_pair) = inner.next() {
        if op_pair.as_rule() == Rule::bin_op {
            let number = inner.next().ok_or(ParseError::InvalidExpression)?;
            expr = Expr::Binary {
                op: bin_op_from_str(op_pair.as_str()).ok_or(ParseError::InvalidExpression)?,
                left: Box::new(expr),
                right: Box::new(Expr::Number(number.as_str().to_string())),
            };
        }
    }

    Ok(expr)
}

fn build_access(pair: Pair<'_, Rule>) -> Result<Expr, ParseError> {
    let mut inner = pair.into_inner();
    let root = inner.next().ok_or(ParseError::InvalidExpression)?;
    let mut expr = Expr::Name(root.as_str().to_string());

    while let Some(op_pair) = inner.next() {
        let member = inner.next().ok_or(ParseError::InvalidExpression)?;
        let op = match op_pair.as_str() {
            "->" => AccessOp::Arrow,
            "." => AccessOp::Dot,
            _ => return Err(ParseError::InvalidExpression),
        };
        expr = Expr::Member {
            op,
            base: Box::new(expr),
            member: member.as_str().to_string(),
        };
    }

    Ok(expr)
}

fn bin_op_from_str(op: &str) -> Option<BinOp> {
    let op = match op {
        "==" => BinOp::Eq,
        "!=" => BinOp::Ne,
        "<" => BinOp::Lt,
        "<=" => BinOp::Le,
        ">" => BinOp::Gt,
        ">=" => BinOp::Ge,
        "+" => BinOp::Add,
        "-" => BinOp::Sub,
        "*" => BinOp::Mul,
        "/" => BinOp::Div,
        "%" => BinOp::Rem,
        "&" => BinOp::BitAnd,
        "|" => BinOp::BitOr,
        "^" => BinOp::BitXor,
        "<<" => BinOp::Shl,
        ">>" => BinOp::Shr,
        "&&" => BinOp::LogicalAnd,
        "||" => BinOp::LogicalOr,
        _ => return None,
    };
    Some(op)
}

/// Decode an integer literal with C-like base rules: decimal, `0x` hex,
/// `0o`/leading-`0` octal, `0b` binary, `'c'` char literals, `_` separators.
///
/// Returns `None` when the text is not a valid literal (e.g. `1024x`).
pub fn parse_int(text: &str) -> Option<u64> {
    if let Some(inner) = text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
        return char_value(inner);
    }

    let text: String = text.chars().filter(|&c| c != '_').collect();
    if text.is_empty() {
        return None;
    }

    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok();
    }
    if let Some(bin) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        return u64::from_str_radix(bin, 2).ok();
    }
    if let Some(oct) = text.strip_prefix("0o").or_else(|| text.strip_prefix("0O")) {
        return u64::from_str_radix(oct, 8).ok();
    }
    if text.len() > 1 && text.starts_with('0') {
        return u64::from_str_radix(&text[1..], 8).ok();
    }
    text.parse().ok()
}

fn char_value(inner: &str) -> Option<u64> {
    let mut chars = inner.chars();
    let value = match (chars.next()?, chars.next()) {
        ('\\', Some(escaped)) => match escaped {
            'n' => b'\n',
            't' => b'\t',
            'r' => b'\r',
            '0' => b'\0',
            '\\' => b'\\',
            '\'' => b'\'',
            _ => return None,
        },
        (c, None) if c.is_ascii() => c as u8,
        _ => return None,
    };
    if chars.next().is_some() {
        return None;
    }
    Some(u64::from(value))
}

#[cfg(test)]
mod tests;
