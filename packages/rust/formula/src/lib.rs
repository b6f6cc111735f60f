//! Strict parser and evaluator for record filter formulas.
//!
//! The syntax is the subset of Airtable formulas the jobs rely on:
//!
//! ```text
//! AND({state} = 'READY_TO_PUBLISH', NOT({title} = ''), {post_id} = BLANK())
//! ```
//!
//! A [`Formula`] can be sent to Airtable as `filterByFormula` (via
//! [`Display`](std::fmt::Display), which renders a canonical form) or
//! evaluated in-process against a [`Record`] by the local and in-memory stores.

mod eval;
mod lexer;
mod parser;

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use contentpipe_shared::{ContentPipeError, Record, Result};

pub use parser::{CompareOp, Expr, Function};

/// A parsed, validated filter formula.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    expr: Expr,
}

impl Formula {
    /// Parse a formula string. Any syntax problem is a `Formula` error
    /// carrying the byte offset where it was detected.
    pub fn parse(input: &str) -> Result<Self> {
        Ok(Self {
            expr: parser::parse(input)?,
        })
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Whether `record` satisfies the formula, with `TODAY()` as the current UTC date.
    pub fn matches(&self, record: &Record) -> bool {
        self.matches_on(record, Utc::now().date_naive())
    }

    /// Whether `record` satisfies the formula with `TODAY()` fixed to `today`.
    pub fn matches_on(&self, record: &Record, today: NaiveDate) -> bool {
        eval::matches(&self.expr, &eval::Context { record, today })
    }

    // -----------------------------------------------------------------------
    // Builders
    // -----------------------------------------------------------------------

    /// `{field} = 'value'`
    pub fn eq(field: &str, value: &str) -> Self {
        Self {
            expr: Expr::Compare(
                CompareOp::Eq,
                Box::new(Expr::Field(field.to_string())),
                Box::new(Expr::Str(value.to_string())),
            ),
        }
    }

    /// `{field} = ''`
    pub fn is_blank(field: &str) -> Self {
        Self::eq(field, "")
    }

    /// `NOT({field} = '')`
    pub fn not_blank(field: &str) -> Self {
        Self {
            expr: Expr::Call(Function::Not, vec![Self::is_blank(field).expr]),
        }
    }

    /// `AND(a, b, …)`. A single operand is returned as-is.
    pub fn and(parts: Vec<Formula>) -> Result<Self> {
        let mut exprs: Vec<Expr> = parts.into_iter().map(|f| f.expr).collect();
        match exprs.len() {
            0 => Err(ContentPipeError::formula(0, "AND() needs at least one operand")),
            1 => Ok(Self {
                expr: exprs.remove(0),
            }),
            _ => Ok(Self {
                expr: Expr::Call(Function::And, exprs),
            }),
        }
    }
}

impl FromStr for Formula {
    type Err = ContentPipeError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_expr(f, &self.expr)
    }
}

fn write_expr(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    match expr {
        Expr::Field(name) => write!(f, "{{{name}}}"),
        Expr::Str(s) => {
            f.write_str("'")?;
            for c in s.chars() {
                if c == '\'' || c == '\\' {
                    f.write_str("\\")?;
                }
                write!(f, "{c}")?;
            }
            f.write_str("'")
        }
        Expr::Number(n) => f.write_str(n),
        Expr::Compare(op, lhs, rhs) => {
            write_expr(f, lhs)?;
            f.write_str(match op {
                CompareOp::Eq => " = ",
                CompareOp::Ne => " != ",
            })?;
            write_expr(f, rhs)
        }
        Expr::Call(function, args) => {
            write!(f, "{}(", function.name())?;
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_expr(f, arg)?;
            }
            f.write_str(")")
        }
    }
}
