//! Recursive-descent parser producing the formula AST.

use contentpipe_shared::{ContentPipeError, Result};

use crate::lexer::{Token, TokenKind, tokenize};

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
}

/// Supported formula functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    And,
    Or,
    Not,
    Blank,
    Find,
    Today,
    DateStr,
    IsSame,
}

impl Function {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "AND" => Some(Self::And),
            "OR" => Some(Self::Or),
            "NOT" => Some(Self::Not),
            "BLANK" => Some(Self::Blank),
            "FIND" => Some(Self::Find),
            "TODAY" => Some(Self::Today),
            "DATESTR" => Some(Self::DateStr),
            "IS_SAME" => Some(Self::IsSame),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::Blank => "BLANK",
            Self::Find => "FIND",
            Self::Today => "TODAY",
            Self::DateStr => "DATESTR",
            Self::IsSame => "IS_SAME",
        }
    }

    /// Accepted argument count range (inclusive).
    fn arity(&self) -> (usize, usize) {
        match self {
            Self::And | Self::Or => (1, usize::MAX),
            Self::Not | Self::DateStr => (1, 1),
            Self::Blank | Self::Today => (0, 0),
            Self::Find => (2, 2),
            Self::IsSame => (3, 3),
        }
    }
}

/// Formula expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Field(String),
    Str(String),
    Number(String),
    Call(Function, Vec<Expr>),
    Compare(CompareOp, Box<Expr>, Box<Expr>),
}

pub(crate) fn parse(input: &str) -> Result<Expr> {
    if input.trim().is_empty() {
        return Err(ContentPipeError::formula(0, "empty formula"));
    }
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.expr()?;
    let trailing = parser.peek();
    if trailing.kind != TokenKind::Eof {
        return Err(ContentPipeError::formula(
            trailing.offset,
            "unexpected trailing input",
        ));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token list always ends with Eof.
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expr(&mut self) -> Result<Expr> {
        let lhs = self.term()?;
        let op = match self.peek().kind {
            TokenKind::Eq => CompareOp::Eq,
            TokenKind::Ne => CompareOp::Ne,
            _ => return Ok(lhs),
        };
        self.advance();
        let rhs = self.term()?;
        Ok(Expr::Compare(op, Box::new(lhs), Box::new(rhs)))
    }

    fn term(&mut self) -> Result<Expr> {
        let token = self.advance();
        match token.kind {
            TokenKind::Field(name) => Ok(Expr::Field(name)),
            TokenKind::Str(s) => Ok(Expr::Str(s)),
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::Ident(name) => {
                if self.peek().kind == TokenKind::LParen {
                    self.call(&name, token.offset)
                } else {
                    Ok(Expr::Field(name))
                }
            }
            TokenKind::Eof => Err(ContentPipeError::formula(token.offset, "unexpected end of formula")),
            other => Err(ContentPipeError::formula(
                token.offset,
                format!("unexpected token {other:?}"),
            )),
        }
    }

    fn call(&mut self, name: &str, offset: usize) -> Result<Expr> {
        let function = Function::from_name(name)
            .ok_or_else(|| ContentPipeError::formula(offset, format!("unknown function {name}")))?;

        // Consume '('.
        self.advance();

        let mut args = Vec::new();
        if self.peek().kind != TokenKind::RParen {
            loop {
                args.push(self.expr()?);
                let next = self.advance();
                match next.kind {
                    TokenKind::Comma => continue,
                    TokenKind::RParen => break,
                    _ => {
                        return Err(ContentPipeError::formula(
                            next.offset,
                            format!("expected ',' or ')' in {}()", function.name()),
                        ));
                    }
                }
            }
        } else {
            self.advance();
        }

        let (min, max) = function.arity();
        if args.len() < min || args.len() > max {
            return Err(ContentPipeError::formula(
                offset,
                format!("{}() takes {} argument(s), got {}", function.name(), arity_text(min, max), args.len()),
            ));
        }

        if function == Function::IsSame {
            if let Expr::Str(unit) = &args[2] {
                if !matches!(unit.as_str(), "day" | "month" | "year") {
                    return Err(ContentPipeError::formula(
                        offset,
                        format!("IS_SAME() unit must be 'day', 'month' or 'year', got '{unit}'"),
                    ));
                }
            }
        }

        Ok(Expr::Call(function, args))
    }
}

fn arity_text(min: usize, max: usize) -> String {
    if min == max {
        min.to_string()
    } else if max == usize::MAX {
        format!("at least {min}")
    } else {
        format!("{min}..{max}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_calls() {
        let expr = parse("AND(NOT({source_content_url} = ''), {html} = BLANK())").unwrap();
        match expr {
            Expr::Call(Function::And, args) => {
                assert_eq!(args.len(), 2);
                assert!(matches!(args[0], Expr::Call(Function::Not, _)));
                assert!(matches!(args[1], Expr::Compare(CompareOp::Eq, _, _)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn bare_identifier_is_a_field() {
        assert_eq!(
            parse("state = 'INIT'").unwrap(),
            Expr::Compare(
                CompareOp::Eq,
                Box::new(Expr::Field("state".into())),
                Box::new(Expr::Str("INIT".into()))
            )
        );
    }

    #[test]
    fn extra_parenthesis_is_rejected() {
        let err = parse("AND(NOT({introduction} != ''), {siteUrl} != ''))").unwrap_err();
        assert!(err.to_string().contains("unexpected trailing input"));
    }

    #[test]
    fn unbalanced_is_rejected() {
        assert!(parse("AND({a} = 'x'").is_err());
        assert!(parse("{a} =").is_err());
        assert!(parse("").is_err());
        assert!(parse("{a} = 'x' {b}").is_err());
    }

    #[test]
    fn unknown_function_and_arity() {
        assert!(parse("LEN({a})").unwrap_err().to_string().contains("unknown function LEN"));
        assert!(parse("NOT({a}, {b})").unwrap_err().to_string().contains("takes 1"));
        assert!(parse("AND()").unwrap_err().to_string().contains("at least 1"));
        assert!(parse("IS_SAME({d}, TODAY(), 'week')").is_err());
    }

    #[test]
    fn function_names_are_case_insensitive() {
        assert!(matches!(parse("and({a} = 'x')").unwrap(), Expr::Call(Function::And, _)));
    }
}
