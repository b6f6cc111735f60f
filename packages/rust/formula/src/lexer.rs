//! Tokenizer for filter formulas.

use contentpipe_shared::{ContentPipeError, Result};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    /// `{field name}`
    Field(String),
    /// Bare identifier: a function name when followed by `(`, else a field.
    Ident(String),
    Str(String),
    Number(String),
    LParen,
    RParen,
    Comma,
    Eq,
    Ne,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token start.
    pub offset: usize,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let kind = match c {
            '(' => {
                chars.next();
                TokenKind::LParen
            }
            ')' => {
                chars.next();
                TokenKind::RParen
            }
            ',' => {
                chars.next();
                TokenKind::Comma
            }
            '=' => {
                chars.next();
                TokenKind::Eq
            }
            '!' => {
                chars.next();
                match chars.next() {
                    Some((_, '=')) => TokenKind::Ne,
                    _ => return Err(ContentPipeError::formula(offset, "expected '=' after '!'")),
                }
            }
            '{' => {
                chars.next();
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some((_, '}')) => break,
                        Some((_, ch)) => name.push(ch),
                        None => {
                            return Err(ContentPipeError::formula(offset, "unclosed field reference"));
                        }
                    }
                }
                if name.trim().is_empty() {
                    return Err(ContentPipeError::formula(offset, "empty field reference"));
                }
                TokenKind::Field(name)
            }
            '\'' | '"' => {
                let quote = c;
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some((_, '\\')) => match chars.next() {
                            Some((_, escaped)) => value.push(escaped),
                            None => {
                                return Err(ContentPipeError::formula(offset, "unterminated string"));
                            }
                        },
                        Some((_, ch)) if ch == quote => break,
                        Some((_, ch)) => value.push(ch),
                        None => {
                            return Err(ContentPipeError::formula(offset, "unterminated string"));
                        }
                    }
                }
                TokenKind::Str(value)
            }
            c if c.is_ascii_digit() => {
                let mut number = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_ascii_digit() || ch == '.' {
                        number.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if number.parse::<f64>().is_err() {
                    return Err(ContentPipeError::formula(offset, format!("invalid number '{number}'")));
                }
                TokenKind::Number(number)
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(&(_, ch)) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        ident.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                TokenKind::Ident(ident)
            }
            other => {
                return Err(ContentPipeError::formula(
                    offset,
                    format!("unexpected character '{other}'"),
                ));
            }
        };

        tokens.push(Token { kind, offset });
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        offset: input.len(),
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn tokenizes_comparison() {
        assert_eq!(
            kinds("{state} != 'INIT'"),
            vec![
                TokenKind::Field("state".into()),
                TokenKind::Ne,
                TokenKind::Str("INIT".into()),
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(kinds(r"'it\'s'")[0], TokenKind::Str("it's".into()));
        assert_eq!(kinds(r#""say \"hi\"""#)[0], TokenKind::Str("say \"hi\"".into()));
    }

    #[test]
    fn error_offsets() {
        let err = tokenize("{state} = 'open").unwrap_err();
        assert_eq!(err.to_string(), "formula error at offset 10: unterminated string");

        let err = tokenize("AND({a} = 1, {b").unwrap_err();
        assert!(err.to_string().contains("offset 13"));

        assert!(tokenize("{a} == 1 & 2").is_err());
    }
}
