/*
 * script/lexer.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Tokenizer for compiled shells.
//!
//! All ops of a shell become one token stream: literal text and echo starts
//! are single tokens, and every logic fragment is terminated by
//! [`Token::FragmentEnd`]. Keeping one stream lets a `{` opened in one
//! fragment close in a later one.

use crate::shell::{CompiledShell, ShellOp};

const PUNCTUATION: &[&str] = &[
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "+=", "-=", "++", "--", "+", "-", "*", "/",
    "%", "<", ">", "!", "(", ")", "[", "]", "{", "}", ",", ".", ";", "?", ":", "=",
];

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Punct(&'static str),
    /// Literal template text.
    Text(String),
    /// Start of an echo; its expression follows.
    EchoStart { escape: bool },
    FragmentEnd,
}

impl Token {
    /// Short description for error messages.
    pub fn describe(&self) -> String {
        match self {
            Token::Ident(name) => format!("`{}`", name),
            Token::Number(n) => format!("number {}", n),
            Token::Str(_) => "string".to_string(),
            Token::Punct(p) => format!("`{}`", p),
            Token::Text(_) => "template text".to_string(),
            Token::EchoStart { .. } => "echo".to_string(),
            Token::FragmentEnd => "end of tag".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub message: String,
    pub line: usize,
}

/// Tokenize every op of a shell into one stream.
pub fn tokenize_shell(shell: &CompiledShell) -> Result<Vec<Spanned>, LexError> {
    let mut out = Vec::new();
    for op in &shell.ops {
        match op {
            ShellOp::Literal { text, line } => out.push(Spanned {
                token: Token::Text(text.clone()),
                line: *line,
            }),
            ShellOp::Echo {
                expr, escape, line, ..
            } => {
                out.push(Spanned {
                    token: Token::EchoStart { escape: *escape },
                    line: *line,
                });
                let end = tokenize(expr, *line, &mut out)?;
                out.push(Spanned {
                    token: Token::FragmentEnd,
                    line: end,
                });
            }
            ShellOp::Statement { code, line } => {
                let end = tokenize(code, *line, &mut out)?;
                out.push(Spanned {
                    token: Token::FragmentEnd,
                    line: end,
                });
            }
        }
    }
    Ok(out)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Tokenize one code fragment starting at `line`; returns the line it ends on.
pub fn tokenize(code: &str, line: usize, out: &mut Vec<Spanned>) -> Result<usize, LexError> {
    let mut line = line;
    let mut pos = 0;
    let err = |message: String, line: usize| LexError { message, line };

    'outer: while let Some(c) = code[pos..].chars().next() {
        let rest = &code[pos..];
        if c == '\n' {
            line += 1;
            pos += 1;
            continue;
        }
        if c.is_whitespace() {
            pos += c.len_utf8();
            continue;
        }
        if rest.starts_with("//") {
            pos += rest.find('\n').unwrap_or(rest.len());
            continue;
        }
        if rest.starts_with("/*") {
            let Some(end) = rest[2..].find("*/") else {
                return Err(err("unterminated comment".to_string(), line));
            };
            let comment = &rest[..end + 4];
            line += comment.matches('\n').count();
            pos += comment.len();
            continue;
        }

        let next_is_digit = rest[c.len_utf8()..].starts_with(|d: char| d.is_ascii_digit());
        if c.is_ascii_digit() || (c == '.' && next_is_digit) {
            let len = number_length(rest);
            let text = &rest[..len];
            let value: f64 = text
                .parse()
                .map_err(|_| err(format!("invalid number `{}`", text), line))?;
            out.push(Spanned {
                token: Token::Number(value),
                line,
            });
            pos += len;
            continue;
        }

        if is_ident_start(c) {
            let len = rest
                .find(|ch: char| !is_ident_continue(ch))
                .unwrap_or(rest.len());
            out.push(Spanned {
                token: Token::Ident(rest[..len].to_string()),
                line,
            });
            pos += len;
            continue;
        }

        if c == '"' || c == '\'' {
            let (value, len) = lex_string(rest, c).map_err(|message| err(message, line))?;
            out.push(Spanned {
                token: Token::Str(value),
                line,
            });
            pos += len;
            continue;
        }

        for punct in PUNCTUATION {
            if rest.starts_with(punct) {
                out.push(Spanned {
                    token: Token::Punct(*punct),
                    line,
                });
                pos += punct.len();
                continue 'outer;
            }
        }

        return Err(err(format!("unexpected character `{}`", c), line));
    }
    Ok(line)
}

fn number_length(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut len = 0;
    while len < bytes.len() && (bytes[len].is_ascii_digit() || bytes[len] == b'.') {
        len += 1;
    }
    if len < bytes.len() && (bytes[len] == b'e' || bytes[len] == b'E') {
        let mut exp = len + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        if exp < bytes.len() && bytes[exp].is_ascii_digit() {
            while exp < bytes.len() && bytes[exp].is_ascii_digit() {
                exp += 1;
            }
            len = exp;
        }
    }
    len
}

/// Lex a quoted string; returns the value and the byte length consumed.
fn lex_string(text: &str, quote: char) -> Result<(String, usize), String> {
    let mut value = String::new();
    let mut chars = text.char_indices().skip(1);
    while let Some((index, c)) = chars.next() {
        match c {
            c if c == quote => return Ok((value, index + c.len_utf8())),
            '\n' => break,
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, 'r')) => value.push('\r'),
                Some((_, '0')) => value.push('\0'),
                Some((_, other)) => value.push(other),
                None => break,
            },
            other => value.push(other),
        }
    }
    Err("unterminated string literal".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(code: &str) -> Vec<Token> {
        let mut out = Vec::new();
        tokenize(code, 1, &mut out).unwrap();
        out.into_iter().map(|s| s.token).collect()
    }

    #[test]
    fn test_tokenize_expression() {
        assert_eq!(
            tokens("a.b[0] !== 'x\\'y' && n >= 1.5e2"),
            vec![
                Token::Ident("a".into()),
                Token::Punct("."),
                Token::Ident("b".into()),
                Token::Punct("["),
                Token::Number(0.0),
                Token::Punct("]"),
                Token::Punct("!=="),
                Token::Str("x'y".into()),
                Token::Punct("&&"),
                Token::Ident("n".into()),
                Token::Punct(">="),
                Token::Number(150.0),
            ]
        );
    }

    #[test]
    fn test_comments_and_lines() {
        let mut out = Vec::new();
        let end = tokenize("a /* x\n y */ b // c\n d", 3, &mut out).unwrap();
        let lines: Vec<usize> = out.iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
        assert_eq!(end, 5);
    }

    #[test]
    fn test_unterminated_string() {
        let mut out = Vec::new();
        let err = tokenize("'abc", 2, &mut out).unwrap_err();
        assert_eq!(
            err,
            LexError {
                message: "unterminated string literal".into(),
                line: 2
            }
        );
    }

    #[test]
    fn test_unexpected_character() {
        let mut out = Vec::new();
        assert!(tokenize("a @ b", 1, &mut out).is_err());
    }

    #[test]
    fn test_shell_stream() {
        use crate::shell::EchoMode;
        let shell = CompiledShell {
            ops: vec![
                ShellOp::Statement {
                    code: "if (a) {".into(),
                    line: 1,
                },
                ShellOp::Literal {
                    text: "x".into(),
                    line: 1,
                },
                ShellOp::Echo {
                    expr: "a".into(),
                    mode: EchoMode::Raw,
                    escape: false,
                    line: 2,
                },
            ],
            ..CompiledShell::default()
        };
        let stream: Vec<Token> = tokenize_shell(&shell)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect();
        assert_eq!(
            stream,
            vec![
                Token::Ident("if".into()),
                Token::Punct("("),
                Token::Ident("a".into()),
                Token::Punct(")"),
                Token::Punct("{"),
                Token::FragmentEnd,
                Token::Text("x".into()),
                Token::EchoStart { escape: false },
                Token::Ident("a".into()),
                Token::FragmentEnd,
            ]
        );
    }
}
