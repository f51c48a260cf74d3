/*
 * script/parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Recursive-descent parser from a shell token stream to the procedure AST.

use serde_json::Value;

use super::ast::{Arg, AssignOp, BinaryOp, Branch, Expr, Function, Stmt, StmtKind, UnaryOp};
use super::lexer::{Spanned, Token, tokenize_shell};
use crate::shell::CompiledShell;
use crate::value::number_value;

/// A structural error in the procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
}

/// Tokenize and parse a compiled shell.
pub fn parse_shell(shell: &CompiledShell) -> Result<Vec<Stmt>, ParseError> {
    let tokens = tokenize_shell(shell).map_err(|e| ParseError {
        message: e.message,
        line: e.line,
    })?;
    Parser::new(tokens).parse_program()
}

const RESERVED: &[&str] = &[
    "if", "else", "for", "var", "let", "const", "break", "continue", "function", "of", "in",
    "true", "false", "null", "undefined", "return", "while", "do", "new", "this", "typeof",
];

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    loop_depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            pos: 0,
            loop_depth: 0,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|s| &s.token)
    }

    /// Line of the current token, or of the last token at end of input.
    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |s| s.line)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, ParseError> {
        Err(ParseError {
            message: message.into(),
            line: self.line(),
        })
    }

    fn unexpected<T>(&self, context: &str) -> Result<T, ParseError> {
        match self.peek() {
            Some(token) => self.error(format!("unexpected {} {}", token.describe(), context)),
            None => self.error(format!("unexpected end of template {}", context)),
        }
    }

    fn is_punct(&self, punct: &str) -> bool {
        matches!(self.peek(), Some(Token::Punct(p)) if *p == punct)
    }

    fn is_word(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(name)) if name == word)
    }

    fn eat_punct(&mut self, punct: &str) -> bool {
        if self.is_punct(punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: &str) -> Result<(), ParseError> {
        if self.eat_punct(punct) {
            Ok(())
        } else {
            self.unexpected(&format!("(expected `{}`)", punct))
        }
    }

    fn expect_name(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(Token::Ident(name)) if !RESERVED.contains(&name.as_str()) => {
                let name = name.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => self.unexpected("(expected a name)"),
        }
    }

    fn parse_program(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.parse_statements(None)
    }

    /// Statements until end of input, or until the `}` closing a block
    /// opened on `open_line`.
    fn parse_statements(&mut self, open_line: Option<usize>) -> Result<Vec<Stmt>, ParseError> {
        let mut stmts = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return match open_line {
                        Some(line) => self.error(format!(
                            "missing `}}` for the block opened on line {}",
                            line
                        )),
                        None => Ok(stmts),
                    };
                }
                Some(Token::FragmentEnd) | Some(Token::Punct(";")) => {
                    self.pos += 1;
                }
                Some(Token::Punct("}")) => {
                    if open_line.is_some() {
                        self.pos += 1;
                        return Ok(stmts);
                    }
                    return self.error("unexpected `}` without an open block");
                }
                Some(_) => stmts.push(self.parse_statement()?),
            }
        }
    }

    fn parse_block(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let open_line = self.line();
        self.expect_punct("{")?;
        self.parse_statements(Some(open_line))
    }

    fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let line = self.line();
        let kind = match self.peek() {
            Some(Token::Text(text)) => {
                let text = text.clone();
                self.pos += 1;
                StmtKind::Append(text)
            }
            Some(Token::EchoStart { escape }) => {
                let escape = *escape;
                self.pos += 1;
                let expr = self.parse_expr()?;
                if !matches!(self.peek(), Some(Token::FragmentEnd)) {
                    return self.unexpected("after echoed expression");
                }
                StmtKind::Echo { expr, escape }
            }
            Some(Token::Ident(word)) => match word.as_str() {
                "if" => self.parse_if()?,
                "for" => self.parse_for()?,
                "var" | "let" | "const" => {
                    self.pos += 1;
                    let name = self.expect_name()?;
                    let value = if self.eat_punct("=") {
                        Some(self.parse_expr()?)
                    } else {
                        None
                    };
                    StmtKind::Declare { name, value }
                }
                "break" | "continue" => {
                    let is_break = word == "break";
                    if self.loop_depth == 0 {
                        return self.error(format!("`{}` outside of a loop", word));
                    }
                    self.pos += 1;
                    if is_break {
                        StmtKind::Break
                    } else {
                        StmtKind::Continue
                    }
                }
                "else" => return self.error("`else` without a matching `if`"),
                _ => self.parse_simple_statement()?,
            },
            _ => self.parse_simple_statement()?,
        };
        Ok(Stmt { kind, line })
    }

    /// Assignment, update or expression statement.
    fn parse_simple_statement(&mut self) -> Result<StmtKind, ParseError> {
        if let (Some(Token::Ident(_)), Some(Token::Punct(op))) = (self.peek(), self.peek_at(1)) {
            let op = *op;
            if matches!(op, "=" | "+=" | "-=" | "++" | "--") {
                let name = self.expect_name()?;
                self.pos += 1;
                let one = || Expr::Literal(number_value(1.0));
                return Ok(match op {
                    "=" => StmtKind::Assign {
                        name,
                        op: AssignOp::Set,
                        value: self.parse_expr()?,
                    },
                    "+=" => StmtKind::Assign {
                        name,
                        op: AssignOp::Add,
                        value: self.parse_expr()?,
                    },
                    "-=" => StmtKind::Assign {
                        name,
                        op: AssignOp::Sub,
                        value: self.parse_expr()?,
                    },
                    "++" => StmtKind::Assign {
                        name,
                        op: AssignOp::Add,
                        value: one(),
                    },
                    _ => StmtKind::Assign {
                        name,
                        op: AssignOp::Sub,
                        value: one(),
                    },
                });
            }
        }
        Ok(StmtKind::Expr(self.parse_expr()?))
    }

    fn parse_condition(&mut self) -> Result<Expr, ParseError> {
        self.expect_punct("(")?;
        let cond = self.parse_expr()?;
        self.expect_punct(")")?;
        Ok(cond)
    }

    fn parse_if(&mut self) -> Result<StmtKind, ParseError> {
        let line = self.line();
        self.pos += 1;
        let cond = self.parse_condition()?;
        let body = self.parse_block()?;
        let mut branches = vec![Branch { cond, body, line }];
        let mut otherwise = None;

        loop {
            // `} else {` may be split over tags: `<% } %><% else { %>`.
            let mut look = self.pos;
            while matches!(self.tokens.get(look).map(|s| &s.token), Some(Token::FragmentEnd)) {
                look += 1;
            }
            if !matches!(self.tokens.get(look).map(|s| &s.token), Some(Token::Ident(w)) if w == "else") {
                break;
            }
            self.pos = look + 1;
            if self.is_word("if") {
                let line = self.line();
                self.pos += 1;
                let cond = self.parse_condition()?;
                let body = self.parse_block()?;
                branches.push(Branch { cond, body, line });
            } else {
                otherwise = Some(self.parse_block()?);
                break;
            }
        }
        Ok(StmtKind::If {
            branches,
            otherwise,
        })
    }

    fn parse_for(&mut self) -> Result<StmtKind, ParseError> {
        self.pos += 1;
        self.expect_punct("(")?;
        if self.is_word("var") || self.is_word("let") || self.is_word("const") {
            self.pos += 1;
        }
        let first = self.expect_name()?;
        let second = if self.eat_punct(",") {
            Some(self.expect_name()?)
        } else {
            None
        };

        let of = if self.is_word("of") {
            true
        } else if self.is_word("in") && second.is_none() {
            false
        } else {
            return self.unexpected("in loop header (expected `of` or `in`)");
        };
        self.pos += 1;
        let iterable = self.parse_expr()?;
        self.expect_punct(")")?;

        self.loop_depth += 1;
        let body = self.parse_block();
        self.loop_depth -= 1;
        let body = body?;

        Ok(if of {
            StmtKind::ForOf {
                item: first,
                index: second,
                iterable,
                body,
            }
        } else {
            StmtKind::ForIn {
                key: first,
                iterable,
                body,
            }
        })
    }

    fn parse_function(&mut self) -> Result<Function, ParseError> {
        self.pos += 1;
        self.expect_punct("(")?;
        let mut params = Vec::new();
        if !self.is_punct(")") {
            loop {
                params.push(self.expect_name()?);
                if !self.eat_punct(",") {
                    break;
                }
            }
        }
        self.expect_punct(")")?;

        let saved = std::mem::replace(&mut self.loop_depth, 0);
        let body = self.parse_block();
        self.loop_depth = saved;
        Ok(Function { params, body: body? })
    }

    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        let cond = self.parse_or()?;
        if self.eat_punct("?") {
            let then = self.parse_expr()?;
            self.expect_punct(":")?;
            let otherwise = self.parse_expr()?;
            return Ok(Expr::Conditional(
                Box::new(cond),
                Box::new(then),
                Box::new(otherwise),
            ));
        }
        Ok(cond)
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while self.eat_punct("||") {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_binary(0)?;
        while self.eat_punct("&&") {
            let right = self.parse_binary(0)?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// Left-associative binary operators, loosest level first.
    fn parse_binary(&mut self, level: usize) -> Result<Expr, ParseError> {
        const LEVELS: &[&[(&str, BinaryOp)]] = &[
            &[
                ("===", BinaryOp::StrictEq),
                ("!==", BinaryOp::StrictNe),
                ("==", BinaryOp::Eq),
                ("!=", BinaryOp::Ne),
            ],
            &[
                ("<=", BinaryOp::Le),
                (">=", BinaryOp::Ge),
                ("<", BinaryOp::Lt),
                (">", BinaryOp::Gt),
            ],
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            &[
                ("*", BinaryOp::Mul),
                ("/", BinaryOp::Div),
                ("%", BinaryOp::Rem),
            ],
        ];

        let Some(ops) = LEVELS.get(level) else {
            return self.parse_unary();
        };
        let mut left = self.parse_binary(level + 1)?;
        'operators: loop {
            for (punct, op) in ops.iter() {
                if self.eat_punct(punct) {
                    let right = self.parse_binary(level + 1)?;
                    left = Expr::Binary(*op, Box::new(left), Box::new(right));
                    continue 'operators;
                }
            }
            return Ok(left);
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat_punct("!") {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.parse_unary()?)));
        }
        if self.eat_punct("-") {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.parse_unary()?)));
        }
        if self.eat_punct("+") {
            return self.parse_unary();
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.eat_punct(".") {
                match self.advance() {
                    Some(Token::Ident(name)) => expr = Expr::Member(Box::new(expr), name),
                    _ => return self.error("expected a property name after `.`"),
                }
            } else if self.eat_punct("[") {
                let index = self.parse_expr()?;
                self.expect_punct("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else if self.is_punct("(") {
                let Expr::Ident(callee) = expr else {
                    return self.error("only named helpers can be called");
                };
                self.pos += 1;
                let args = self.parse_args()?;
                expr = Expr::Call { callee, args };
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Arg>, ParseError> {
        let mut args = Vec::new();
        if self.eat_punct(")") {
            return Ok(args);
        }
        loop {
            if self.is_word("function") {
                args.push(Arg::Body(self.parse_function()?));
            } else {
                args.push(Arg::Value(self.parse_expr()?));
            }
            if self.eat_punct(")") {
                return Ok(args);
            }
            self.expect_punct(",")?;
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.peek().cloned() {
            Some(Token::Number(n)) => {
                self.pos += 1;
                Ok(Expr::Literal(number_value(n)))
            }
            Some(Token::Str(s)) => {
                self.pos += 1;
                Ok(Expr::Literal(Value::String(s)))
            }
            Some(Token::Ident(word)) => {
                let literal = match word.as_str() {
                    "true" => Some(Value::Bool(true)),
                    "false" => Some(Value::Bool(false)),
                    "null" | "undefined" => Some(Value::Null),
                    _ => None,
                };
                if let Some(value) = literal {
                    self.pos += 1;
                    return Ok(Expr::Literal(value));
                }
                if word == "function" {
                    return self.error("function literals may only be passed to block helpers");
                }
                if RESERVED.contains(&word.as_str()) {
                    return self.unexpected("in expression");
                }
                self.pos += 1;
                Ok(Expr::Ident(word))
            }
            Some(Token::Punct("(")) => {
                self.pos += 1;
                let expr = self.parse_expr()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            Some(Token::Punct("[")) => {
                self.pos += 1;
                let mut items = Vec::new();
                while !self.eat_punct("]") {
                    items.push(self.parse_expr()?);
                    if !self.eat_punct(",") {
                        self.expect_punct("]")?;
                        break;
                    }
                }
                Ok(Expr::Array(items))
            }
            Some(Token::Punct("{")) => {
                self.pos += 1;
                let mut entries = Vec::new();
                while !self.eat_punct("}") {
                    let key = match self.advance() {
                        Some(Token::Ident(name)) | Some(Token::Str(name)) => name,
                        Some(Token::Number(n)) => crate::value::format_number(n),
                        _ => return self.error("expected a property name in object literal"),
                    };
                    self.expect_punct(":")?;
                    entries.push((key, self.parse_expr()?));
                    if !self.eat_punct(",") {
                        self.expect_punct("}")?;
                        break;
                    }
                }
                Ok(Expr::Object(entries))
            }
            _ => self.unexpected("in expression"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::test_support::shell_of;
    use pretty_assertions::assert_eq;

    fn parse(ops: &[(&str, &str)]) -> Result<Vec<Stmt>, ParseError> {
        parse_shell(&shell_of(ops))
    }

    #[test]
    fn test_echo_expression_precedence() {
        let stmts = parse(&[("=", "a + b * 2 > 3 && !c")]).unwrap();
        let StmtKind::Echo { expr, escape } = &stmts[0].kind else {
            panic!("expected echo");
        };
        assert!(*escape);
        assert_eq!(
            *expr,
            Expr::And(
                Box::new(Expr::Binary(
                    BinaryOp::Gt,
                    Box::new(Expr::Binary(
                        BinaryOp::Add,
                        Box::new(Expr::Ident("a".into())),
                        Box::new(Expr::Binary(
                            BinaryOp::Mul,
                            Box::new(Expr::Ident("b".into())),
                            Box::new(Expr::Literal(serde_json::json!(2)))
                        ))
                    )),
                    Box::new(Expr::Literal(serde_json::json!(3)))
                )),
                Box::new(Expr::Unary(UnaryOp::Not, Box::new(Expr::Ident("c".into()))))
            )
        );
    }

    #[test]
    fn test_blocks_span_fragments() {
        let stmts = parse(&[
            ("", "if (a) {"),
            ("text", "yes"),
            ("", "} else if (b) {"),
            ("text", "maybe"),
            ("", "}"),
            ("", "else {"),
            ("text", "no"),
            ("", "}"),
        ])
        .unwrap();
        assert_eq!(stmts.len(), 1);
        let StmtKind::If {
            branches,
            otherwise,
        } = &stmts[0].kind
        else {
            panic!("expected if");
        };
        assert_eq!(branches.len(), 2);
        assert_eq!(branches.iter().map(|b| b.line).collect::<Vec<_>>(), vec![1, 1]);
        assert_eq!(
            otherwise.as_ref().map(|b| b[0].kind.clone()),
            Some(StmtKind::Append("no".into()))
        );
    }

    #[test]
    fn test_for_of_with_index() {
        let stmts = parse(&[("", "for (item, i of list) {"), ("", "}")]).unwrap();
        assert!(matches!(
            &stmts[0].kind,
            StmtKind::ForOf { item, index: Some(index), .. } if item == "item" && index == "i"
        ));
    }

    #[test]
    fn test_block_helper_call_with_body() {
        let stmts = parse(&[
            ("", "bold(a, function(it) {"),
            ("=", "it"),
            ("", "})"),
        ])
        .unwrap();
        let StmtKind::Expr(Expr::Call { callee, args }) = &stmts[0].kind else {
            panic!("expected call");
        };
        assert_eq!(callee, "bold");
        assert_eq!(args.len(), 2);
        let Arg::Body(function) = &args[1] else {
            panic!("expected body");
        };
        assert_eq!(function.params, vec!["it".to_string()]);
        assert_eq!(function.body.len(), 1);
    }

    #[test]
    fn test_assignment_forms() {
        let stmts = parse(&[("", "var n = 1; n += 2; n++; n = n - 1")]).unwrap();
        let kinds: Vec<&StmtKind> = stmts.iter().map(|s| &s.kind).collect();
        assert!(matches!(kinds[0], StmtKind::Declare { .. }));
        assert!(matches!(kinds[1], StmtKind::Assign { op: AssignOp::Add, .. }));
        assert!(matches!(kinds[2], StmtKind::Assign { op: AssignOp::Add, .. }));
        assert!(matches!(kinds[3], StmtKind::Assign { op: AssignOp::Set, .. }));
    }

    #[test]
    fn test_unbalanced_braces() {
        let err = parse(&[("", "if (a) {"), ("text", "x")]).unwrap_err();
        assert_eq!(err.message, "missing `}` for the block opened on line 1");

        let err = parse(&[("", "}")]).unwrap_err();
        assert_eq!(err.message, "unexpected `}` without an open block");
    }

    #[test]
    fn test_function_literal_outside_block_call() {
        let err = parse(&[("", "var f = function(x) { }")]).unwrap_err();
        assert_eq!(
            err.message,
            "function literals may only be passed to block helpers"
        );
    }

    #[test]
    fn test_break_outside_loop() {
        assert!(parse(&[("", "break")]).is_err());
        assert!(parse(&[("", "for (x of xs) { break }")]).is_ok());
    }

    #[test]
    fn test_object_and_array_literals() {
        let stmts = parse(&[("#", "json({a: [1, 'two'], \"b\": null})")]).unwrap();
        let StmtKind::Echo { expr, escape } = &stmts[0].kind else {
            panic!("expected echo");
        };
        assert!(!*escape);
        let Expr::Call { args, .. } = expr else {
            panic!("expected call");
        };
        assert!(matches!(&args[0], Arg::Value(Expr::Object(entries)) if entries.len() == 2));
    }
}
