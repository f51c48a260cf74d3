/*
 * shell/compiler.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Primitive text to [`CompiledShell`].

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use super::ir::{Binding, BindingKind, CompiledShell, EchoMode, ShellOp};
use super::{CLOSE_TAG, OPEN_TAG};
use crate::config::Options;
use crate::helpers::HelperRegistry;
use crate::syntax::SyntaxRegistry;

/// Names the procedure provides itself; they are never hoisted.
pub const BUILTINS: &[&str] = &["include", "append", "$data"];

const KEYWORDS: &[&str] = &[
    "break",
    "case",
    "catch",
    "class",
    "const",
    "continue",
    "debugger",
    "default",
    "delete",
    "do",
    "else",
    "export",
    "extends",
    "false",
    "finally",
    "for",
    "function",
    "if",
    "import",
    "in",
    "instanceof",
    "let",
    "new",
    "null",
    "of",
    "return",
    "super",
    "switch",
    "this",
    "throw",
    "true",
    "try",
    "typeof",
    "undefined",
    "var",
    "void",
    "while",
    "with",
    "yield",
];

static STRINGS_AND_COMMENTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|/\*[\s\S]*?\*/|//[^\n]*"#)
        .expect("valid regex")
});

static MEMBER_ACCESS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.\s*[A-Za-z_$][\w$]*").expect("valid regex"));

static NON_IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w$]+").expect("valid regex"));

static CALL_LIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_$][\w$]*)\s*\([^{};]*\)$").expect("valid regex"));

static HTML_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));

static SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").expect("valid regex"));

pub(crate) fn is_keyword(name: &str) -> bool {
    KEYWORDS.contains(&name)
}

/// Compiles primitive text against the helpers and blocks of an engine.
pub struct ShellCompiler<'a> {
    options: &'a Options,
    helpers: &'a HelperRegistry,
    syntax: &'a SyntaxRegistry,
}

impl<'a> ShellCompiler<'a> {
    pub fn new(options: &'a Options, helpers: &'a HelperRegistry, syntax: &'a SyntaxRegistry) -> Self {
        Self {
            options,
            helpers,
            syntax,
        }
    }

    pub fn compile(&self, text: &str) -> CompiledShell {
        let mut shell = CompiledShell {
            params: self.options.depends.clone(),
            escape: self.options.escape,
            source: text.to_string(),
            ..CompiledShell::default()
        };
        let mut line = 1;

        let mut chunks = text.split(OPEN_TAG);
        if let Some(first) = chunks.next() {
            self.push_literal(&mut shell, first, &mut line);
        }
        for chunk in chunks {
            match chunk.find(CLOSE_TAG) {
                Some(end) => {
                    let fragment = &chunk[..end];
                    self.push_fragment(&mut shell, fragment, line);
                    line += count_newlines(fragment);
                    self.push_literal(&mut shell, &chunk[end + CLOSE_TAG.len()..], &mut line);
                }
                None => {
                    warn!(line, "unterminated primitive tag kept as literal text");
                    let literal = format!("{}{}", OPEN_TAG, chunk);
                    self.push_literal(&mut shell, &literal, &mut line);
                }
            }
        }

        debug!(
            ops = shell.ops.len(),
            bindings = shell.bindings.len(),
            "compiled shell"
        );
        shell
    }

    fn push_literal(&self, shell: &mut CompiledShell, raw: &str, line: &mut usize) {
        let start = *line;
        *line += count_newlines(raw);

        let mut text = HTML_COMMENT.replace_all(raw, "").into_owned();
        if self.options.compress {
            text = compress(&text);
        }
        if text.is_empty() {
            return;
        }
        // Adjacent literals come from unterminated tags; keep them as one op.
        if let Some(ShellOp::Literal { text: prev, .. }) = shell.ops.last_mut() {
            prev.push_str(&text);
            return;
        }
        shell.ops.push(ShellOp::Literal { text, line: start });
    }

    fn push_fragment(&self, shell: &mut CompiledShell, fragment: &str, line: usize) {
        let (mode, body) = if let Some(rest) = fragment.strip_prefix("!#") {
            (Some(EchoMode::Escaped), rest)
        } else if let Some(rest) = fragment.strip_prefix('#') {
            (Some(EchoMode::Raw), rest)
        } else if let Some(rest) = fragment.strip_prefix('=') {
            (Some(EchoMode::Ambient), rest)
        } else {
            (None, fragment)
        };
        let code = body.trim();
        if code.is_empty() {
            return;
        }

        let mode = mode.or_else(|| is_call_like(code).then_some(EchoMode::Ambient));
        self.discover(shell, code);
        let op = match mode {
            Some(mode) => {
                let escape = match mode {
                    EchoMode::Ambient => self.options.escape,
                    EchoMode::Raw => false,
                    EchoMode::Escaped => true,
                };
                ShellOp::Echo {
                    expr: code.trim_end_matches(';').trim_end().to_string(),
                    mode,
                    escape,
                    line,
                }
            }
            None => ShellOp::Statement {
                code: code.to_string(),
                line,
            },
        };
        shell.ops.push(op);
    }

    /// Hoist the free identifiers of a fragment.
    fn discover(&self, shell: &mut CompiledShell, code: &str) {
        for name in free_identifiers(code) {
            if shell.params.contains(&name) || shell.binding(&name).is_some() {
                continue;
            }
            let kind = if self.helpers.contains(&name) {
                BindingKind::Helper
            } else if self.syntax.has_block(&name) {
                BindingKind::Block
            } else {
                BindingKind::Data
            };
            shell.bindings.push(Binding { name, kind });
        }
    }
}

/// Candidate free identifiers of a code fragment, in order of appearance.
///
/// Keywords, built-ins and number-like tokens are dropped; duplicates are
/// not.
pub(crate) fn free_identifiers(code: &str) -> Vec<String> {
    let blanked = STRINGS_AND_COMMENTS.replace_all(code, " ");
    let without_members = MEMBER_ACCESS.replace_all(&blanked, " ");
    NON_IDENTIFIER
        .split(&without_members)
        .filter(|token| !token.is_empty())
        .filter(|token| !token.starts_with(|c: char| c.is_ascii_digit()))
        .filter(|token| !is_keyword(token) && !BUILTINS.contains(token))
        .map(str::to_string)
        .collect()
}

/// A bare call such as `include("a")` or `upper(name)`.
fn is_call_like(code: &str) -> bool {
    let code = code.trim_end_matches(';').trim_end();
    CALL_LIKE
        .captures(code)
        .and_then(|caps| caps.get(1))
        .is_some_and(|name| !is_keyword(name.as_str()))
}

fn compress(text: &str) -> String {
    let stripped: String = text
        .chars()
        .filter(|c| !matches!(c, '\r' | '\n' | '\t'))
        .collect();
    SPACE_RUNS.replace_all(&stripped, " ").into_owned()
}

fn count_newlines(text: &str) -> usize {
    text.bytes().filter(|b| *b == b'\n').count()
}
