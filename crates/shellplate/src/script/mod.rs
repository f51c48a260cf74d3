/*
 * script/mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The logic-fragment language.
//!
//! A compiled shell is tokenized into one stream ([`lexer`]), parsed into
//! a procedure ([`ast`], [`parser`]) and executed by the interpreter
//! ([`interp`]) each time its render function is called.

pub mod ast;
pub mod interp;
pub mod lexer;
pub mod parser;

pub use interp::{Fault, MAX_INCLUDE_DEPTH};
pub use parser::{ParseError, parse_shell};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::shell::{CompiledShell, EchoMode, ShellOp};

    /// Build a one-line shell from `(kind, text)` pairs.
    ///
    /// Kinds: `""` statement, `"text"` literal, `"="` ambient echo,
    /// `"#"` raw echo, `"!#"` escaped echo.
    pub fn shell_of(ops: &[(&str, &str)]) -> CompiledShell {
        let ops = ops
            .iter()
            .map(|(kind, text)| {
                let echo = |mode, escape| ShellOp::Echo {
                    expr: text.to_string(),
                    mode,
                    escape,
                    line: 1,
                };
                match *kind {
                    "text" => ShellOp::Literal {
                        text: text.to_string(),
                        line: 1,
                    },
                    "=" => echo(EchoMode::Ambient, true),
                    "#" => echo(EchoMode::Raw, false),
                    "!#" => echo(EchoMode::Escaped, true),
                    _ => ShellOp::Statement {
                        code: text.to_string(),
                        line: 1,
                    },
                }
            })
            .collect();
        CompiledShell {
            ops,
            escape: true,
            ..CompiledShell::default()
        }
    }
}
