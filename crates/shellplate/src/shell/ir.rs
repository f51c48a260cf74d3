/*
 * shell/ir.rs
 * Copyright (c) 2025 Posit, PBC
 */

use std::fmt;

/// How an echo decides whether to escape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoMode {
    /// `<%= expr %>` or a bare call: follows the `escape` option.
    Ambient,
    /// `<%# expr %>`: never escaped.
    Raw,
    /// `<%!# expr %>`: always escaped.
    Escaped,
}

/// One step of the compiled shell.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellOp {
    Literal {
        text: String,
        line: usize,
    },
    Echo {
        expr: String,
        mode: EchoMode,
        /// Resolved escaping for this echo.
        escape: bool,
        line: usize,
    },
    Statement {
        code: String,
        line: usize,
    },
}

impl ShellOp {
    pub fn line(&self) -> usize {
        match self {
            ShellOp::Literal { line, .. }
            | ShellOp::Echo { line, .. }
            | ShellOp::Statement { line, .. } => *line,
        }
    }
}

/// Where a hoisted name is bound from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingKind {
    Data,
    Helper,
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub name: String,
    pub kind: BindingKind,
}

/// The compiled form of a primitive template.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CompiledShell {
    /// Hoisted names in discovery order, without duplicates.
    pub bindings: Vec<Binding>,
    /// `depends` parameter names, in order.
    pub params: Vec<String>,
    pub ops: Vec<ShellOp>,
    /// The ambient escape setting the shell was compiled with.
    pub escape: bool,
    /// The primitive text the shell was compiled from.
    pub source: String,
}

impl CompiledShell {
    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.name == name)
    }
}

impl fmt::Display for CompiledShell {
    /// A readable listing of the procedure, used in diagnostics.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut params = vec!["data".to_string()];
        params.extend(self.params.iter().cloned());
        writeln!(f, "procedure({}) {{", params.join(", "))?;
        for binding in &self.bindings {
            let source = match binding.kind {
                BindingKind::Data => "data",
                BindingKind::Helper => "helpers",
                BindingKind::Block => "blocks",
            };
            writeln!(f, "  var {0} = {1}.{0};", binding.name, source)?;
        }
        for op in &self.ops {
            match op {
                ShellOp::Literal { text, line } => writeln!(f, "  @{} append({:?});", line, text)?,
                ShellOp::Echo {
                    expr, escape, line, ..
                } => {
                    if *escape {
                        writeln!(f, "  @{} append(escape({}));", line, expr)?;
                    } else {
                        writeln!(f, "  @{} append({});", line, expr)?;
                    }
                }
                ShellOp::Statement { code, line } => writeln!(f, "  @{} {}", line, code)?,
            }
        }
        write!(f, "}}")
    }
}
