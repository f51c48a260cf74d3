/*
 * script/ast.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Procedure AST.
//!
//! A realized render function is a list of [`Stmt`]s. Literal text and
//! echoes of the compiled shell appear as statements alongside the code
//! written in logic fragments. Every statement records the template line it
//! came from.

use serde_json::Value;

/// A statement with the template line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: usize,
}

/// One `if` / `else if` arm. `line` is where its condition is written.
#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub cond: Expr,
    pub body: Vec<Stmt>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// Literal template text.
    Append(String),

    /// Echo an expression, escaping it when `escape` is set.
    Echo { expr: Expr, escape: bool },

    /// `var name = value` (also `let` and `const`).
    Declare { name: String, value: Option<Expr> },

    /// `name = value`, `name += value`, `name -= value`, `name++`, `name--`.
    Assign {
        name: String,
        op: AssignOp,
        value: Expr,
    },

    /// `if (c) {} else if (c) {} else {}`
    If {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Stmt>>,
    },

    /// `for (item of list) {}` or `for (item, index of list) {}`
    ForOf {
        item: String,
        index: Option<String>,
        iterable: Expr,
        body: Vec<Stmt>,
    },

    /// `for (key in object) {}`
    ForIn {
        key: String,
        iterable: Expr,
        body: Vec<Stmt>,
    },

    /// An expression evaluated for its effect.
    Expr(Expr),

    Break,
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Ident(String),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call { callee: String, args: Vec<Arg> },
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
}

/// A call argument: a value, or the body of a block helper.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(Expr),
    Body(Function),
}

/// `function(params) { body }`, only valid as a block helper argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
}
