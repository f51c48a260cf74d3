/*
 * syntax/mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Custom template syntax.
//!
//! Templates are written with custom tags (`{{if x}}`, `{{= name}}`) that a
//! [`SyntaxRegistry`] of regex rules rewrites into primitive tags before the
//! shell compiler sees them.

pub mod defaults;
pub mod registry;
pub mod rewriter;

pub use defaults::{DEFAULT_RULES, DefaultRule, DefaultShell, default_rules};
pub use registry::{RuleMatcher, ShellTemplate, SyntaxRegistry, SyntaxRule};
pub use rewriter::{Rewrite, StrippedTag, rewrite, rewrite_template};
