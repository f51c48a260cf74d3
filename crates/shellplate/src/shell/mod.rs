/*
 * shell/mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Primitive templates and their compiled shell.
//!
//! After rewriting, a template only contains literal text and primitive
//! tags (`<% ... %>`). The [`compiler`] turns that text into a
//! [`CompiledShell`]: an ordered list of literal appends, echoes and raw
//! statements plus the names the procedure needs bound.

pub mod compiler;
pub mod ir;

pub use compiler::ShellCompiler;
pub use ir::{Binding, BindingKind, CompiledShell, EchoMode, ShellOp};

use std::ops::Range;

/// Opening delimiter of a primitive tag.
pub const OPEN_TAG: &str = "<%";
/// Closing delimiter of a primitive tag.
pub const CLOSE_TAG: &str = "%>";

/// A byte range of primitive text, either literal text or a whole tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Segment {
    Literal(Range<usize>),
    /// Covers the delimiters as well as the fragment.
    Tag(Range<usize>),
}

/// Split primitive text into literal runs and complete tags.
///
/// A tag closes at the first `%>` before the next `<%`; an opening
/// delimiter without one is literal text.
pub(crate) fn segments(text: &str) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut literal_start = 0;
    let mut pos = 0;
    while let Some(rel_open) = text[pos..].find(OPEN_TAG) {
        let open = pos + rel_open;
        let body = open + OPEN_TAG.len();
        let next_open = text[body..].find(OPEN_TAG).map(|rel| body + rel);
        match text[body..].find(CLOSE_TAG).map(|rel| body + rel) {
            Some(close) if next_open.is_none_or(|next| close < next) => {
                if open > literal_start {
                    out.push(Segment::Literal(literal_start..open));
                }
                let end = close + CLOSE_TAG.len();
                out.push(Segment::Tag(open..end));
                literal_start = end;
                pos = end;
            }
            _ => pos = body,
        }
    }
    if literal_start < text.len() {
        out.push(Segment::Literal(literal_start..text.len()));
    }
    out
}
