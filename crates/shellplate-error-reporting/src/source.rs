/*
 * source.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Source location tracking for diagnostics.
//!
//! Templates are identified by name (filename or cache identity) and kept in
//! memory, so a [`SourceContext`] only needs to hold ephemeral files. Byte
//! offsets are mapped to 1-based lines on demand.

use serde::{Deserialize, Serialize};

/// A unique identifier for a source file inside a [`SourceContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(pub usize);

/// A location in source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    /// Byte offset from start of source
    pub offset: usize,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based, in characters)
    pub column: usize,
}

/// A span of a registered source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    pub file_id: FileId,
    pub start: Location,
    pub end: Location,
}

impl SourceSpan {
    /// Build a span from byte offsets into `source`.
    ///
    /// Offsets past the end of the source are clamped.
    pub fn from_offsets(file_id: FileId, source: &str, start: usize, end: usize) -> Self {
        let start = offset_to_location(source, start.min(source.len()));
        let end = offset_to_location(source, end.min(source.len()).max(start.offset));
        Self {
            file_id,
            start,
            end,
        }
    }
}

/// A named in-memory source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// Template identity or path
    pub name: String,
    /// File content
    pub content: String,
}

/// Context for managing source files referenced by diagnostics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceContext {
    files: Vec<SourceFile>,
}

impl SourceContext {
    /// Create a new empty source context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file to the context and return its ID.
    pub fn add_file(&mut self, name: impl Into<String>, content: impl Into<String>) -> FileId {
        let id = FileId(self.files.len());
        self.files.push(SourceFile {
            name: name.into(),
            content: content.into(),
        });
        id
    }

    /// Get a file by ID.
    pub fn get_file(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id.0)
    }
}

/// Convert a byte offset to a [`Location`] with 1-based line and column.
pub fn offset_to_location(source: &str, offset: usize) -> Location {
    let offset = offset.min(source.len());
    let mut line = 1;
    let mut column = 1;

    for (index, ch) in source.char_indices() {
        if index >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            column = 1;
        } else {
            column += 1;
        }
    }

    Location {
        offset,
        line,
        column,
    }
}

/// 1-based line number of a byte offset (newlines before the offset, plus one).
pub fn line_of_offset(source: &str, offset: usize) -> usize {
    let end = offset.min(source.len());
    source.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1
}

/// Render `source` with right-aligned line numbers.
///
/// When `highlight` names a line, that line is marked with `>`.
///
/// ```
/// use shellplate_error_reporting::numbered_listing;
///
/// let listing = numbered_listing("a\nb", Some(2));
/// assert_eq!(listing, "  1 | a\n> 2 | b\n");
/// ```
pub fn numbered_listing(source: &str, highlight: Option<usize>) -> String {
    let count = source.lines().count().max(1);
    let width = count.to_string().len();
    let mut out = String::new();

    for (index, text) in source.lines().enumerate() {
        let number = index + 1;
        let marker = if highlight == Some(number) { "> " } else { "  " };
        out.push_str(&format!("{marker}{number:>width$} | {text}\n"));
    }
    out
}
