/*
 * builder.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Builder API for diagnostic messages.
//!
//! The builder encodes the tidyverse-style structure: start from a kind and
//! title, then add a problem statement, details and hints.
//!
//! ```
//! use shellplate_error_reporting::DiagnosticMessageBuilder;
//!
//! let error = DiagnosticMessageBuilder::error("Template render error")
//!     .with_code("T-3-1")
//!     .problem("Cannot read property 'name' of null")
//!     .add_detail("Raised on line 4")
//!     .add_hint("Is `user` present in the data object?")
//!     .build();
//! assert_eq!(error.code.as_deref(), Some("T-3-1"));
//! ```

use crate::diagnostic::{
    DetailItem, DetailKind, DiagnosticKind, DiagnosticMessage, MessageContent,
};
use crate::source::SourceSpan;

/// Builder for [`DiagnosticMessage`].
#[derive(Debug, Clone)]
pub struct DiagnosticMessageBuilder {
    message: DiagnosticMessage,
}

impl DiagnosticMessageBuilder {
    fn new(kind: DiagnosticKind, title: impl Into<String>) -> Self {
        Self {
            message: DiagnosticMessage::new(kind, title),
        }
    }

    /// Start an error message.
    pub fn error(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Error, title)
    }

    /// Start a warning message.
    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Warning, title)
    }

    /// Start an info message.
    pub fn info(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Info, title)
    }

    /// Set the error code (e.g., "T-1-1").
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.message.code = Some(code.into());
        self
    }

    /// Set the problem statement.
    pub fn problem(mut self, problem: impl Into<MessageContent>) -> Self {
        self.message.problem = Some(problem.into());
        self
    }

    /// Add an error detail (✖).
    pub fn add_detail(self, content: impl Into<MessageContent>) -> Self {
        self.push_detail(DetailKind::Error, content.into())
    }

    /// Add an info detail (ℹ).
    pub fn add_info(self, content: impl Into<MessageContent>) -> Self {
        self.push_detail(DetailKind::Info, content.into())
    }

    /// Add a note detail (•).
    pub fn add_note(self, content: impl Into<MessageContent>) -> Self {
        self.push_detail(DetailKind::Note, content.into())
    }

    /// Add a plain-text note, kept verbatim (used for source listings).
    pub fn add_listing(self, listing: impl Into<String>) -> Self {
        self.push_detail(DetailKind::Note, MessageContent::Plain(listing.into()))
    }

    /// Add a hint.
    pub fn add_hint(mut self, hint: impl Into<MessageContent>) -> Self {
        self.message.hints.push(hint.into());
        self
    }

    /// Attach the main source location.
    pub fn with_location(mut self, location: SourceSpan) -> Self {
        self.message.location = Some(location);
        self
    }

    /// Finish the message.
    pub fn build(self) -> DiagnosticMessage {
        self.message
    }

    fn push_detail(mut self, kind: DetailKind, content: MessageContent) -> Self {
        self.message.details.push(DetailItem {
            kind,
            content,
            location: None,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_kinds() {
        assert_eq!(
            DiagnosticMessageBuilder::warning("w").build().kind,
            DiagnosticKind::Warning
        );
        assert_eq!(
            DiagnosticMessageBuilder::info("i").build().kind,
            DiagnosticKind::Info
        );
    }

    #[test]
    fn test_listing_is_plain() {
        let msg = DiagnosticMessageBuilder::error("e")
            .add_listing("1 | <p>")
            .build();
        assert_eq!(
            msg.details[0].content,
            MessageContent::Plain("1 | <p>".to_string())
        );
        assert_eq!(msg.details[0].kind, DetailKind::Note);
    }
}
