/*
 * diagnostic.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Core diagnostic message types.
//!
//! This module defines the structures for representing diagnostic messages
//! (errors, warnings, info) following tidyverse-style guidelines: a brief
//! title, an optional problem statement, bulleted details and hints.

use crate::source::{SourceContext, SourceSpan};
use serde::{Deserialize, Serialize};

/// The kind of diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// An error that prevents completion
    Error,
    /// A warning that doesn't prevent completion but indicates a problem
    Warning,
    /// Informational message
    Info,
    /// A note providing additional context
    Note,
}

impl DiagnosticKind {
    /// Lowercase name used in JSON output.
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::Error => "error",
            DiagnosticKind::Warning => "warning",
            DiagnosticKind::Info => "info",
            DiagnosticKind::Note => "note",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            DiagnosticKind::Error => "Error",
            DiagnosticKind::Warning => "Warning",
            DiagnosticKind::Info => "Info",
            DiagnosticKind::Note => "Note",
        }
    }
}

/// How detail items should be presented (tidyverse x/i bullet style).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetailKind {
    /// Error detail (✖ bullet)
    Error,
    /// Info detail (ℹ bullet)
    Info,
    /// Note detail (plain bullet)
    Note,
}

impl DetailKind {
    fn bullet(&self) -> &'static str {
        match self {
            DetailKind::Error => "✖",
            DetailKind::Info => "ℹ",
            DetailKind::Note => "•",
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            DetailKind::Error => "error",
            DetailKind::Info => "info",
            DetailKind::Note => "note",
        }
    }
}

/// The content of a message or detail item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageContent {
    /// Plain text content (source listings, shells)
    Plain(String),
    /// Markdown content
    Markdown(String),
}

impl MessageContent {
    /// Get the raw string content for display
    pub fn as_str(&self) -> &str {
        match self {
            MessageContent::Plain(s) => s,
            MessageContent::Markdown(s) => s,
        }
    }

    /// Convert to JSON value with type information
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            MessageContent::Plain(s) => json!({
                "type": "plain",
                "content": s
            }),
            MessageContent::Markdown(s) => json!({
                "type": "markdown",
                "content": s
            }),
        }
    }
}

impl From<String> for MessageContent {
    fn from(s: String) -> Self {
        MessageContent::Markdown(s)
    }
}

impl From<&str> for MessageContent {
    fn from(s: &str) -> Self {
        MessageContent::Markdown(s.to_string())
    }
}

/// A detail item in a diagnostic message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailItem {
    /// The kind of detail (error, info, note)
    pub kind: DetailKind,
    /// The content of the detail
    pub content: MessageContent,
    /// Optional source location for this detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceSpan>,
}

/// A diagnostic message.
///
/// Structure:
/// 1. **Code**: Optional error code (e.g., "T-1-1") for searchability
/// 2. **Title**: Brief error message
/// 3. **Kind**: Error, Warning, Info
/// 4. **Problem**: What went wrong
/// 5. **Details**: Specific information (bulleted)
/// 6. **Hints**: Optional guidance for fixing (ends with ?)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticMessage {
    /// Optional error code (e.g., "T-1-1")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Brief title for the error
    pub title: String,

    /// The kind of diagnostic (Error, Warning, Info)
    pub kind: DiagnosticKind,

    /// The problem statement
    pub problem: Option<MessageContent>,

    /// Specific error details
    pub details: Vec<DetailItem>,

    /// Optional hints for fixing (ends with ?)
    pub hints: Vec<MessageContent>,

    /// Source location for this diagnostic
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceSpan>,
}

impl DiagnosticMessage {
    /// Create a new diagnostic message with just a title and kind.
    ///
    /// Note: Consider using [`DiagnosticMessageBuilder`](crate::DiagnosticMessageBuilder) instead.
    pub fn new(kind: DiagnosticKind, title: impl Into<String>) -> Self {
        Self {
            code: None,
            title: title.into(),
            kind,
            problem: None,
            details: Vec::new(),
            hints: Vec::new(),
            location: None,
        }
    }

    /// Create an error diagnostic.
    pub fn error(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Error, title)
    }

    /// Create a warning diagnostic.
    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Warning, title)
    }

    /// Create an info diagnostic.
    pub fn info(title: impl Into<String>) -> Self {
        Self::new(DiagnosticKind::Info, title)
    }

    /// Set the error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Get the documentation URL for this error, if it has a known code.
    pub fn docs_url(&self) -> Option<&str> {
        self.code
            .as_ref()
            .and_then(|code| crate::catalog::get_docs_url(code))
    }

    /// Render this diagnostic message as text.
    ///
    /// When the message has a location and `ctx` holds its file, the title,
    /// problem and located details are drawn by ariadne over the source;
    /// the remaining details and hints follow as bullets.
    ///
    /// ```
    /// use shellplate_error_reporting::DiagnosticMessageBuilder;
    ///
    /// let msg = DiagnosticMessageBuilder::error("Invalid input")
    ///     .problem("Values must be numeric")
    ///     .add_hint("Convert to numbers first?")
    ///     .build();
    /// let text = msg.to_text(None);
    /// assert!(text.starts_with("Error: Invalid input\n"));
    /// assert!(text.contains("? Convert to numbers first?"));
    /// ```
    pub fn to_text(&self, ctx: Option<&SourceContext>) -> String {
        let ariadne = match (&self.location, ctx) {
            (Some(location), Some(ctx)) => self.render_ariadne_source_context(location, ctx),
            _ => None,
        };

        let mut result = String::new();
        match ariadne {
            Some(rendered) => {
                result.push_str(&rendered);
                for detail in self.details.iter().filter(|d| d.location.is_none()) {
                    result.push_str(&format!(
                        "{} {}\n",
                        detail.kind.bullet(),
                        detail.content.as_str()
                    ));
                }
            }
            None => {
                match &self.code {
                    Some(code) => result.push_str(&format!(
                        "{} [{}]: {}\n",
                        self.kind.label(),
                        code,
                        self.title
                    )),
                    None => result.push_str(&format!("{}: {}\n", self.kind.label(), self.title)),
                }
                if let Some(problem) = &self.problem {
                    result.push_str(problem.as_str());
                    result.push('\n');
                }
                if let Some(location) = &self.location {
                    result.push_str(&format!(
                        "at {}:{}\n",
                        location.start.line, location.start.column
                    ));
                }
                for detail in &self.details {
                    result.push_str(&format!(
                        "{} {}\n",
                        detail.kind.bullet(),
                        detail.content.as_str()
                    ));
                }
            }
        }

        for hint in &self.hints {
            result.push_str(&format!("? {}\n", hint.as_str()));
        }
        result
    }

    /// Render this diagnostic message as a JSON value.
    ///
    /// ```
    /// use shellplate_error_reporting::DiagnosticMessage;
    ///
    /// let json = DiagnosticMessage::error("Something went wrong").to_json();
    /// assert_eq!(json["kind"], "error");
    /// assert_eq!(json["title"], "Something went wrong");
    /// ```
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;

        let mut obj = json!({
            "kind": self.kind.as_str(),
            "title": self.title,
        });

        if let Some(code) = &self.code {
            obj["code"] = json!(code);
        }

        if let Some(problem) = &self.problem {
            obj["problem"] = problem.to_json();
        }

        if !self.details.is_empty() {
            let details: Vec<_> = self
                .details
                .iter()
                .map(|d| {
                    let mut detail_obj = json!({
                        "kind": d.kind.as_str(),
                        "content": d.content.to_json()
                    });
                    if let Some(location) = &d.location {
                        detail_obj["location"] = json!(location);
                    }
                    detail_obj
                })
                .collect();
            obj["details"] = json!(details);
        }

        if !self.hints.is_empty() {
            let hints: Vec<_> = self.hints.iter().map(|h| h.to_json()).collect();
            obj["hints"] = json!(hints);
        }

        if let Some(location) = &self.location {
            obj["location"] = json!(location);
        }

        obj
    }

    fn render_ariadne_source_context(
        &self,
        location: &SourceSpan,
        ctx: &SourceContext,
    ) -> Option<String> {
        use ariadne::{Color, Config, Label, Report, ReportKind, Source};

        let file = ctx.get_file(location.file_id)?;

        let (report_kind, main_color) = match self.kind {
            DiagnosticKind::Error => (ReportKind::Error, Color::Red),
            DiagnosticKind::Warning => (ReportKind::Warning, Color::Yellow),
            DiagnosticKind::Info => (ReportKind::Advice, Color::Cyan),
            DiagnosticKind::Note => (ReportKind::Advice, Color::Blue),
        };

        let mut report = Report::build(report_kind, file.name.clone(), location.start.offset)
            .with_config(Config::default().with_color(false));

        if let Some(code) = &self.code {
            report = report.with_message(format!("[{}] {}", code, self.title));
        } else {
            report = report.with_message(&self.title);
        }

        let main_message = match &self.problem {
            Some(problem) => problem.as_str(),
            None => &self.title,
        };
        report = report.with_label(
            Label::new((
                file.name.clone(),
                location.start.offset..location.end.offset,
            ))
            .with_message(main_message)
            .with_color(main_color),
        );

        for detail in &self.details {
            let Some(detail_loc) = &detail.location else {
                continue;
            };
            if detail_loc.file_id != location.file_id {
                continue;
            }
            report = report.with_label(
                Label::new((
                    file.name.clone(),
                    detail_loc.start.offset..detail_loc.end.offset,
                ))
                .with_message(detail.content.as_str())
                .with_color(Color::Cyan),
            );
        }

        let mut output = Vec::new();
        report
            .finish()
            .write(
                (file.name.clone(), Source::from(file.content.as_str())),
                &mut output,
            )
            .ok()?;

        String::from_utf8(output).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DiagnosticMessageBuilder;
    use crate::source::FileId;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_diagnostic_message_new() {
        let msg = DiagnosticMessage::new(DiagnosticKind::Error, "Test error");
        assert_eq!(msg.title, "Test error");
        assert_eq!(msg.kind, DiagnosticKind::Error);
        assert!(msg.code.is_none());
        assert!(msg.problem.is_none());
        assert!(msg.details.is_empty());
    }

    #[test]
    fn test_docs_url() {
        let msg = DiagnosticMessage::error("Render failed").with_code("T-3-1");
        assert!(msg.docs_url().unwrap().contains("T-3-1"));
        assert!(DiagnosticMessage::error("x").docs_url().is_none());
    }

    #[test]
    fn test_to_text_simple_error() {
        let msg = DiagnosticMessage::error("Something went wrong");
        assert_eq!(msg.to_text(None), "Error: Something went wrong\n");
    }

    #[test]
    fn test_to_text_with_code() {
        let msg = DiagnosticMessage::warning("Tag stripped").with_code("T-1-2");
        assert_eq!(msg.to_text(None), "Warning [T-1-2]: Tag stripped\n");
    }

    #[test]
    fn test_to_text_full_message() {
        let msg = DiagnosticMessageBuilder::error("Render failed")
            .problem("Cannot read property 'x' of null")
            .add_detail("The fault happened on line 3")
            .add_info("Template `page.html`")
            .add_hint("Check the data object?")
            .build();

        let text = msg.to_text(None);
        assert!(text.contains("Error: Render failed"));
        assert!(text.contains("Cannot read property 'x' of null"));
        assert!(text.contains("✖ The fault happened on line 3"));
        assert!(text.contains("ℹ Template `page.html`"));
        assert!(text.contains("? Check the data object?"));
    }

    #[test]
    fn test_location_without_context() {
        let source = "one\ntwo {{bogus}}\n";
        let msg = DiagnosticMessageBuilder::error("Unmatched custom tag")
            .with_location(SourceSpan::from_offsets(FileId(0), source, 8, 17))
            .build();

        assert!(msg.to_text(None).contains("at 2:5"));
    }

    #[test]
    fn test_location_with_context() {
        let mut ctx = SourceContext::new();
        let source = "one\ntwo {{bogus}}\n";
        let file_id = ctx.add_file("page.html", source);
        let msg = DiagnosticMessageBuilder::error("Unmatched custom tag")
            .with_code("T-1-1")
            .with_location(SourceSpan::from_offsets(file_id, source, 8, 17))
            .add_hint("Register a rule for it?")
            .build();

        let text = msg.to_text(Some(&ctx));
        assert!(text.contains("[T-1-1] Unmatched custom tag"));
        assert!(text.contains("page.html"));
        assert!(text.contains("? Register a rule for it?"));
    }

    #[test]
    fn test_to_json_full_message() {
        let msg = DiagnosticMessageBuilder::error("Render failed")
            .with_code("T-3-1")
            .problem("x is not a function")
            .add_detail("line 4")
            .add_hint("Register the helper?")
            .build();

        let json = msg.to_json();
        assert_eq!(json["kind"], "error");
        assert_eq!(json["code"], "T-3-1");
        assert_eq!(json["problem"]["content"], "x is not a function");
        assert_eq!(json["details"][0]["kind"], "error");
        assert_eq!(json["hints"][0]["content"], "Register the helper?");
        assert!(json.get("location").is_none());
    }
}
