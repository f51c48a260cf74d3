/*
 * error.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error types for template compilation and rendering.

use std::sync::Arc;

use shellplate_error_reporting::{
    DiagnosticMessage, DiagnosticMessageBuilder, SourceContext, SourceSpan,
};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during template operations.
///
/// The type is `Clone` so that a single failed dependency compile can be
/// observed by every parent waiting on it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TemplateError {
    /// A custom tag survived the rewrite in strict mode.
    #[error("Syntax error on line {line}: {message}")]
    Syntax {
        message: String,
        line: usize,
        /// Line-numbered dump of the rewritten template.
        syntax: String,
        site: Option<ErrorSite>,
    },

    /// The procedure could not be realized from the shell.
    #[error("Compile error: {message}")]
    Compile {
        message: String,
        line: Option<usize>,
        template: String,
        shell: String,
    },

    /// The render function faulted while running.
    #[error("Render error on line {line}: {message}")]
    Exec {
        message: String,
        line: usize,
        template: String,
        shell: String,
        site: Option<ErrorSite>,
    },

    /// The source provider failed for a reason other than a missing template.
    #[error("Failed to fetch template '{identity}': {message}")]
    Fetch { identity: String, message: String },

    /// The source provider has no template with this identity.
    #[error("Template not found: {identity}")]
    NotFound { identity: String },

    /// A template includes itself, directly or through other templates.
    #[error("Include cycle detected: {}", chain.join(" -> "))]
    Cycle { chain: Vec<String> },

    /// A syntax rule could not be registered.
    #[error("Invalid syntax rule '{name}': {message}")]
    InvalidRule { name: String, message: String },

    /// Invalid engine options.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Label used for templates compiled from a string without a filename.
pub(crate) const ANONYMOUS: &str = "<anonymous>";

/// The stretch of template text an error points at.
///
/// `start..end` are byte offsets into `source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorSite {
    pub name: String,
    pub source: Arc<str>,
    pub start: usize,
    pub end: usize,
}

impl ErrorSite {
    /// The whole of 1-based `line` in `source`, without its line break.
    pub fn line_of(name: &str, source: Arc<str>, line: usize) -> Self {
        let start = match line {
            0 | 1 => 0,
            n => source.match_indices('\n').nth(n - 2).map_or(0, |(i, _)| i + 1),
        };
        let end = source[start..].find('\n').map_or(source.len(), |i| start + i);
        Self {
            name: name.to_string(),
            source,
            start,
            end,
        }
    }
}

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Error returned by a source provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Transport(String),
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            FetchError::NotFound
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

impl TemplateError {
    /// Attach an identity to a provider failure.
    pub fn from_fetch(identity: &str, err: FetchError) -> Self {
        match err {
            FetchError::NotFound => TemplateError::NotFound {
                identity: identity.to_string(),
            },
            FetchError::Transport(message) => TemplateError::Fetch {
                identity: identity.to_string(),
                message,
            },
        }
    }

    /// The catalog code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            TemplateError::Syntax { .. } => "T-1-1",
            TemplateError::Compile { .. } => "T-2-1",
            TemplateError::Exec { .. } => "T-3-1",
            TemplateError::Fetch { .. } => "T-4-1",
            TemplateError::NotFound { .. } => "T-4-2",
            TemplateError::Cycle { .. } => "T-4-3",
            TemplateError::InvalidRule { .. } => "T-5-1",
            TemplateError::Config(_) => "T-5-2",
        }
    }

    /// Convert to a diagnostic for the listener hub.
    pub fn to_diagnostic(&self) -> DiagnosticMessage {
        let builder = match self {
            TemplateError::Syntax {
                message,
                line,
                syntax,
                ..
            } => DiagnosticMessageBuilder::error("Template syntax error")
                .problem(message.as_str())
                .add_detail(format!("Unrecognized tag on line {}", line))
                .add_listing(syntax.as_str())
                .add_hint("Register a syntax rule for this tag, or compile with `strict` disabled"),
            TemplateError::Compile {
                message,
                line,
                template,
                shell,
            } => {
                let builder = DiagnosticMessageBuilder::error("Template compile error")
                    .problem(message.as_str());
                let builder = match line {
                    Some(line) => builder.add_detail(format!("Near line {}", line)),
                    None => builder.add_info("The failing line cannot be pinpointed"),
                };
                builder.add_listing(template.as_str()).add_listing(shell.as_str())
            }
            TemplateError::Exec {
                message,
                line,
                template,
                shell,
                ..
            } => DiagnosticMessageBuilder::error("Template render error")
                .problem(message.as_str())
                .add_detail(format!("Raised on line {}", line))
                .add_listing(template.as_str())
                .add_listing(shell.as_str()),
            TemplateError::Fetch { identity, message } => {
                DiagnosticMessageBuilder::error("Template fetch failed")
                    .problem(format!("Could not load `{}`", identity))
                    .add_detail(message.as_str())
            }
            TemplateError::NotFound { identity } => {
                DiagnosticMessageBuilder::error("Template not found")
                    .problem(format!("No template named `{}`", identity))
                    .add_hint("Check the include identity and the provider root")
            }
            TemplateError::Cycle { chain } => DiagnosticMessageBuilder::error("Include cycle")
                .problem(format!(
                    "`{}` includes itself",
                    chain.first().map(String::as_str).unwrap_or_default()
                ))
                .add_detail(chain.join(" -> ")),
            TemplateError::InvalidRule { name, message } => {
                DiagnosticMessageBuilder::error("Invalid syntax rule")
                    .problem(format!("Rule `{}` was rejected", name))
                    .add_detail(message.as_str())
            }
            TemplateError::Config(err) => DiagnosticMessageBuilder::error("Invalid configuration")
                .problem(err.to_string()),
        };
        builder.with_code(self.code()).build()
    }

    /// The template text this error points at, if known.
    pub fn site(&self) -> Option<&ErrorSite> {
        match self {
            TemplateError::Syntax { site, .. } | TemplateError::Exec { site, .. } => {
                site.as_ref()
            }
            _ => None,
        }
    }

    /// Like [`TemplateError::to_diagnostic`], plus the source context its
    /// location refers to when the error has a site.
    pub fn to_located_diagnostic(&self) -> (DiagnosticMessage, Option<SourceContext>) {
        let mut diagnostic = self.to_diagnostic();
        let Some(site) = self.site() else {
            return (diagnostic, None);
        };
        let mut ctx = SourceContext::new();
        let file_id = ctx.add_file(site.name.as_str(), site.source.as_ref());
        diagnostic.location = Some(SourceSpan::from_offsets(
            file_id,
            &site.source,
            site.start,
            site.end,
        ));
        (diagnostic, Some(ctx))
    }

    /// Text rendering of the error, with a source snippet when located.
    pub fn to_report_text(&self) -> String {
        let (diagnostic, ctx) = self.to_located_diagnostic();
        diagnostic.to_text(ctx.as_ref())
    }
}
