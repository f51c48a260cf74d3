/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error reporting and diagnostic messages for shellplate.
//!
//! Every failure in the template pipeline (syntax, compile, exec, fetch) is
//! turned into a [`DiagnosticMessage`] before it reaches a listener. The
//! message follows a tidyverse-style structure and renders either as text
//! (with an ariadne source snippet when a location is known) or as JSON.
//!
//! - [`DiagnosticMessage`]: the message structure
//! - [`DiagnosticMessageBuilder`]: builder API
//! - [`catalog`]: error codes (`T-<subsystem>-<n>`) embedded from JSON
//! - [`source`]: source files, locations and line-numbered listings

pub mod builder;
pub mod catalog;
pub mod diagnostic;
pub mod source;

pub use builder::DiagnosticMessageBuilder;
pub use catalog::{ERROR_CATALOG, ErrorCodeInfo, get_docs_url, get_error_info, get_subsystem};
pub use diagnostic::{DetailItem, DetailKind, DiagnosticKind, DiagnosticMessage, MessageContent};
pub use source::{
    FileId, Location, SourceContext, SourceFile, SourceSpan, line_of_offset, numbered_listing,
    offset_to_location,
};
