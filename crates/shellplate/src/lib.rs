/*
 * lib.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template-to-procedure compiler.
//!
//! Templates are written with custom tags and compiled in stages:
//!
//! - Custom tags (`{{if x}}`, `{{= name}}`, `{{each list as item}}`) are
//!   rewritten by regex rules into primitive tags (`<% ... %>`).
//! - Primitive text is compiled into a shell: literal appends, echoes and
//!   statements, plus the names the procedure binds.
//! - The shell is realized as a [`RenderFunction`] bound to a fixed scope
//!   of helpers, block helpers, included templates and `depends` values.
//! - Render functions compiled by identity are cached, and the templates
//!   they `include(...)` are compiled first, synchronously or
//!   asynchronously.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use shellplate::{Engine, MemoryProvider, Options};
//!
//! let engine = Engine::new();
//! let provider = MemoryProvider::with_templates([
//!     ("page", "<ul>{{each items as item}}<li>{{= item}}</li>{{/each}}</ul>"),
//! ]);
//! let page = engine.compile("page", &provider, &Options::default());
//! assert_eq!(
//!     page.render(&json!({"items": ["a", "<b>"]})),
//!     "<ul><li>a</li><li>&lt;b&gt;</li></ul>"
//! );
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod helpers;
pub mod listener;
pub mod render;
pub mod resolver;
pub mod script;
pub mod shell;
pub mod syntax;
pub mod value;

// Re-export main types at crate root
pub use cache::{TemplateCache, WeakCache};
pub use config::{ConfigError, OptionKey, OptionValue, Options};
pub use engine::Engine;
pub use error::{ErrorSite, FetchError, TemplateError, TemplateResult};
pub use helpers::{BlockHelper, BlockInvocation, Helper, HelperError, HelperRegistry};
pub use listener::{
    CollectingListener, DiagnosticHub, DiagnosticListener, EventKind, ListenerId, TracingListener,
};
pub use render::{RenderBuilder, RenderFunction, Scope};
pub use resolver::{
    AsyncSourceProvider, Blocking, DependencyGraph, FileSystemProvider, InlineLocator,
    InlineProvider, MemoryProvider, NullProvider, SourceProvider, scan_includes,
};
pub use shell::{CompiledShell, ShellCompiler, ShellOp};
pub use syntax::{RuleMatcher, ShellTemplate, SyntaxRegistry, SyntaxRule};
