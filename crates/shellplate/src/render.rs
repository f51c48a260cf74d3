/*
 * render.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Realized render functions.
//!
//! [`RenderBuilder`] parses a [`CompiledShell`] into a procedure and binds
//! it to a [`Scope`]. The scope is fixed at build time: registering helpers
//! or rules afterwards does not change functions that already exist.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use shellplate_error_reporting::numbered_listing;

use crate::cache::WeakCache;
use crate::error::{ANONYMOUS, ErrorSite, TemplateError, TemplateResult};
use crate::helpers::{BlockHelper, Helper};
use crate::listener::DiagnosticHub;
use crate::script::ast::Stmt;
use crate::script::interp::Interpreter;
use crate::script::parser::parse_shell;
use crate::shell::{BindingKind, CompiledShell};

/// Everything a render function can see besides its data.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    identity: Option<String>,
    source: String,
    helpers: HashMap<String, Helper>,
    blocks: HashMap<String, BlockHelper>,
    includes: HashMap<String, RenderFunction>,
    depends: Vec<Value>,
    hub: DiagnosticHub,
    cache: Option<WeakCache>,
}

impl Scope {
    /// A scope over `source` with no helpers, includes or listeners.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    pub fn with_identity(mut self, identity: Option<String>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_helpers(mut self, helpers: HashMap<String, Helper>) -> Self {
        self.helpers = helpers;
        self
    }

    pub fn with_blocks(mut self, blocks: HashMap<String, BlockHelper>) -> Self {
        self.blocks = blocks;
        self
    }

    pub fn with_includes(mut self, includes: HashMap<String, RenderFunction>) -> Self {
        self.includes = includes;
        self
    }

    /// Values for the `depends` parameters, in declaration order.
    pub fn with_depends(mut self, depends: Vec<Value>) -> Self {
        self.depends = depends;
        self
    }

    pub fn with_hub(mut self, hub: DiagnosticHub) -> Self {
        self.hub = hub;
        self
    }

    /// Fall back to this cache for includes missing from the include table.
    pub fn with_cache(mut self, cache: WeakCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// The template text listings refer to.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn depends(&self) -> &[Value] {
        &self.depends
    }

    pub fn hub(&self) -> &DiagnosticHub {
        &self.hub
    }

    pub fn helper(&self, name: &str) -> Option<&Helper> {
        self.helpers.get(name)
    }

    pub fn block(&self, name: &str) -> Option<&BlockHelper> {
        self.blocks.get(name)
    }

    pub fn include_names(&self) -> impl Iterator<Item = &str> {
        self.includes.keys().map(String::as_str)
    }

    /// The render function for `identity`: the include table first, then
    /// the engine cache.
    pub fn resolve_include(&self, identity: &str) -> Option<RenderFunction> {
        self.includes
            .get(identity)
            .cloned()
            .or_else(|| self.cache.as_ref().and_then(|cache| cache.get(identity)))
    }
}

struct Procedure {
    shell: CompiledShell,
    body: Vec<Stmt>,
    scope: Scope,
}

enum Realized {
    Noop,
    Procedure(Procedure),
}

/// A callable render function. Clones share the same procedure.
#[derive(Clone)]
pub struct RenderFunction(Arc<Realized>);

impl fmt::Debug for RenderFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_ref() {
            Realized::Noop => f.write_str("RenderFunction(noop)"),
            Realized::Procedure(procedure) => f
                .debug_struct("RenderFunction")
                .field("identity", &procedure.scope.identity)
                .field("ops", &procedure.shell.ops.len())
                .finish(),
        }
    }
}

impl RenderFunction {
    /// A render function that always renders the empty string.
    pub fn noop() -> Self {
        RenderFunction(Arc::new(Realized::Noop))
    }

    pub fn is_noop(&self) -> bool {
        matches!(self.0.as_ref(), Realized::Noop)
    }

    /// Whether both handles refer to the same realized procedure.
    pub fn ptr_eq(&self, other: &RenderFunction) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn shell(&self) -> Option<&CompiledShell> {
        match self.0.as_ref() {
            Realized::Noop => None,
            Realized::Procedure(procedure) => Some(&procedure.shell),
        }
    }

    pub fn scope(&self) -> Option<&Scope> {
        match self.0.as_ref() {
            Realized::Noop => None,
            Realized::Procedure(procedure) => Some(&procedure.scope),
        }
    }

    /// Render `data`. Faults are reported to the scope's listeners and
    /// produce an empty string.
    pub fn render(&self, data: &Value) -> String {
        self.report_failure(self.try_render(data))
    }

    /// Render with explicit `depends` values in place of the scope's.
    pub fn render_with(&self, data: &Value, depends: &[Value]) -> String {
        self.report_failure(self.try_render_with(data, depends))
    }

    /// Render `data`, returning faults instead of reporting them.
    pub fn try_render(&self, data: &Value) -> TemplateResult<String> {
        self.run(data, None, 0)
    }

    pub fn try_render_with(&self, data: &Value, depends: &[Value]) -> TemplateResult<String> {
        self.run(data, Some(depends), 0)
    }

    pub(crate) fn try_render_nested(&self, data: &Value, depth: usize) -> TemplateResult<String> {
        self.run(data, None, depth)
    }

    fn report_failure(&self, result: TemplateResult<String>) -> String {
        match result {
            Ok(text) => text,
            Err(err) => {
                if let Some(scope) = self.scope() {
                    scope.hub.report_error(&err);
                }
                String::new()
            }
        }
    }

    fn run(&self, data: &Value, depends: Option<&[Value]>, depth: usize) -> TemplateResult<String> {
        let Realized::Procedure(procedure) = self.0.as_ref() else {
            return Ok(String::new());
        };
        let Procedure { shell, body, scope } = procedure;

        let mut globals = HashMap::new();
        for binding in &shell.bindings {
            if binding.kind == BindingKind::Data {
                let value = data.get(&binding.name).cloned().unwrap_or(Value::Null);
                globals.insert(binding.name.clone(), value);
            }
        }
        let depends = depends.unwrap_or(&scope.depends);
        for (i, name) in shell.params.iter().enumerate() {
            globals.insert(name.clone(), depends.get(i).cloned().unwrap_or(Value::Null));
        }

        Interpreter::new(scope, data, globals, depth)
            .run(body)
            .map_err(|fault| TemplateError::Exec {
                template: numbered_listing(&scope.source, Some(fault.line)),
                shell: shell.to_string(),
                site: Some(ErrorSite::line_of(
                    scope.identity.as_deref().unwrap_or(ANONYMOUS),
                    Arc::from(scope.source.as_str()),
                    fault.line,
                )),
                message: fault.message,
                line: fault.line,
            })
    }
}

/// Realizes compiled shells into render functions.
pub struct RenderBuilder;

impl RenderBuilder {
    /// Realize `shell` in `scope`.
    ///
    /// Fails with [`TemplateError::Compile`] when the shell does not form a
    /// valid procedure or names a helper the scope cannot supply.
    pub fn try_build(shell: CompiledShell, scope: Scope) -> TemplateResult<RenderFunction> {
        let compile_error = |message: String| TemplateError::Compile {
            message,
            line: None,
            template: numbered_listing(&scope.source, None),
            shell: shell.to_string(),
        };

        for binding in &shell.bindings {
            let missing = match binding.kind {
                BindingKind::Helper => scope.helper(&binding.name).is_none(),
                BindingKind::Block => scope.block(&binding.name).is_none(),
                BindingKind::Data => false,
            };
            if missing {
                return Err(compile_error(format!(
                    "helper `{}` is not available in this scope",
                    binding.name
                )));
            }
        }

        let body = match parse_shell(&shell) {
            Ok(body) => body,
            Err(err) => {
                return Err(compile_error(format!(
                    "{} (near line {})",
                    err.message, err.line
                )));
            }
        };

        tracing::debug!(
            identity = scope.identity.as_deref().unwrap_or(ANONYMOUS),
            statements = body.len(),
            "realized render function"
        );
        Ok(RenderFunction(Arc::new(Realized::Procedure(Procedure {
            shell,
            body,
            scope,
        }))))
    }

    /// Like [`RenderBuilder::try_build`], but reports a compile error to the
    /// scope's listeners and returns [`RenderFunction::noop`].
    pub fn build(shell: CompiledShell, scope: Scope) -> RenderFunction {
        let hub = scope.hub.clone();
        match Self::try_build(shell, scope) {
            Ok(function) => function,
            Err(err) => {
                hub.report_error(&err);
                RenderFunction::noop()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::helpers::{BlockInvocation, HelperRegistry};
    use crate::listener::{CollectingListener, EventKind};
    use crate::shell::ShellCompiler;
    use crate::syntax::SyntaxRegistry;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn compile(text: &str, syntax: &SyntaxRegistry) -> (CompiledShell, Scope) {
        let options = Options::default();
        let helpers = HelperRegistry::with_defaults();
        let shell = ShellCompiler::new(&options, &helpers, syntax).compile(text);
        let scope = Scope::new(text)
            .with_helpers(helpers.snapshot())
            .with_blocks(syntax.block_snapshot());
        (shell, scope)
    }

    fn build(text: &str) -> RenderFunction {
        let (shell, scope) = compile(text, &SyntaxRegistry::new());
        RenderBuilder::try_build(shell, scope).unwrap()
    }

    #[test]
    fn test_render_data_and_helpers() {
        let render = build("<%= upper(name) %> has <%= items.length %> items");
        assert_eq!(
            render.render(&json!({"name": "ann", "items": [1, 2]})),
            "ANN has 2 items"
        );
    }

    #[test]
    fn test_missing_data_renders_empty() {
        let render = build("[<%= missing %>]");
        assert_eq!(render.render(&json!({})), "[]");
    }

    #[test]
    fn test_exec_error_carries_line_and_listings() {
        let render = build("a\nb\n<%= user.name %>\n");
        let err = render.try_render(&json!({"user": null})).unwrap_err();
        let TemplateError::Exec {
            message,
            line,
            template,
            shell,
            site,
        } = err
        else {
            panic!("expected exec error");
        };
        assert_eq!(message, "Cannot read property 'name' of null");
        assert_eq!(line, 3);
        assert!(template.contains("> 3 | <%= user.name %>"));
        assert!(shell.starts_with("procedure(data) {"));
        let site = site.expect("exec errors carry a site");
        assert_eq!(&site.source[site.start..site.end], "<%= user.name %>");
    }

    #[test]
    fn test_render_reports_exec_errors() {
        let hub = DiagnosticHub::new();
        let collected = CollectingListener::new();
        hub.on(EventKind::Error, collected.clone());
        let text = "<%= nope() %>";
        let (shell, scope) = compile(text, &SyntaxRegistry::new());
        let render = RenderBuilder::try_build(shell, scope.with_hub(hub)).unwrap();

        assert_eq!(render.render(&json!({})), "");
        assert_eq!(collected.codes(), vec!["T-3-1".to_string()]);
    }

    #[test]
    fn test_compile_error_yields_noop() {
        let hub = DiagnosticHub::new();
        let collected = CollectingListener::new();
        hub.on(EventKind::Error, collected.clone());
        let (shell, scope) = compile("<% if (a) { %>never closed", &SyntaxRegistry::new());
        let render = RenderBuilder::build(shell, scope.with_hub(hub));

        assert!(render.is_noop());
        assert_eq!(render.render(&json!({"a": true})), "");
        let diagnostics = collected.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code.as_deref(), Some("T-2-1"));
    }

    #[test]
    fn test_block_helper_renders_body() {
        let mut syntax = SyntaxRegistry::new();
        syntax
            .register_block(
                "twice",
                BlockHelper::new(|call: &mut BlockInvocation<'_>| {
                    for i in 0..2 {
                        let text = call.render_body(&[json!(i)])?;
                        call.append(&text);
                    }
                    Ok(())
                }),
            )
            .unwrap();
        let (shell, scope) = compile("<% twice(function(it) { %>[<%= it %>]<% }) %>", &syntax);
        let render = RenderBuilder::try_build(shell, scope).unwrap();
        assert_eq!(render.render(&json!({})), "[0][1]");
    }

    #[test]
    fn test_depends_params() {
        let options = Options::default().with_depends(["$site"]);
        let helpers = HelperRegistry::new();
        let syntax = SyntaxRegistry::new();
        let text = "<%= $site.name %>";
        let shell = ShellCompiler::new(&options, &helpers, &syntax).compile(text);
        let scope = Scope::new(text).with_depends(vec![json!({"name": "docs"})]);
        let render = RenderBuilder::try_build(shell, scope).unwrap();

        assert_eq!(render.render(&json!({})), "docs");
        assert_eq!(render.render_with(&json!({}), &[json!({"name": "blog"})]), "blog");
    }

    #[test]
    fn test_include_from_table() {
        let partial = build("<b><%= name %></b>");
        let (shell, scope) = compile("<%# include('partial') %>!", &SyntaxRegistry::new());
        let mut includes = HashMap::new();
        includes.insert("partial".to_string(), partial);
        let render = RenderBuilder::try_build(shell, scope.with_includes(includes)).unwrap();
        assert_eq!(render.render(&json!({"name": "x"})), "<b>x</b>!");
    }

    #[test]
    fn test_noop_identity() {
        let a = RenderFunction::noop();
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&RenderFunction::noop()));
        assert_eq!(a.try_render(&json!({})), Ok(String::new()));
    }
}
