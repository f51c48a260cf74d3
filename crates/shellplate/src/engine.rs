/*
 * engine.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The compile pipeline.
//!
//! An [`Engine`] owns the syntax rules, helpers, render cache and listener
//! hub. Compiling a template by identity runs:
//!
//! 1. Lookup: a cached render function is returned as is; options are not
//!    validated on a hit.
//! 2. Fetch: the source provider loads the template text.
//! 3. Dependencies: literal `include(...)` targets are compiled first.
//! 4. Finalize: rewrite, compile the shell, realize it and cache the result.
//!
//! The `try_*` methods return errors. The others report them to the
//! listener hub and fall back to [`RenderFunction::noop`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{self, LocalBoxFuture, Shared};
use serde_json::Value;
use shellplate_error_reporting::{DiagnosticMessage, DiagnosticMessageBuilder};
use tracing::debug;

use crate::cache::TemplateCache;
use crate::config::{DEPENDS_MARKER, Options};
use crate::error::{ANONYMOUS, TemplateError, TemplateResult};
use crate::helpers::{BlockHelper, Helper, HelperRegistry};
use crate::listener::{DiagnosticHub, DiagnosticListener, EventKind, ListenerId};
use crate::render::{RenderBuilder, RenderFunction, Scope};
use crate::resolver::{AsyncSourceProvider, DependencyGraph, SourceProvider, scan_includes};
use crate::shell::{CompiledShell, ShellCompiler};
use crate::syntax::{StrippedTag, SyntaxRegistry, SyntaxRule, rewrite_template};

/// Compiles templates into cached render functions.
#[derive(Debug, Clone)]
pub struct Engine {
    syntax: SyntaxRegistry,
    helpers: HelperRegistry,
    cache: TemplateCache,
    hub: DiagnosticHub,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine with the default syntax rules and helpers.
    pub fn new() -> Self {
        Self {
            syntax: SyntaxRegistry::with_defaults(),
            helpers: HelperRegistry::with_defaults(),
            cache: TemplateCache::new(),
            hub: DiagnosticHub::new(),
        }
    }

    /// An engine with no syntax rules and no helpers.
    pub fn bare() -> Self {
        Self {
            syntax: SyntaxRegistry::new(),
            helpers: HelperRegistry::new(),
            cache: TemplateCache::new(),
            hub: DiagnosticHub::new(),
        }
    }

    pub fn syntax(&self) -> &SyntaxRegistry {
        &self.syntax
    }

    pub fn helpers(&self) -> &HelperRegistry {
        &self.helpers
    }

    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    pub fn hub(&self) -> &DiagnosticHub {
        &self.hub
    }

    pub fn register_rule(&mut self, rule: SyntaxRule) {
        self.syntax.register(rule);
    }

    pub fn register_rules<I>(&mut self, rules: I)
    where
        I: IntoIterator<Item = SyntaxRule>,
    {
        self.syntax.register_many(rules);
    }

    pub fn unregister_rule(&mut self, name: &str) -> bool {
        self.syntax.unregister(name)
    }

    pub fn register_helper(&mut self, name: impl Into<String>, helper: Helper) {
        self.helpers.register(name, helper);
    }

    pub fn unregister_helper(&mut self, name: &str) -> bool {
        self.helpers.unregister(name)
    }

    /// Register a block helper and its `{{name ...}}` / `{{/name}}` syntax.
    pub fn register_block(&mut self, name: &str, handler: BlockHelper) -> TemplateResult<()> {
        self.syntax.register_block(name, handler)
    }

    pub fn unregister_block(&mut self, name: &str) -> bool {
        self.syntax.unregister_block(name)
    }

    pub fn on(&self, kind: EventKind, listener: impl DiagnosticListener + 'static) -> ListenerId {
        self.hub.on(kind, listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.hub.off(id)
    }

    /// Rewrite and compile `source` to its shell without realizing it.
    pub fn shell(&self, source: &str, options: &Options) -> TemplateResult<CompiledShell> {
        options.validate()?;
        let label = options.filename.as_deref().unwrap_or(ANONYMOUS);
        let primitive = if options.no_syntax {
            source.to_string()
        } else {
            let rewrite = rewrite_template(source, &self.syntax, options)?;
            debug!(template = label, passes = rewrite.passes, "rewrote custom syntax");
            for tag in &rewrite.stripped {
                self.hub.report(&stripped_tag_warning(label, tag));
            }
            rewrite.text
        };
        Ok(ShellCompiler::new(options, &self.helpers, &self.syntax).compile(&primitive))
    }

    /// Values for the `depends` parameters, taken from the option values.
    ///
    /// A missing value is `null` and reported as a warning.
    pub fn resolve_depends(&self, options: &Options) -> Vec<Value> {
        options
            .depends
            .iter()
            .map(|name| {
                let key = name.strip_prefix(DEPENDS_MARKER).unwrap_or(name);
                match options.value(key) {
                    Some(value) => value.clone(),
                    None => {
                        self.hub.report(&missing_depends_warning(name));
                        Value::Null
                    }
                }
            })
            .collect()
    }

    fn realize(
        &self,
        identity: Option<&str>,
        source: &str,
        options: &Options,
        includes: HashMap<String, RenderFunction>,
    ) -> TemplateResult<RenderFunction> {
        let shell = self.shell(source, options)?;
        let scope = Scope::new(source)
            .with_identity(identity.map(str::to_string))
            .with_helpers(self.helpers.snapshot())
            .with_blocks(self.syntax.block_snapshot())
            .with_includes(includes)
            .with_depends(self.resolve_depends(options))
            .with_hub(self.hub.clone())
            .with_cache(self.cache.downgrade());
        RenderBuilder::try_build(shell, scope)
    }

    fn finalize(&self, identity: &str, function: RenderFunction, options: &Options) -> RenderFunction {
        if options.override_cache {
            self.cache.replace(identity, function.clone());
            function
        } else {
            self.cache.insert_first(identity, function)
        }
    }

    fn lookup(&self, identity: &str, options: &Options) -> Option<RenderFunction> {
        if options.override_cache {
            return None;
        }
        let hit = self.cache.get(identity);
        if hit.is_some() {
            debug!(identity, "render cache hit");
        }
        hit
    }

    fn report(&self, result: TemplateResult<RenderFunction>) -> RenderFunction {
        match result {
            Ok(function) => function,
            Err(err) => {
                self.hub.report_error(&err);
                RenderFunction::noop()
            }
        }
    }

    /// Compile the template `identity`, fetching it and its includes from
    /// `provider`.
    pub fn try_compile(
        &self,
        identity: &str,
        provider: &dyn SourceProvider,
        options: &Options,
    ) -> TemplateResult<RenderFunction> {
        if let Some(hit) = self.lookup(identity, options) {
            return Ok(hit);
        }
        options.validate()?;
        let mut graph = DependencyGraph::new();
        self.compile_sync(identity, provider, options, &mut graph)
    }

    pub fn compile(
        &self,
        identity: &str,
        provider: &dyn SourceProvider,
        options: &Options,
    ) -> RenderFunction {
        self.report(self.try_compile(identity, provider, options))
    }

    /// Compile a template given as text. The result is not cached.
    ///
    /// Includes are looked up in the cache when the template renders.
    pub fn try_compile_source(&self, source: &str, options: &Options) -> TemplateResult<RenderFunction> {
        options.validate()?;
        self.realize(options.filename.as_deref(), source, options, HashMap::new())
    }

    pub fn compile_source(&self, source: &str, options: &Options) -> RenderFunction {
        self.report(self.try_compile_source(source, options))
    }

    /// Compile a template given as text, compiling its includes from
    /// `provider` first. The result is not cached.
    pub fn try_compile_source_with(
        &self,
        source: &str,
        provider: &dyn SourceProvider,
        options: &Options,
    ) -> TemplateResult<RenderFunction> {
        options.validate()?;
        let label = options.filename.as_deref().unwrap_or(ANONYMOUS);
        let mut graph = DependencyGraph::new();
        let includes = self.dependencies_sync(label, source, provider, options, &mut graph)?;
        self.realize(options.filename.as_deref(), source, options, includes)
    }

    /// Compile and render `source` in one step.
    pub fn render_source(&self, source: &str, data: &Value, options: &Options) -> String {
        self.compile_source(source, options).render(data)
    }

    fn compile_sync(
        &self,
        identity: &str,
        provider: &dyn SourceProvider,
        options: &Options,
        graph: &mut DependencyGraph,
    ) -> TemplateResult<RenderFunction> {
        debug!(identity, "fetching template");
        let source = provider
            .fetch(identity)
            .map_err(|err| TemplateError::from_fetch(identity, err))?;
        let includes = self.dependencies_sync(identity, &source, provider, options, graph)?;
        let function = self.realize(Some(identity), &source, options, includes)?;
        Ok(self.finalize(identity, function, options))
    }

    /// Compile every include of `source`. All of them are attempted; the
    /// first failure is returned.
    fn dependencies_sync(
        &self,
        parent: &str,
        source: &str,
        provider: &dyn SourceProvider,
        options: &Options,
        graph: &mut DependencyGraph,
    ) -> TemplateResult<HashMap<String, RenderFunction>> {
        let mut includes = HashMap::new();
        let mut first_error = None;
        for child in scan_includes(source, options) {
            let result = graph.add_edge(parent, &child).and_then(|()| {
                match self.cache.get(&child) {
                    Some(hit) => Ok(hit),
                    None => {
                        let child_options = options.for_dependency(&child);
                        self.compile_sync(&child, provider, &child_options, graph)
                    }
                }
            });
            match result {
                Ok(function) => {
                    includes.insert(child, function);
                }
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(includes),
        }
    }

    /// Compile the template `identity` with an asynchronous provider.
    ///
    /// Includes of one template are fetched concurrently, and a template
    /// included from several places is fetched once.
    pub async fn try_compile_async(
        &self,
        identity: &str,
        provider: &dyn AsyncSourceProvider,
        options: &Options,
    ) -> TemplateResult<RenderFunction> {
        if let Some(hit) = self.lookup(identity, options) {
            return Ok(hit);
        }
        options.validate()?;
        let session = Rc::new(AsyncSession {
            engine: self,
            provider,
            graph: RefCell::new(DependencyGraph::new()),
            pending: RefCell::new(HashMap::new()),
        });
        let result = Rc::clone(&session)
            .compile(identity.to_string(), options.clone())
            .await;
        // Pending futures hold the session; drop them to free it.
        session.pending.borrow_mut().clear();
        result
    }

    pub async fn compile_async(
        &self,
        identity: &str,
        provider: &dyn AsyncSourceProvider,
        options: &Options,
    ) -> RenderFunction {
        let result = self.try_compile_async(identity, provider, options).await;
        self.report(result)
    }
}

type SharedCompile<'e> = Shared<LocalBoxFuture<'e, TemplateResult<RenderFunction>>>;

/// State shared by the compiles of one async session.
struct AsyncSession<'e> {
    engine: &'e Engine,
    provider: &'e dyn AsyncSourceProvider,
    graph: RefCell<DependencyGraph>,
    pending: RefCell<HashMap<String, SharedCompile<'e>>>,
}

impl<'e> AsyncSession<'e> {
    fn compile(
        self: Rc<Self>,
        identity: String,
        options: Options,
    ) -> LocalBoxFuture<'e, TemplateResult<RenderFunction>> {
        async move {
            debug!(identity = identity.as_str(), "fetching template");
            let source = self
                .provider
                .fetch(&identity)
                .await
                .map_err(|err| TemplateError::from_fetch(&identity, err))?;

            let children = scan_includes(&source, &options);
            let waits: Vec<_> = children
                .iter()
                .map(|child| {
                    let edge = self.graph.borrow_mut().add_edge(&identity, child);
                    match edge {
                        Ok(()) => self.dependency(child, &options),
                        Err(err) => future::ready(Err(err)).boxed_local().shared(),
                    }
                })
                .collect();
            let results = future::join_all(waits).await;

            let mut includes = HashMap::new();
            let mut first_error = None;
            for (child, result) in children.into_iter().zip(results) {
                match result {
                    Ok(function) => {
                        includes.insert(child, function);
                    }
                    Err(err) => {
                        first_error.get_or_insert(err);
                    }
                }
            }
            if let Some(err) = first_error {
                return Err(err);
            }

            let function = self
                .engine
                .realize(Some(&identity), &source, &options, includes)?;
            Ok(self.engine.finalize(&identity, function, &options))
        }
        .boxed_local()
    }

    /// The compile of `child`: cached, already in flight, or newly started.
    fn dependency(self: &Rc<Self>, child: &str, options: &Options) -> SharedCompile<'e> {
        if let Some(hit) = self.engine.cache.get(child) {
            return future::ready(Ok(hit)).boxed_local().shared();
        }
        let mut pending = self.pending.borrow_mut();
        if let Some(existing) = pending.get(child) {
            return existing.clone();
        }
        let started = Rc::clone(self)
            .compile(child.to_string(), options.for_dependency(child))
            .shared();
        pending.insert(child.to_string(), started.clone());
        started
    }
}

fn stripped_tag_warning(template: &str, tag: &StrippedTag) -> DiagnosticMessage {
    DiagnosticMessageBuilder::warning("Custom tag stripped")
        .with_code("T-1-2")
        .problem(format!(
            "`{}` on line {} did not match any syntax rule",
            tag.text, tag.line
        ))
        .add_detail(format!("In template `{}`", template))
        .add_hint("Register a syntax rule for this tag?")
        .build()
}

fn missing_depends_warning(name: &str) -> DiagnosticMessage {
    DiagnosticMessageBuilder::warning("Missing dependency value")
        .with_code("T-5-3")
        .problem(format!("No value is set for `{}`", name))
        .add_info("The parameter is bound to null")
        .build()
}
