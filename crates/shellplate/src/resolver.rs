/*
 * resolver.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template sources and include dependencies.
//!
//! A [`SourceProvider`] turns a template identity into its text. Before a
//! template is finalized, [`scan_includes`] finds the templates it includes
//! so they can be compiled first, and a [`DependencyGraph`] rejects include
//! cycles.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Options;
use crate::error::{FetchError, TemplateError, TemplateResult};
use crate::shell::{CLOSE_TAG, OPEN_TAG};

/// Loads template text by identity.
pub trait SourceProvider {
    fn fetch(&self, identity: &str) -> Result<String, FetchError>;
}

impl<P: SourceProvider + ?Sized> SourceProvider for &P {
    fn fetch(&self, identity: &str) -> Result<String, FetchError> {
        (**self).fetch(identity)
    }
}

impl<P: SourceProvider + ?Sized> SourceProvider for Box<P> {
    fn fetch(&self, identity: &str) -> Result<String, FetchError> {
        (**self).fetch(identity)
    }
}

/// Loads template text asynchronously, e.g. over the network.
#[async_trait(?Send)]
pub trait AsyncSourceProvider {
    async fn fetch(&self, identity: &str) -> Result<String, FetchError>;
}

/// Adapts a synchronous provider to [`AsyncSourceProvider`].
#[derive(Debug, Clone, Default)]
pub struct Blocking<P>(pub P);

#[async_trait(?Send)]
impl<P: SourceProvider> AsyncSourceProvider for Blocking<P> {
    async fn fetch(&self, identity: &str) -> Result<String, FetchError> {
        self.0.fetch(identity)
    }
}

/// Provider that knows no templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProvider;

impl SourceProvider for NullProvider {
    fn fetch(&self, _identity: &str) -> Result<String, FetchError> {
        Err(FetchError::NotFound)
    }
}

/// Provider backed by an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    templates: HashMap<String, String>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, identity: impl Into<String>, source: impl Into<String>) -> &mut Self {
        self.templates.insert(identity.into(), source.into());
        self
    }

    pub fn with_templates(
        templates: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        Self {
            templates: templates
                .into_iter()
                .map(|(identity, source)| (identity.into(), source.into()))
                .collect(),
        }
    }
}

impl SourceProvider for MemoryProvider {
    fn fetch(&self, identity: &str) -> Result<String, FetchError> {
        self.templates
            .get(identity)
            .cloned()
            .ok_or(FetchError::NotFound)
    }
}

/// Provider that reads templates from a directory.
///
/// Identities are paths relative to `root`. An identity without an
/// extension gets `default_extension` appended, when one is set.
#[derive(Debug, Clone)]
pub struct FileSystemProvider {
    root: PathBuf,
    default_extension: Option<String>,
}

impl FileSystemProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            default_extension: None,
        }
    }

    pub fn with_default_extension(mut self, extension: impl Into<String>) -> Self {
        let extension = extension.into();
        self.default_extension = Some(extension.trim_start_matches('.').to_string());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The file an identity maps to.
    pub fn resolve(&self, identity: &str) -> PathBuf {
        let mut path = self.root.join(identity);
        if path.extension().is_none() {
            if let Some(extension) = &self.default_extension {
                path.set_extension(extension);
            }
        }
        path
    }
}

impl SourceProvider for FileSystemProvider {
    fn fetch(&self, identity: &str) -> Result<String, FetchError> {
        let path = self.resolve(identity);
        tracing::debug!(identity, path = %path.display(), "reading template");
        Ok(std::fs::read_to_string(path)?)
    }
}

/// Looks up templates embedded in a host document.
pub trait InlineLocator {
    fn lookup(&self, identity: &str) -> Option<String>;
}

impl<F> InlineLocator for F
where
    F: Fn(&str) -> Option<String>,
{
    fn lookup(&self, identity: &str) -> Option<String> {
        self(identity)
    }
}

/// Provider over an [`InlineLocator`]; a failed lookup is "not found".
#[derive(Debug, Clone, Default)]
pub struct InlineProvider<L>(pub L);

impl<L: InlineLocator> SourceProvider for InlineProvider<L> {
    fn fetch(&self, identity: &str) -> Result<String, FetchError> {
        self.0.lookup(identity).ok_or(FetchError::NotFound)
    }
}

static INCLUDE_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"include\s*\(\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid include pattern")
});

static PRIMITIVE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        "(?s){}(.*?){}",
        regex::escape(OPEN_TAG),
        regex::escape(CLOSE_TAG)
    ))
    .expect("valid primitive tag pattern")
});

/// Identities included with a literal name, in order of first appearance.
///
/// Only the inside of tags is searched: custom tags with the delimiters in
/// `options` (unless `no_syntax` is set) and primitive tags. Includes with
/// a computed name are resolved at render time instead.
pub fn scan_includes(source: &str, options: &Options) -> Vec<String> {
    let mut hits: Vec<(usize, String)> = Vec::new();
    for caps in PRIMITIVE_TAG.captures_iter(source) {
        if let Some(inner) = caps.get(1) {
            scan_tag(inner, &mut hits);
        }
    }
    if !options.no_syntax {
        let custom = Regex::new(&format!(
            "(?s){}(.*?){}",
            regex::escape(&options.open_tag),
            regex::escape(&options.close_tag)
        ));
        if let Ok(custom) = custom {
            for caps in custom.captures_iter(source) {
                if let Some(inner) = caps.get(1) {
                    scan_tag(inner, &mut hits);
                }
            }
        }
    }

    hits.sort_by_key(|(offset, _)| *offset);
    let mut identities: Vec<String> = Vec::new();
    for (_, identity) in hits {
        if !identities.contains(&identity) {
            identities.push(identity);
        }
    }
    identities
}

fn scan_tag(inner: regex::Match<'_>, hits: &mut Vec<(usize, String)>) {
    for caps in INCLUDE_CALL.captures_iter(inner.as_str()) {
        if let Some(id) = caps.get(1).or_else(|| caps.get(2)) {
            if !id.as_str().is_empty() {
                hits.push((inner.start() + id.start(), id.as_str().to_string()));
            }
        }
    }
}

/// Include edges discovered during one compile session.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `parent` includes `child`.
    ///
    /// Fails with [`TemplateError::Cycle`] when `child` already reaches
    /// `parent`; the graph is left unchanged in that case.
    pub fn add_edge(&mut self, parent: &str, child: &str) -> TemplateResult<()> {
        if let Some(path) = self.path(child, parent) {
            let mut chain = vec![parent.to_string()];
            chain.extend(path);
            return Err(TemplateError::Cycle { chain });
        }
        let children = self.edges.entry(parent.to_string()).or_default();
        if !children.iter().any(|c| c == child) {
            children.push(child.to_string());
        }
        Ok(())
    }

    pub fn children(&self, identity: &str) -> &[String] {
        self.edges.get(identity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// A path of identities from `from` to `to`, both included.
    pub fn path(&self, from: &str, to: &str) -> Option<Vec<String>> {
        let mut path = vec![from.to_string()];
        let mut visited = vec![from.to_string()];
        if self.walk(from, to, &mut path, &mut visited) {
            Some(path)
        } else {
            None
        }
    }

    fn walk(&self, node: &str, to: &str, path: &mut Vec<String>, visited: &mut Vec<String>) -> bool {
        if node == to {
            return true;
        }
        for child in self.children(node) {
            if visited.contains(child) {
                continue;
            }
            visited.push(child.clone());
            path.push(child.clone());
            if self.walk(child, to, path, visited) {
                return true;
            }
            path.pop();
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scan_includes_inside_tags_only() {
        let source = concat!(
            "include('not-a-tag')\n",
            "{{# include('header') }}\n",
            "<%# include(\"footer\", data) %>\n",
            "{{# include('header') }}\n",
            "<%# include(name) %>",
        );
        assert_eq!(
            scan_includes(source, &Options::default()),
            vec!["header".to_string(), "footer".to_string()]
        );
    }

    #[test]
    fn test_scan_includes_respects_delimiters_and_no_syntax() {
        let source = "[[# include('a') ]] {{# include('b') }} <%# include('c') %>";
        let options = Options::default().with_delimiters("[[", "]]");
        assert_eq!(
            scan_includes(source, &options),
            vec!["a".to_string(), "c".to_string()]
        );
        let options = Options::default().with_no_syntax(true);
        assert_eq!(scan_includes(source, &options), vec!["c".to_string()]);
    }

    #[test]
    fn test_cycle_chain() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a", "b").unwrap();
        graph.add_edge("b", "c").unwrap();
        let err = graph.add_edge("c", "a").unwrap_err();
        assert_eq!(
            err,
            TemplateError::Cycle {
                chain: vec!["c".into(), "a".into(), "b".into(), "c".into()]
            }
        );
        assert_eq!(err.to_string(), "Include cycle detected: c -> a -> b -> c");
        assert!(graph.children("c").is_empty());
    }

    #[test]
    fn test_self_include_is_a_cycle() {
        let mut graph = DependencyGraph::new();
        assert_eq!(
            graph.add_edge("a", "a"),
            Err(TemplateError::Cycle {
                chain: vec!["a".into(), "a".into()]
            })
        );
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a", "b").unwrap();
        graph.add_edge("a", "c").unwrap();
        graph.add_edge("b", "d").unwrap();
        graph.add_edge("c", "d").unwrap();
        assert_eq!(graph.children("a"), ["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_memory_and_inline_providers() {
        let provider = MemoryProvider::with_templates([("a", "A")]);
        assert_eq!(provider.fetch("a"), Ok("A".to_string()));
        assert_eq!(provider.fetch("b"), Err(FetchError::NotFound));

        let inline = InlineProvider(|id: &str| (id == "tpl").then(|| "inline".to_string()));
        assert_eq!(inline.fetch("tpl"), Ok("inline".to_string()));
        assert_eq!(inline.fetch("other"), Err(FetchError::NotFound));
        assert_eq!(NullProvider.fetch("x"), Err(FetchError::NotFound));
    }

    #[test]
    fn test_blocking_adapter() {
        let provider = Blocking(MemoryProvider::with_templates([("a", "A")]));
        assert_eq!(pollster::block_on(provider.fetch("a")), Ok("A".to_string()));
    }

    #[test]
    fn test_filesystem_default_extension() {
        let provider = FileSystemProvider::new("/templates").with_default_extension(".html");
        assert_eq!(provider.resolve("page"), PathBuf::from("/templates/page.html"));
        assert_eq!(provider.resolve("style.css"), PathBuf::from("/templates/style.css"));
    }
}
