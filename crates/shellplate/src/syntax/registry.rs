/*
 * syntax/registry.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Ordered custom syntax rules and block helpers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::{TemplateError, TemplateResult};
use crate::helpers::BlockHelper;
use crate::shell::{CLOSE_TAG, OPEN_TAG};

static BLOCK_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][\w$]*$").expect("valid regex"));

/// How a rule finds its custom tags.
#[derive(Debug, Clone)]
pub enum RuleMatcher {
    /// Regex source for the inside of a tag; wrapped with the active
    /// delimiters at rewrite time.
    Fragment(String),
    /// A complete regex, delimiters included.
    Regex(Regex),
}

type ShellGenerator = dyn Fn(&Captures<'_>) -> String + Send + Sync;

/// What a matched custom tag is replaced with.
#[derive(Clone)]
pub enum ShellTemplate {
    /// Regex replacement text (`$1`, `${name}`).
    Static(String),
    Generator(Arc<ShellGenerator>),
}

impl ShellTemplate {
    pub fn generator<F>(f: F) -> Self
    where
        F: Fn(&Captures<'_>) -> String + Send + Sync + 'static,
    {
        ShellTemplate::Generator(Arc::new(f))
    }
}

impl From<&str> for ShellTemplate {
    fn from(s: &str) -> Self {
        ShellTemplate::Static(s.to_string())
    }
}

impl From<String> for ShellTemplate {
    fn from(s: String) -> Self {
        ShellTemplate::Static(s)
    }
}

impl fmt::Debug for ShellTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellTemplate::Static(s) => f.debug_tuple("Static").field(s).finish(),
            ShellTemplate::Generator(_) => f.write_str("Generator"),
        }
    }
}

/// A named custom syntax rule.
#[derive(Debug, Clone)]
pub struct SyntaxRule {
    name: String,
    matcher: RuleMatcher,
    shell: ShellTemplate,
}

impl SyntaxRule {
    /// A rule matching `open \s* fragment \s* close`.
    pub fn fragment(
        name: impl Into<String>,
        fragment: impl Into<String>,
        shell: impl Into<ShellTemplate>,
    ) -> TemplateResult<Self> {
        let rule = Self {
            name: name.into(),
            matcher: RuleMatcher::Fragment(fragment.into()),
            shell: shell.into(),
        };
        rule.validate()?;
        Ok(rule)
    }

    /// A rule with a caller-supplied regex.
    pub fn regex(name: impl Into<String>, regex: Regex, shell: impl Into<ShellTemplate>) -> TemplateResult<Self> {
        let rule = Self {
            name: name.into(),
            matcher: RuleMatcher::Regex(regex),
            shell: shell.into(),
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matcher(&self) -> &RuleMatcher {
        &self.matcher
    }

    pub fn shell(&self) -> &ShellTemplate {
        &self.shell
    }

    /// The regex for this rule under the given delimiters.
    pub fn compile(&self, open: &str, close: &str) -> TemplateResult<Regex> {
        match &self.matcher {
            RuleMatcher::Fragment(fragment) => Regex::new(&format!(
                r"{}\s*(?s:{})\s*{}",
                regex::escape(open),
                fragment,
                regex::escape(close)
            ))
            .map_err(|e| self.invalid(e.to_string())),
            RuleMatcher::Regex(regex) => Ok(regex.clone()),
        }
    }

    /// Replace every match in `text`; `None` when nothing matched.
    pub(crate) fn apply(&self, regex: &Regex, text: &str) -> Option<String> {
        if !regex.is_match(text) {
            return None;
        }
        let replaced = match &self.shell {
            ShellTemplate::Static(template) => regex.replace_all(text, template.as_str()),
            ShellTemplate::Generator(generate) => regex.replace_all(text, |caps: &Captures<'_>| generate(caps)),
        };
        Some(replaced.into_owned())
    }

    fn validate(&self) -> TemplateResult<()> {
        if self.name.is_empty() {
            return Err(self.invalid("rule name must not be empty"));
        }
        if let ShellTemplate::Static(template) = &self.shell {
            let primitive = template.contains(OPEN_TAG) && template.contains(CLOSE_TAG);
            if !template.is_empty() && !primitive {
                return Err(self.invalid(format!(
                    "shell must contain a primitive tag ({} ... {}) or be empty",
                    OPEN_TAG, CLOSE_TAG
                )));
            }
        }
        self.compile("{{", "}}")?;
        Ok(())
    }

    fn invalid(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::InvalidRule {
            name: self.name.clone(),
            message: message.into(),
        }
    }
}

/// The custom syntax of one engine: ordered rules plus block helpers.
///
/// Rules apply in registration order. Replacing a rule keeps its position.
#[derive(Debug, Clone, Default)]
pub struct SyntaxRegistry {
    rules: Vec<SyntaxRule>,
    blocks: HashMap<String, BlockHelper>,
}

impl SyntaxRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry seeded with the default rule set.
    pub fn with_defaults() -> Self {
        Self {
            rules: super::defaults::default_rules(),
            blocks: HashMap::new(),
        }
    }

    /// Add a rule, or replace the rule with the same name in place.
    pub fn register(&mut self, rule: SyntaxRule) {
        match self.rules.iter_mut().find(|r| r.name == rule.name) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    /// Register several rules in order.
    pub fn register_many<I>(&mut self, rules: I)
    where
        I: IntoIterator<Item = SyntaxRule>,
    {
        for rule in rules {
            self.register(rule);
        }
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.name != name);
        self.rules.len() != before
    }

    pub fn get(&self, name: &str) -> Option<&SyntaxRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    pub fn rules(&self) -> &[SyntaxRule] {
        &self.rules
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Register a block helper with its `<name>open` / `<name>close` rules.
    ///
    /// `{{name a, b}}` becomes `<% name(a, b, function(it) { %>` and
    /// `{{/name}}` becomes `<% }) %>`.
    pub fn register_block(&mut self, name: &str, handler: BlockHelper) -> TemplateResult<()> {
        if !BLOCK_NAME.is_match(name) {
            return Err(TemplateError::InvalidRule {
                name: name.to_string(),
                message: "block names must be identifiers".to_string(),
            });
        }
        let callee = name.to_string();
        let open = SyntaxRule::fragment(
            format!("{}open", name),
            format!(r"{}(?:\s+(.+?))?", regex::escape(name)),
            ShellTemplate::generator(move |caps| match caps.get(1) {
                Some(args) if !args.as_str().trim().is_empty() => {
                    format!("<% {}({}, function(it) {{ %>", callee, args.as_str().trim())
                }
                _ => format!("<% {}(function(it) {{ %>", callee),
            }),
        )?;
        let close = SyntaxRule::fragment(format!("{}close", name), format!("/{}", regex::escape(name)), "<% }) %>")?;
        self.register(open);
        self.register(close);
        self.blocks.insert(name.to_string(), handler);
        Ok(())
    }

    /// Remove a block helper and both of its rules.
    pub fn unregister_block(&mut self, name: &str) -> bool {
        let removed = self.blocks.remove(name).is_some();
        if removed {
            self.unregister(&format!("{}open", name));
            self.unregister(&format!("{}close", name));
        }
        removed
    }

    pub fn block(&self, name: &str) -> Option<&BlockHelper> {
        self.blocks.get(name)
    }

    pub fn has_block(&self, name: &str) -> bool {
        self.blocks.contains_key(name)
    }

    /// A copy of the block handlers, for a render scope.
    pub fn block_snapshot(&self) -> HashMap<String, BlockHelper> {
        self.blocks.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_static_shell_must_be_primitive() {
        let err = SyntaxRule::fragment("bad", "bad", "plain text").unwrap_err();
        assert!(matches!(err, TemplateError::InvalidRule { .. }));
        assert!(SyntaxRule::fragment("strip", "strip", "").is_ok());
    }

    #[test]
    fn test_invalid_fragment_is_rejected() {
        let err = SyntaxRule::fragment("bad", "(unclosed", "<% x %>").unwrap_err();
        assert!(matches!(err, TemplateError::InvalidRule { name, .. } if name == "bad"));
    }

    #[test]
    fn test_register_replaces_in_place() {
        let mut registry = SyntaxRegistry::new();
        registry.register(SyntaxRule::fragment("a", "a", "<% a %>").unwrap());
        registry.register(SyntaxRule::fragment("b", "b", "<% b %>").unwrap());
        registry.register(SyntaxRule::fragment("a", "aa", "<% aa %>").unwrap());
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(matches!(
            registry.get("a").unwrap().matcher(),
            RuleMatcher::Fragment(f) if f == "aa"
        ));
    }

    #[test]
    fn test_unregister() {
        let mut registry = SyntaxRegistry::with_defaults();
        let count = registry.len();
        assert!(registry.unregister("set"));
        assert!(!registry.unregister("set"));
        assert_eq!(registry.len(), count - 1);
    }

    #[test]
    fn test_block_rules() {
        let mut registry = SyntaxRegistry::new();
        registry
            .register_block("bold", BlockHelper::new(|_| Ok(())))
            .unwrap();
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["boldopen", "boldclose"]
        );

        let open = registry.get("boldopen").unwrap();
        let regex = open.compile("{{", "}}").unwrap();
        assert_eq!(
            open.apply(&regex, "{{bold a, 2}}").as_deref(),
            Some("<% bold(a, 2, function(it) { %>")
        );
        assert_eq!(
            open.apply(&regex, "{{ bold }}").as_deref(),
            Some("<% bold(function(it) { %>")
        );
        assert_eq!(open.apply(&regex, "{{bolder}}"), None);

        assert!(registry.unregister_block("bold"));
        assert!(registry.is_empty());
        assert!(!registry.has_block("bold"));
    }

    #[test]
    fn test_block_name_must_be_identifier() {
        let mut registry = SyntaxRegistry::new();
        assert!(
            registry
                .register_block("my-block", BlockHelper::new(|_| Ok(())))
                .is_err()
        );
    }
}
