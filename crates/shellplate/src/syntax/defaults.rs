/*
 * syntax/defaults.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The default rule set every engine starts from.

use regex::Captures;

use super::registry::{ShellTemplate, SyntaxRule};

/// Replacement of a default rule.
#[derive(Debug, Clone, Copy)]
pub enum DefaultShell {
    Static(&'static str),
    Generator(fn(&Captures<'_>) -> String),
}

/// A default rule: name, tag fragment (without delimiters) and shell.
#[derive(Debug, Clone, Copy)]
pub struct DefaultRule {
    pub name: &'static str,
    pub fragment: &'static str,
    pub shell: DefaultShell,
}

pub const DEFAULT_RULES: &[DefaultRule] = &[
    DefaultRule {
        name: "comment",
        fragment: r"!--.*?--",
        shell: DefaultShell::Static(""),
    },
    DefaultRule {
        name: "escaped",
        fragment: r"!#\s*(.+?)",
        shell: DefaultShell::Static("<%!# ${1} %>"),
    },
    DefaultRule {
        name: "raw",
        fragment: r"#\s*(.+?)",
        shell: DefaultShell::Static("<%# ${1} %>"),
    },
    DefaultRule {
        name: "echo",
        fragment: r"=\s*(.+?)",
        shell: DefaultShell::Static("<%= ${1} %>"),
    },
    DefaultRule {
        name: "elseif",
        fragment: r"else\s+if\s+(.+?)",
        shell: DefaultShell::Static("<% } else if (${1}) { %>"),
    },
    DefaultRule {
        name: "else",
        fragment: r"else",
        shell: DefaultShell::Static("<% } else { %>"),
    },
    DefaultRule {
        name: "if",
        fragment: r"if\s+(.+?)",
        shell: DefaultShell::Static("<% if (${1}) { %>"),
    },
    DefaultRule {
        name: "ifclose",
        fragment: r"/if",
        shell: DefaultShell::Static("<% } %>"),
    },
    DefaultRule {
        name: "each",
        fragment: r"each\s+(.+?)\s+as\s+([A-Za-z_$][\w$]*)(?:\s*,\s*([A-Za-z_$][\w$]*))?",
        shell: DefaultShell::Generator(each_shell),
    },
    DefaultRule {
        name: "eachclose",
        fragment: r"/each",
        shell: DefaultShell::Static("<% } %>"),
    },
    DefaultRule {
        name: "set",
        fragment: r"set\s+([A-Za-z_$][\w$]*)\s*=\s*(.+?)",
        shell: DefaultShell::Static("<% var ${1} = ${2}; %>"),
    },
];

fn each_shell(caps: &Captures<'_>) -> String {
    let list = caps.get(1).map_or("", |m| m.as_str());
    let item = caps.get(2).map_or("", |m| m.as_str());
    match caps.get(3) {
        Some(index) => format!("<% for ({}, {} of {}) {{ %>", item, index.as_str(), list),
        None => format!("<% for ({} of {}) {{ %>", item, list),
    }
}

/// Fresh rules built from [`DEFAULT_RULES`].
pub fn default_rules() -> Vec<SyntaxRule> {
    DEFAULT_RULES
        .iter()
        .map(|rule| {
            let shell = match rule.shell {
                DefaultShell::Static(s) => ShellTemplate::Static(s.to_string()),
                DefaultShell::Generator(f) => ShellTemplate::generator(f),
            };
            SyntaxRule::fragment(rule.name, rule.fragment, shell).expect("default rules are valid")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn rewrite_once(name: &str, text: &str) -> Option<String> {
        let rule = default_rules().into_iter().find(|r| r.name() == name).unwrap();
        let regex = rule.compile("{{", "}}").unwrap();
        rule.apply(&regex, text)
    }

    #[test]
    fn test_default_rule_order() {
        let names: Vec<&str> = DEFAULT_RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "comment",
                "escaped",
                "raw",
                "echo",
                "elseif",
                "else",
                "if",
                "ifclose",
                "each",
                "eachclose",
                "set"
            ]
        );
        assert_eq!(default_rules().len(), DEFAULT_RULES.len());
    }

    #[test]
    fn test_primitive_forms() {
        assert_eq!(rewrite_once("comment", "a{{!-- x\n y --}}b").as_deref(), Some("ab"));
        assert_eq!(rewrite_once("escaped", "{{!# x }}").as_deref(), Some("<%!# x %>"));
        assert_eq!(rewrite_once("raw", "{{#include(\"a\")}}").as_deref(), Some("<%# include(\"a\") %>"));
        assert_eq!(rewrite_once("echo", "{{= user.name }}").as_deref(), Some("<%= user.name %>"));
        assert_eq!(
            rewrite_once("elseif", "{{else if a > 1}}").as_deref(),
            Some("<% } else if (a > 1) { %>")
        );
        assert_eq!(rewrite_once("else", "{{else}}").as_deref(), Some("<% } else { %>"));
        assert_eq!(rewrite_once("if", "{{if ok}}").as_deref(), Some("<% if (ok) { %>"));
        assert_eq!(rewrite_once("ifclose", "{{/if}}").as_deref(), Some("<% } %>"));
        assert_eq!(rewrite_once("eachclose", "{{/each}}").as_deref(), Some("<% } %>"));
        assert_eq!(
            rewrite_once("set", "{{set total = a + b}}").as_deref(),
            Some("<% var total = a + b; %>")
        );
    }

    #[test]
    fn test_each_with_and_without_index() {
        assert_eq!(
            rewrite_once("each", "{{each list as item, i}}").as_deref(),
            Some("<% for (item, i of list) { %>")
        );
        assert_eq!(
            rewrite_once("each", "{{each user.tags as tag}}").as_deref(),
            Some("<% for (tag of user.tags) { %>")
        );
    }

    #[test]
    fn test_else_does_not_match_else_if() {
        assert_eq!(rewrite_once("else", "{{else if x}}"), None);
    }
}
