/*
 * syntax/rewriter.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Custom tags to primitive tags.
//!
//! Rules run in registration order, in full passes, until a pass changes
//! nothing. Whatever custom syntax is left afterwards is either an error
//! (strict) or stripped (lenient).

use std::sync::Arc;

use regex::Regex;
use shellplate_error_reporting::{line_of_offset, numbered_listing};
use tracing::{debug, warn};

use super::registry::SyntaxRegistry;
use crate::config::Options;
use crate::error::{ANONYMOUS, ErrorSite, TemplateError, TemplateResult};
use crate::shell::{Segment, segments};

/// A residual custom tag removed in lenient mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrippedTag {
    pub text: String,
    pub line: usize,
}

/// The outcome of rewriting one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub text: String,
    pub passes: usize,
    pub stripped: Vec<StrippedTag>,
}

/// Rewrite a template to primitive form.
pub fn rewrite(template: &str, registry: &SyntaxRegistry, options: &Options) -> TemplateResult<String> {
    rewrite_template(template, registry, options).map(|r| r.text)
}

/// Rewrite a template, reporting the passes taken and any stripped tags.
pub fn rewrite_template(
    template: &str,
    registry: &SyntaxRegistry,
    options: &Options,
) -> TemplateResult<Rewrite> {
    let compiled = registry
        .rules()
        .iter()
        .map(|rule| Ok((rule, rule.compile(&options.open_tag, &options.close_tag)?)))
        .collect::<TemplateResult<Vec<_>>>()?;

    let mut text = template.to_string();
    let mut passes = 0;
    while passes < options.max_rewrite_passes {
        passes += 1;
        let mut changed = false;
        for (rule, regex) in &compiled {
            if let Some(next) = rule.apply(regex, &text) {
                changed |= next != text;
                text = next;
            }
        }
        if !changed {
            break;
        }
    }
    debug!(passes, "rewrote custom syntax");

    let residual = Residual::new(&options.open_tag, &options.close_tag);
    if options.strict {
        if let Some(offset) = residual.first_offset(&text) {
            let line = line_of_offset(&text, offset);
            let snippet = residual.snippet(&text, offset);
            let site = ErrorSite {
                name: options.filename.clone().unwrap_or_else(|| ANONYMOUS.to_string()),
                source: Arc::from(text.as_str()),
                start: offset,
                end: offset + snippet.len(),
            };
            return Err(TemplateError::Syntax {
                message: format!("Unrecognized tag: {}", snippet),
                line,
                syntax: numbered_listing(&text, Some(line)),
                site: Some(site),
            });
        }
        Ok(Rewrite {
            text,
            passes,
            stripped: Vec::new(),
        })
    } else {
        let (text, stripped) = residual.strip(&text);
        for tag in &stripped {
            warn!(line = tag.line, tag = %tag.text, "stripped unrecognized custom tag");
        }
        Ok(Rewrite {
            text,
            passes,
            stripped,
        })
    }
}

/// Finds custom tags left in the literal text of a rewritten template.
struct Residual {
    tag: Regex,
    open: String,
}

impl Residual {
    fn new(open: &str, close: &str) -> Self {
        let tag = Regex::new(&format!(
            "(?s){}.*?{}",
            regex::escape(open),
            regex::escape(close)
        ))
        .expect("escaped delimiters form a valid regex");
        Self {
            tag,
            open: open.to_string(),
        }
    }

    /// Offset of the first residual tag or dangling open delimiter.
    fn first_offset(&self, text: &str) -> Option<usize> {
        literal_ranges(text)
            .into_iter()
            .find_map(|range| text[range.clone()].find(&self.open).map(|rel| range.start + rel))
    }

    fn snippet<'t>(&self, text: &'t str, offset: usize) -> &'t str {
        let rest = &text[offset..];
        let end = self
            .tag
            .find(rest)
            .filter(|m| m.start() == 0)
            .map_or_else(|| rest.find('\n').unwrap_or(rest.len()), |m| m.end());
        &rest[..end]
    }

    fn strip(&self, text: &str) -> (String, Vec<StrippedTag>) {
        let mut out = String::with_capacity(text.len());
        let mut stripped = Vec::new();
        for segment in segments(text) {
            match segment {
                Segment::Tag(range) => out.push_str(&text[range]),
                Segment::Literal(range) => {
                    let literal = &text[range.clone()];
                    let mut last = 0;
                    for m in self.tag.find_iter(literal) {
                        out.push_str(&literal[last..m.start()]);
                        stripped.push(StrippedTag {
                            text: m.as_str().to_string(),
                            line: line_of_offset(text, range.start + m.start()),
                        });
                        last = m.end();
                    }
                    out.push_str(&literal[last..]);
                }
            }
        }
        (out, stripped)
    }
}

fn literal_ranges(text: &str) -> Vec<std::ops::Range<usize>> {
    segments(text)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Literal(range) => Some(range),
            Segment::Tag(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::SyntaxRule;
    use pretty_assertions::assert_eq;

    fn strict(text: &str) -> TemplateResult<String> {
        rewrite(text, &SyntaxRegistry::with_defaults(), &Options::default())
    }

    fn lenient(text: &str) -> Rewrite {
        rewrite_template(
            text,
            &SyntaxRegistry::with_defaults(),
            &Options::default().with_strict(false),
        )
        .unwrap()
    }

    #[test]
    fn test_default_syntax() {
        assert_eq!(
            strict("{{if user}}<b>{{= user.name}}</b>{{else}}anon{{/if}}").unwrap(),
            "<% if (user) { %><b><%= user.name %></b><% } else { %>anon<% } %>"
        );
    }

    #[test]
    fn test_no_tags_is_identity() {
        let text = "line 1\n\tline 2  \r\n}} lone close";
        assert_eq!(strict(text).unwrap(), text);
    }

    #[test]
    fn test_strict_reports_line() {
        let err = strict("a\nb\n{{unknown thing}}\nc").unwrap_err();
        match err {
            TemplateError::Syntax {
                message,
                line,
                syntax,
                site,
            } => {
                assert_eq!(line, 3);
                assert_eq!(message, "Unrecognized tag: {{unknown thing}}");
                assert!(syntax.contains("> 3 | {{unknown thing}}"));
                let site = site.expect("strict errors carry a site");
                assert_eq!(site.name, "<anonymous>");
                assert_eq!(&site.source[site.start..site.end], "{{unknown thing}}");
            }
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn test_strict_reports_dangling_open() {
        let err = strict("ok\n{{= oops").unwrap_err();
        assert!(matches!(err, TemplateError::Syntax { line: 2, .. }));
    }

    #[test]
    fn test_tags_inside_primitive_tags_are_not_residual() {
        let text = "<% var s = \"{{literal}}\"; %>";
        assert_eq!(strict(text).unwrap(), text);
    }

    #[test]
    fn test_lenient_strips_residual_tags() {
        let rewrite = lenient("a {{nope}} b\n{{= x}} {{also nope}}");
        assert_eq!(rewrite.text, "a  b\n<%= x %> ");
        assert_eq!(
            rewrite.stripped,
            vec![
                StrippedTag {
                    text: "{{nope}}".into(),
                    line: 1
                },
                StrippedTag {
                    text: "{{also nope}}".into(),
                    line: 2
                },
            ]
        );
    }

    #[test]
    fn test_custom_delimiters() {
        let options = Options::default().with_delimiters("[[", "]]");
        let text = rewrite("[[= a]] {{= b}}", &SyntaxRegistry::with_defaults(), &options).unwrap();
        assert_eq!(text, "<%= a %> {{= b}}");
    }

    #[test]
    fn test_rules_reach_fixed_point_across_passes() {
        // `card` expands into an `echo` tag that an earlier rule handles on
        // the next pass.
        let mut registry = SyntaxRegistry::with_defaults();
        registry.register(
            SyntaxRule::regex(
                "card",
                Regex::new(r"\{\{card\s+(\w+)\}\}").unwrap(),
                crate::syntax::ShellTemplate::generator(|caps| {
                    format!("<div>{{{{= {}.title}}}}</div>", &caps[1])
                }),
            )
            .unwrap(),
        );
        let rewrite = rewrite_template("{{card post}}", &registry, &Options::default()).unwrap();
        assert_eq!(rewrite.text, "<div><%= post.title %></div>");
        assert_eq!(rewrite.passes, 3);
    }

    #[test]
    fn test_pass_limit_is_respected() {
        let mut registry = SyntaxRegistry::new();
        registry.register(SyntaxRule::fragment("grow", "x", "<% %>{{x}}").unwrap());
        let options = Options {
            max_rewrite_passes: 3,
            strict: false,
            ..Options::default()
        };
        let rewrite = rewrite_template("{{x}}", &registry, &options).unwrap();
        assert_eq!(rewrite.passes, 3);
        assert_eq!(rewrite.text, "<% %><% %><% %>");
    }
}
