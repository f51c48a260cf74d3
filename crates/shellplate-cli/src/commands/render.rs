/*
 * render.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Render command implementation
 */

//! Render command implementation.
//!
//! Compiles a template file and everything it includes, then renders it
//! with the data file. Includes are fetched through the async resolver,
//! driven to completion with `pollster`.
//!
//! Template errors are reported through `tracing` and produce an empty
//! render, which matches how the library behaves for callers. With
//! `--rethrow` the first error fails the command instead.

use std::io::Write;

use anyhow::Result;
use tracing::{debug, info};

use shellplate::{Blocking, Engine, EventKind, TemplateError, TracingListener};

use crate::input::{CompileFlags, TemplateInput, describe, load_data};

/// Arguments for the render command
#[derive(Debug)]
pub struct RenderArgs {
    /// Template file
    pub template: String,
    /// JSON data file
    pub data: Option<String>,
    pub flags: CompileFlags,
    /// Fail on template errors
    pub rethrow: bool,
}

/// Execute the render command
pub fn execute(args: RenderArgs) -> Result<()> {
    let output = render(&args)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    stdout.flush()?;
    Ok(())
}

pub(crate) fn render(args: &RenderArgs) -> Result<String> {
    let input = TemplateInput::locate(&args.template, args.flags.root.as_deref())?;
    let options = args.flags.options(&input)?;
    let data = load_data(args.data.as_deref())?;

    let engine = Engine::new();
    engine.on(EventKind::Error, TracingListener);
    engine.on(EventKind::Warning, TracingListener);

    info!(
        identity = %input.identity,
        root = %input.root.display(),
        "Rendering template"
    );
    let provider = Blocking(input.provider());

    if !args.rethrow {
        let function = pollster::block_on(engine.compile_async(&input.identity, &provider, &options));
        return Ok(function.render(&data));
    }

    let function =
        pollster::block_on(engine.try_compile_async(&input.identity, &provider, &options))
            .map_err(rethrown)?;
    debug!(cached = engine.cache().len(), "Compiled template and includes");
    function.try_render(&data).map_err(rethrown)
}

fn rethrown(err: TemplateError) -> anyhow::Error {
    anyhow::anyhow!("{}", describe(&err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    fn args(template: &Path, data: Option<&Path>, rethrow: bool) -> RenderArgs {
        RenderArgs {
            template: template.to_str().unwrap().to_string(),
            data: data.map(|p| p.to_str().unwrap().to_string()),
            flags: CompileFlags::default(),
            rethrow,
        }
    }

    #[test]
    fn test_render_with_includes_and_data() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("partials")).unwrap();
        std::fs::write(
            dir.path().join("page.html"),
            "<h1>{{= title}}</h1>{{# include('partials/list', {items: items}) }}",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("partials/list.html"),
            "{{each items as item}}<i>{{= item}}</i>{{/each}}",
        )
        .unwrap();
        let data = dir.path().join("data.json");
        std::fs::write(&data, r#"{"title": "A & B", "items": [1, 2]}"#).unwrap();

        let output = render(&args(&dir.path().join("page.html"), Some(&data), false)).unwrap();
        assert_eq!(output, "<h1>A &amp; B</h1><i>1</i><i>2</i>");
    }

    #[test]
    fn test_template_errors_render_empty_unless_rethrown() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("page.html");
        std::fs::write(&page, "{{# include('missing') }}").unwrap();

        assert_eq!(render(&args(&page, None, false)).unwrap(), "");

        let err = render(&args(&page, None, true)).unwrap_err();
        assert!(err.to_string().contains("T-4-2"));
    }

    #[test]
    fn test_rethrown_render_error_shows_source_line() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("page.html");
        std::fs::write(&page, "<p>\n{{= user.name}}\n</p>").unwrap();

        let err = render(&args(&page, None, true)).unwrap_err().to_string();
        assert!(err.contains("[T-3-1] Template render error"));
        assert!(err.contains("page.html"));
        assert!(err.contains("{{= user.name}}"));
    }

    #[test]
    fn test_lenient_flag() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("page.txt");
        std::fs::write(&page, "a{{unknown}}b").unwrap();

        let mut lenient = args(&page, None, true);
        lenient.flags.lenient = true;
        assert_eq!(render(&lenient).unwrap(), "ab");
        assert!(render(&args(&page, None, true)).is_err());
    }
}
