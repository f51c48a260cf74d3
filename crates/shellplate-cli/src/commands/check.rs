/*
 * check.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Check command: compile a template and its includes in strict mode and
//! list every error and warning raised on the way.

use anyhow::Result;
use tracing::info;

use shellplate::{CollectingListener, Engine, EventKind};
use shellplate_error_reporting::DiagnosticMessage;

use crate::input::{CompileFlags, TemplateInput};

pub fn execute(template: &str, flags: &CompileFlags, json: bool) -> Result<()> {
    let collected = check(template, flags)?;
    let diagnostics = collected.diagnostics();
    if json {
        let list: Vec<_> = diagnostics.iter().map(DiagnosticMessage::to_json).collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else {
        for text in collected.texts() {
            eprintln!("{}\n", text.trim_end());
        }
    }

    if !diagnostics.is_empty() {
        anyhow::bail!("{} problem(s) found in {}", diagnostics.len(), template);
    }
    info!("No problems found in {}", template);
    Ok(())
}

pub(crate) fn check(template: &str, flags: &CompileFlags) -> Result<CollectingListener> {
    let input = TemplateInput::locate(template, flags.root.as_deref())?;
    let options = flags.options(&input)?.with_strict(true);

    let engine = Engine::new();
    let collected = CollectingListener::new();
    engine.on(EventKind::Error, collected.clone());
    engine.on(EventKind::Warning, collected.clone());

    engine.compile(&input.identity, &input.provider(), &options);
    Ok(collected)
}
