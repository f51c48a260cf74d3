/*
 * shell.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Shell command: print the procedure a template compiles to.

use anyhow::Result;
use shellplate::{CompiledShell, Engine, EventKind, TracingListener};

use crate::input::{CompileFlags, TemplateInput, describe};

pub fn execute(template: &str, flags: &CompileFlags) -> Result<()> {
    let shell = compile_shell(template, flags)?;
    print!("{}", shell);
    Ok(())
}

pub(crate) fn compile_shell(template: &str, flags: &CompileFlags) -> Result<CompiledShell> {
    let input = TemplateInput::locate(template, flags.root.as_deref())?;
    let options = flags.options(&input)?;
    let source = input.read()?;

    let engine = Engine::new();
    engine.on(EventKind::Warning, TracingListener);
    engine
        .shell(&source, &options)
        .map_err(|err| anyhow::anyhow!("{}", describe(&err)))
}
