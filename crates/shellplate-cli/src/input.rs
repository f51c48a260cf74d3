/*
 * input.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Locating template files and turning CLI flags into compile options.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use shellplate::{FileSystemProvider, Options, TemplateError};

/// Flags shared by every command that compiles a template.
#[derive(Args, Debug, Clone, Default)]
pub struct CompileFlags {
    /// JSON file with compile options (camelCase keys)
    #[arg(short = 'c', long)]
    pub config: Option<String>,

    /// Directory includes resolve from (default: the template's directory)
    #[arg(long)]
    pub root: Option<String>,

    /// Do not HTML-escape ambient echoes
    #[arg(long)]
    pub no_escape: bool,

    /// Strip line breaks and collapse whitespace in text
    #[arg(long)]
    pub compress: bool,

    /// Strip unrecognized custom tags instead of failing
    #[arg(long)]
    pub lenient: bool,

    /// Only accept primitive tags
    #[arg(long)]
    pub no_syntax: bool,
}

impl CompileFlags {
    /// The options file, if any, overridden by the command-line flags.
    pub fn options(&self, input: &TemplateInput) -> Result<Options> {
        let mut options = match &self.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read options file {}", path))?;
                Options::from_json(&json)
                    .with_context(|| format!("Invalid options file {}", path))?
            }
            None => Options::default(),
        };
        if self.no_escape {
            options.escape = false;
        }
        if self.compress {
            options.compress = true;
        }
        if self.lenient {
            options.strict = false;
        }
        if self.no_syntax {
            options.no_syntax = true;
        }
        options.validate()?;
        Ok(options.with_filename(input.path.display().to_string()))
    }
}

/// A template file and the root its identity is relative to.
#[derive(Debug, Clone)]
pub struct TemplateInput {
    pub path: PathBuf,
    pub root: PathBuf,
    pub identity: String,
}

impl TemplateInput {
    pub fn locate(template: &str, root: Option<&str>) -> Result<Self> {
        let path = PathBuf::from(template);
        if !path.is_file() {
            anyhow::bail!("Template does not exist: {}", path.display());
        }
        let absolute = std::fs::canonicalize(&path)
            .with_context(|| format!("Failed to resolve {}", path.display()))?;

        let root = match root {
            Some(root) => std::fs::canonicalize(root)
                .with_context(|| format!("Failed to resolve root directory {}", root))?,
            None => absolute
                .parent()
                .map(Path::to_path_buf)
                .ok_or_else(|| anyhow::anyhow!("Could not determine template directory"))?,
        };

        let relative = absolute.strip_prefix(&root).map_err(|_| {
            anyhow::anyhow!(
                "Template {} is outside the root directory {}",
                path.display(),
                root.display()
            )
        })?;
        let identity = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        Ok(Self {
            path,
            root,
            identity,
        })
    }

    /// Provider rooted at `root`; extensionless includes get the
    /// template's own extension.
    pub fn provider(&self) -> FileSystemProvider {
        let provider = FileSystemProvider::new(&self.root);
        match self.path.extension().and_then(|e| e.to_str()) {
            Some(extension) => provider.with_default_extension(extension),
            None => provider,
        }
    }

    pub fn read(&self) -> Result<String> {
        std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read template {}", self.path.display()))
    }
}

/// Render data from a JSON file, or an empty object.
pub fn load_data(path: Option<&str>) -> Result<Value> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read data file {}", path))?;
            serde_json::from_str(&json).with_context(|| format!("Invalid JSON in {}", path))
        }
        None => Ok(Value::Object(Default::default())),
    }
}

/// Text form of a template error, with a source snippet when it points
/// into the template, without the trailing newline.
pub fn describe(err: &TemplateError) -> String {
    err.to_report_text().trim_end().to_string()
}
