/*
 * main.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! shellplate CLI - Main entry point

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod input;

use input::CompileFlags;

#[derive(Parser)]
#[command(name = "shellplate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compile and render shellplate templates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a template to stdout
    Render {
        /// Template file
        template: String,

        /// JSON file with the render data
        #[arg(short = 'd', long)]
        data: Option<String>,

        #[command(flatten)]
        flags: CompileFlags,

        /// Fail with the template error instead of printing an empty render
        #[arg(long)]
        rethrow: bool,
    },

    /// Print the compiled shell of a template
    Shell {
        /// Template file
        template: String,

        #[command(flatten)]
        flags: CompileFlags,
    },

    /// Compile a template and its includes in strict mode
    Check {
        /// Template file
        template: String,

        #[command(flatten)]
        flags: CompileFlags,

        /// Print diagnostics as JSON on stdout
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    // Diagnostics and logs go to stderr so renders can be piped
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shellplate=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            template,
            data,
            flags,
            rethrow,
        } => commands::render::execute(commands::render::RenderArgs {
            template,
            data,
            flags,
            rethrow,
        }),
        Commands::Shell { template, flags } => commands::shell::execute(&template, &flags),
        Commands::Check {
            template,
            flags,
            json,
        } => commands::check::execute(&template, &flags, json),
    }
}
