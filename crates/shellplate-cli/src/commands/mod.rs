//! Command implementations for the shellplate CLI
//!
//! Each command module handles the CLI interface and delegates to the
//! `shellplate` engine for the actual work.

pub mod check;
pub mod render;
pub mod shell;
