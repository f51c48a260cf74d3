/*
 * catalog.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Error code catalog and lookup.
//!
//! Maps error codes (like "T-1-1") to their metadata: subsystem, title,
//! default message and documentation URL.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata for an error code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorCodeInfo {
    /// Subsystem name (e.g., "syntax", "compile", "exec")
    pub subsystem: String,

    /// Short title for the error
    pub title: String,

    /// Default message
    pub message_template: String,

    /// URL to documentation (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs_url: Option<String>,

    /// When this error was introduced (version)
    pub since_version: String,
}

/// Global error catalog, embedded at compile time from `error_catalog.json`.
///
/// # Panics
///
/// Panics on first access if the embedded JSON is invalid.
pub static ERROR_CATALOG: Lazy<HashMap<String, ErrorCodeInfo>> = Lazy::new(|| {
    let json_data = include_str!("../error_catalog.json");
    serde_json::from_str(json_data).expect("Invalid error catalog JSON - this is a bug in shellplate")
});

/// Look up error code information.
///
/// # Example
///
/// ```
/// use shellplate_error_reporting::catalog::get_error_info;
///
/// let info = get_error_info("T-1-1").unwrap();
/// assert_eq!(info.subsystem, "syntax");
/// ```
pub fn get_error_info(code: &str) -> Option<&ErrorCodeInfo> {
    ERROR_CATALOG.get(code)
}

/// Get documentation URL for an error code.
pub fn get_docs_url(code: &str) -> Option<&str> {
    ERROR_CATALOG
        .get(code)
        .and_then(|info| info.docs_url.as_deref())
}

/// Get the subsystem name for an error code.
pub fn get_subsystem(code: &str) -> Option<&str> {
    ERROR_CATALOG.get(code).map(|info| info.subsystem.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_loads() {
        assert!(!ERROR_CATALOG.is_empty());
    }

    #[test]
    fn test_every_entry_has_docs_url() {
        for (code, info) in ERROR_CATALOG.iter() {
            let url = info.docs_url.as_deref().unwrap_or_default();
            assert!(url.ends_with(code.as_str()), "bad docs url for {}", code);
        }
    }

    #[test]
    fn test_get_subsystem() {
        assert_eq!(get_subsystem("T-2-1"), Some("compile"));
        assert_eq!(get_subsystem("T-3-1"), Some("exec"));
        assert_eq!(get_subsystem("T-999-999"), None);
    }

    #[test]
    fn test_nonexistent_code() {
        assert!(get_error_info("T-999-999").is_none());
        assert!(get_docs_url("T-999-999").is_none());
    }
}
