/*
 * config.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Engine options.
//!
//! [`Options`] holds every knob of the pipeline as a typed field. The
//! keyed accessors ([`Options::get`], [`Options::set`], [`Options::set_many`])
//! exist for callers that drive configuration by name, such as the CLI's
//! `--config` file or scripting front ends.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Marker every `depends` parameter name must start with.
pub const DEPENDS_MARKER: char = '$';

/// Default passes of the syntax rewriter before it gives up on reaching a
/// fixed point.
pub const DEFAULT_MAX_REWRITE_PASSES: usize = 16;

/// Invalid option values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid delimiters '{open}' / '{close}': {reason}")]
    InvalidDelimiters {
        open: String,
        close: String,
        reason: String,
    },

    #[error("Depends parameter '{0}' must start with '$'")]
    InvalidDepends(String),

    #[error("Option '{key}' expects a {expected} value")]
    TypeMismatch {
        key: &'static str,
        expected: &'static str,
    },

    #[error("Option 'maxRewritePasses' must be at least 1")]
    ZeroRewritePasses,
}

/// Options controlling one compile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    /// Skip the syntax rewriter; the template is already primitive.
    pub no_syntax: bool,
    /// Residual custom tags are errors (strict) or stripped with a warning.
    pub strict: bool,
    /// Collapse whitespace in literal text.
    pub compress: bool,
    /// HTML-escape ambient echoes.
    pub escape: bool,
    pub open_tag: String,
    pub close_tag: String,
    /// Extra positional parameters of the render function, `$`-prefixed.
    pub depends: Vec<String>,
    /// Cache identity of the template.
    pub filename: Option<String>,
    /// Replace an existing cache entry instead of reusing it.
    #[serde(rename = "override")]
    pub override_cache: bool,
    pub max_rewrite_passes: usize,
    /// Named setting values, looked up by `depends` parameters.
    pub values: Map<String, Value>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            no_syntax: false,
            strict: true,
            compress: false,
            escape: true,
            open_tag: "{{".to_string(),
            close_tag: "}}".to_string(),
            depends: Vec::new(),
            filename: None,
            override_cache: false,
            max_rewrite_passes: DEFAULT_MAX_REWRITE_PASSES,
            values: Map::new(),
        }
    }
}

/// Names of the typed options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKey {
    NoSyntax,
    Strict,
    Compress,
    Escape,
    OpenTag,
    CloseTag,
    Depends,
    Filename,
    Override,
    MaxRewritePasses,
}

impl OptionKey {
    pub const ALL: [OptionKey; 10] = [
        OptionKey::NoSyntax,
        OptionKey::Strict,
        OptionKey::Compress,
        OptionKey::Escape,
        OptionKey::OpenTag,
        OptionKey::CloseTag,
        OptionKey::Depends,
        OptionKey::Filename,
        OptionKey::Override,
        OptionKey::MaxRewritePasses,
    ];

    /// The serialized (camelCase) name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionKey::NoSyntax => "noSyntax",
            OptionKey::Strict => "strict",
            OptionKey::Compress => "compress",
            OptionKey::Escape => "escape",
            OptionKey::OpenTag => "openTag",
            OptionKey::CloseTag => "closeTag",
            OptionKey::Depends => "depends",
            OptionKey::Filename => "filename",
            OptionKey::Override => "override",
            OptionKey::MaxRewritePasses => "maxRewritePasses",
        }
    }

    /// Look up a key by its serialized name.
    pub fn parse(name: &str) -> Option<OptionKey> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }
}

/// A typed option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Count(usize),
    Text(String),
    List(Vec<String>),
    Unset,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse options from a JSON document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_escape(mut self, escape: bool) -> Self {
        self.escape = escape;
        self
    }

    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn with_no_syntax(mut self, no_syntax: bool) -> Self {
        self.no_syntax = no_syntax;
        self
    }

    pub fn with_override(mut self, override_cache: bool) -> Self {
        self.override_cache = override_cache;
        self
    }

    pub fn with_delimiters(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.open_tag = open.into();
        self.close_tag = close.into();
        self
    }

    pub fn with_depends<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Read an option by key.
    pub fn get(&self, key: OptionKey) -> OptionValue {
        match key {
            OptionKey::NoSyntax => OptionValue::Bool(self.no_syntax),
            OptionKey::Strict => OptionValue::Bool(self.strict),
            OptionKey::Compress => OptionValue::Bool(self.compress),
            OptionKey::Escape => OptionValue::Bool(self.escape),
            OptionKey::OpenTag => OptionValue::Text(self.open_tag.clone()),
            OptionKey::CloseTag => OptionValue::Text(self.close_tag.clone()),
            OptionKey::Depends => OptionValue::List(self.depends.clone()),
            OptionKey::Filename => self
                .filename
                .clone()
                .map_or(OptionValue::Unset, OptionValue::Text),
            OptionKey::Override => OptionValue::Bool(self.override_cache),
            OptionKey::MaxRewritePasses => OptionValue::Count(self.max_rewrite_passes),
        }
    }

    /// Write an option by key.
    ///
    /// The value must have the key's type. The options are left unchanged
    /// when the result would not validate.
    pub fn set(&mut self, key: OptionKey, value: OptionValue) -> Result<(), ConfigError> {
        let mut next = self.clone();
        next.assign(key, value)?;
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Write several options at once; validation runs on the final state.
    pub fn set_many<I>(&mut self, entries: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (OptionKey, OptionValue)>,
    {
        let mut next = self.clone();
        for (key, value) in entries {
            next.assign(key, value)?;
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// A named setting value.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn set_value(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    fn assign(&mut self, key: OptionKey, value: OptionValue) -> Result<(), ConfigError> {
        let mismatch = |expected| ConfigError::TypeMismatch {
            key: key.as_str(),
            expected,
        };
        match (key, value) {
            (OptionKey::NoSyntax, OptionValue::Bool(b)) => self.no_syntax = b,
            (OptionKey::Strict, OptionValue::Bool(b)) => self.strict = b,
            (OptionKey::Compress, OptionValue::Bool(b)) => self.compress = b,
            (OptionKey::Escape, OptionValue::Bool(b)) => self.escape = b,
            (OptionKey::Override, OptionValue::Bool(b)) => self.override_cache = b,
            (OptionKey::OpenTag, OptionValue::Text(s)) => self.open_tag = s,
            (OptionKey::CloseTag, OptionValue::Text(s)) => self.close_tag = s,
            (OptionKey::Filename, OptionValue::Text(s)) => self.filename = Some(s),
            (OptionKey::Filename, OptionValue::Unset) => self.filename = None,
            (OptionKey::Depends, OptionValue::List(names)) => self.depends = names,
            (OptionKey::MaxRewritePasses, OptionValue::Count(n)) => self.max_rewrite_passes = n,
            (
                OptionKey::NoSyntax
                | OptionKey::Strict
                | OptionKey::Compress
                | OptionKey::Escape
                | OptionKey::Override,
                _,
            ) => return Err(mismatch("boolean")),
            (OptionKey::OpenTag | OptionKey::CloseTag | OptionKey::Filename, _) => {
                return Err(mismatch("text"));
            }
            (OptionKey::Depends, _) => return Err(mismatch("list")),
            (OptionKey::MaxRewritePasses, _) => return Err(mismatch("count")),
        }
        Ok(())
    }

    /// Check the options for values the pipeline cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidDelimiters {
            open: self.open_tag.clone(),
            close: self.close_tag.clone(),
            reason: reason.to_string(),
        };
        if self.open_tag.is_empty() || self.close_tag.is_empty() {
            return Err(invalid("delimiters must not be empty"));
        }
        if self.open_tag == self.close_tag {
            return Err(invalid("open and close delimiters must differ"));
        }
        if self.open_tag == crate::shell::OPEN_TAG || self.close_tag == crate::shell::CLOSE_TAG {
            return Err(invalid("delimiters collide with the primitive tag"));
        }
        if let Some(name) = self
            .depends
            .iter()
            .find(|name| !name.starts_with(DEPENDS_MARKER) || name.len() == 1)
        {
            return Err(ConfigError::InvalidDepends(name.clone()));
        }
        if self.max_rewrite_passes == 0 {
            return Err(ConfigError::ZeroRewritePasses);
        }
        Ok(())
    }

    /// Options for compiling an include dependency of this compile.
    pub(crate) fn for_dependency(&self, identity: &str) -> Options {
        let mut options = self.clone();
        options.filename = Some(identity.to_string());
        options.override_cache = false;
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert!(options.strict);
        assert!(options.escape);
        assert!(!options.compress);
        assert_eq!(options.open_tag, "{{");
        assert_eq!(options.close_tag, "}}");
        assert_eq!(options.max_rewrite_passes, DEFAULT_MAX_REWRITE_PASSES);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_get_set_roundtrip() {
        let mut options = Options::new();
        options
            .set(OptionKey::Escape, OptionValue::Bool(false))
            .unwrap();
        assert_eq!(options.get(OptionKey::Escape), OptionValue::Bool(false));
        assert_eq!(options.get(OptionKey::Filename), OptionValue::Unset);
    }

    #[test]
    fn test_set_rejects_type_mismatch() {
        let mut options = Options::new();
        let err = options
            .set(OptionKey::Strict, OptionValue::Text("yes".into()))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::TypeMismatch {
                key: "strict",
                expected: "boolean"
            }
        );
        assert!(options.strict);
    }

    #[test]
    fn test_set_many_validates_final_state() {
        let mut options = Options::new();
        options
            .set_many([
                (OptionKey::OpenTag, OptionValue::Text("[[".into())),
                (OptionKey::CloseTag, OptionValue::Text("]]".into())),
            ])
            .unwrap();
        assert_eq!(options.open_tag, "[[");

        let err = options
            .set_many([(OptionKey::CloseTag, OptionValue::Text("[[".into()))])
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDelimiters { .. }));
        assert_eq!(options.close_tag, "]]");
    }

    #[test]
    fn test_depends_require_marker() {
        let options = Options::new().with_depends(["site"]);
        assert_eq!(
            options.validate(),
            Err(ConfigError::InvalidDepends("site".into()))
        );
        assert!(Options::new().with_depends(["$site"]).validate().is_ok());
    }

    #[test]
    fn test_primitive_delimiters_rejected() {
        let options = Options::new().with_delimiters("<%", "}}");
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_deserialize_camel_case() {
        let options = Options::from_json(
            r#"{"noSyntax": true, "openTag": "[[", "closeTag": "]]", "override": true,
                "values": {"site": {"title": "x"}}}"#,
        )
        .unwrap();
        assert!(options.no_syntax);
        assert!(options.override_cache);
        assert!(options.strict);
        assert_eq!(options.value("site"), Some(&json!({"title": "x"})));
    }

    #[test]
    fn test_option_key_names() {
        for key in OptionKey::ALL {
            assert_eq!(OptionKey::parse(key.as_str()), Some(key));
        }
    }
}
