/*
 * helpers.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Helper functions callable from logic fragments.
//!
//! A plain [`Helper`] maps positional arguments to a value. A
//! [`BlockHelper`] additionally receives the body of its block and decides
//! how often, and with which parameters, the body is rendered.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::value::{escape_html, is_empty, number_value, to_display};

/// Error raised by a helper or block helper.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct HelperError {
    pub message: String,
    /// Template line the error originated from, when known.
    pub line: Option<usize>,
}

impl HelperError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: None,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }
}

type HelperFn = dyn Fn(&[Value]) -> Result<Value, HelperError> + Send + Sync;

/// A named function callable from templates.
#[derive(Clone)]
pub struct Helper(Arc<HelperFn>);

impl Helper {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, HelperError> + Send + Sync + 'static,
    {
        Helper(Arc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Result<Value, HelperError> {
        (self.0)(args)
    }
}

impl fmt::Debug for Helper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Helper")
    }
}

type BodyFn<'a> = dyn FnMut(&[Value]) -> Result<String, HelperError> + 'a;

/// What a block helper sees when its block is rendered.
pub struct BlockInvocation<'a> {
    args: &'a [Value],
    body: Option<&'a mut BodyFn<'a>>,
    out: &'a mut String,
}

impl<'a> BlockInvocation<'a> {
    pub fn new(args: &'a [Value], body: Option<&'a mut BodyFn<'a>>, out: &'a mut String) -> Self {
        Self { args, body, out }
    }

    /// Positional arguments written in the open tag.
    pub fn args(&self) -> &[Value] {
        self.args
    }

    pub fn arg(&self, index: usize) -> Option<&Value> {
        self.args.get(index)
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Render the body with the given parameters and return its output.
    ///
    /// The output is not appended; pass it to [`BlockInvocation::append`]
    /// to keep it.
    pub fn render_body(&mut self, params: &[Value]) -> Result<String, HelperError> {
        match self.body.as_mut() {
            Some(body) => body(params),
            None => Ok(String::new()),
        }
    }

    /// Append text to the template output.
    pub fn append(&mut self, text: &str) {
        self.out.push_str(text);
    }
}

type BlockFn = dyn Fn(&mut BlockInvocation<'_>) -> Result<(), HelperError> + Send + Sync;

/// The runtime handler of a custom block.
#[derive(Clone)]
pub struct BlockHelper(Arc<BlockFn>);

impl BlockHelper {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut BlockInvocation<'_>) -> Result<(), HelperError> + Send + Sync + 'static,
    {
        BlockHelper(Arc::new(f))
    }

    pub fn call(&self, invocation: &mut BlockInvocation<'_>) -> Result<(), HelperError> {
        (self.0)(invocation)
    }
}

impl fmt::Debug for BlockHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BlockHelper")
    }
}

/// Named helpers of an engine.
#[derive(Debug, Clone, Default)]
pub struct HelperRegistry {
    helpers: HashMap<String, Helper>,
}

impl HelperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the default helper library.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for (name, f) in DEFAULT_HELPERS {
            registry.register(*name, Helper::new(*f));
        }
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, helper: Helper) {
        self.helpers.insert(name.into(), helper);
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.helpers.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Helper> {
        self.helpers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.helpers.contains_key(name)
    }

    /// A copy of the current table, for a render scope.
    pub fn snapshot(&self) -> HashMap<String, Helper> {
        self.helpers.clone()
    }
}

type DefaultHelper = fn(&[Value]) -> Result<Value, HelperError>;

const DEFAULT_HELPERS: &[(&str, DefaultHelper)] = &[
    ("escape", |args| Ok(Value::String(escape_html(&to_display(first(args)))))),
    ("isArray", |args| Ok(Value::Bool(first(args).is_array()))),
    ("isObject", |args| Ok(Value::Bool(first(args).is_object()))),
    ("isString", |args| Ok(Value::Bool(first(args).is_string()))),
    ("isNumber", |args| Ok(Value::Bool(first(args).is_number()))),
    ("isBoolean", |args| Ok(Value::Bool(first(args).is_boolean()))),
    ("isEmpty", |args| Ok(Value::Bool(is_empty(first(args))))),
    ("json", json_helper),
    ("upper", |args| Ok(Value::String(to_display(first(args)).to_uppercase()))),
    ("lower", |args| Ok(Value::String(to_display(first(args)).to_lowercase()))),
    ("trim", |args| Ok(Value::String(to_display(first(args)).trim().to_string()))),
    ("join", join_helper),
    ("length", length_helper),
];

static NULL: Value = Value::Null;

fn first(args: &[Value]) -> &Value {
    args.first().unwrap_or(&NULL)
}

fn json_helper(args: &[Value]) -> Result<Value, HelperError> {
    serde_json::to_string(first(args))
        .map(Value::String)
        .map_err(|e| HelperError::new(format!("json: {}", e)))
}

fn join_helper(args: &[Value]) -> Result<Value, HelperError> {
    let separator = match args.get(1) {
        Some(Value::Null) | None => ",".to_string(),
        Some(sep) => to_display(sep),
    };
    match first(args) {
        Value::Array(items) => Ok(Value::String(
            items
                .iter()
                .map(to_display)
                .collect::<Vec<_>>()
                .join(&separator),
        )),
        Value::Null => Ok(Value::String(String::new())),
        other => Err(HelperError::new(format!(
            "join expects an array, got {}",
            crate::value::type_name(other)
        ))),
    }
}

fn length_helper(args: &[Value]) -> Result<Value, HelperError> {
    let len = match first(args) {
        Value::String(s) => s.chars().count(),
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        _ => 0,
    };
    Ok(number_value(len as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(name: &str, args: &[Value]) -> Value {
        HelperRegistry::with_defaults()
            .get(name)
            .unwrap()
            .call(args)
            .unwrap()
    }

    #[test]
    fn test_escape_helper() {
        assert_eq!(call("escape", &[json!("a & b")]), json!("a &amp; b"));
        assert_eq!(call("escape", &[]), json!(""));
    }

    #[test]
    fn test_type_predicates() {
        assert_eq!(call("isArray", &[json!([1])]), json!(true));
        assert_eq!(call("isObject", &[json!([1])]), json!(false));
        assert_eq!(call("isEmpty", &[json!({})]), json!(true));
        assert_eq!(call("isNumber", &[json!(1.5)]), json!(true));
    }

    #[test]
    fn test_join_and_length() {
        assert_eq!(call("join", &[json!(["a", "b"]), json!(" / ")]), json!("a / b"));
        assert_eq!(call("join", &[json!([1, 2])]), json!("1,2"));
        assert_eq!(call("length", &[json!("héllo")]), json!(5));
    }

    #[test]
    fn test_join_rejects_scalars() {
        let err = HelperRegistry::with_defaults()
            .get("join")
            .unwrap()
            .call(&[json!(3)])
            .unwrap_err();
        assert_eq!(err.message, "join expects an array, got number");
    }

    #[test]
    fn test_json_helper_is_compact() {
        assert_eq!(call("json", &[json!({"a": [1, 2]})]), json!(r#"{"a":[1,2]}"#));
    }

    #[test]
    fn test_block_invocation_body() {
        let mut out = String::new();
        let args = [json!(2)];
        let mut body = |params: &[Value]| -> Result<String, HelperError> {
            Ok(format!("<{}>", to_display(&params[0])))
        };
        let handler = BlockHelper::new(|inv| {
            let times = inv.arg(0).and_then(Value::as_u64).unwrap_or(0);
            for i in 0..times {
                let rendered = inv.render_body(&[json!(i)])?;
                inv.append(&rendered);
            }
            Ok(())
        });
        let mut invocation = BlockInvocation::new(&args, Some(&mut body), &mut out);
        handler.call(&mut invocation).unwrap();
        assert_eq!(out, "<0><1>");
    }
}
