/*
 * script/interp.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Tree-walking interpreter for realized procedures.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::ast::{Arg, AssignOp, BinaryOp, Expr, Function, Stmt, StmtKind, UnaryOp};
use crate::helpers::{BlockHelper, BlockInvocation, HelperError};
use crate::render::Scope;
use crate::value::{
    escape_html, format_number, is_truthy, loose_equals, number_value, strict_equals, to_display,
    to_number, type_name,
};

/// Includes nested deeper than this are treated as runaway recursion.
pub const MAX_INCLUDE_DEPTH: usize = 64;

/// A runtime fault, with the last template line that started executing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub message: String,
    pub line: usize,
}

enum Flow {
    Normal,
    Break,
    Continue,
}

pub(crate) struct Interpreter<'s> {
    scope: &'s Scope,
    data: &'s Value,
    frames: Vec<HashMap<String, Value>>,
    out: String,
    line: usize,
    depth: usize,
}

impl<'s> Interpreter<'s> {
    pub(crate) fn new(
        scope: &'s Scope,
        data: &'s Value,
        globals: HashMap<String, Value>,
        depth: usize,
    ) -> Self {
        Self {
            scope,
            data,
            frames: vec![globals],
            out: String::new(),
            line: 1,
            depth,
        }
    }

    pub(crate) fn run(mut self, body: &[Stmt]) -> Result<String, Fault> {
        self.exec_block(body)?;
        Ok(self.out)
    }

    fn fault<T>(&self, message: impl Into<String>) -> Result<T, Fault> {
        Err(Fault {
            message: message.into(),
            line: self.line,
        })
    }

    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<Flow, Fault> {
        for stmt in stmts {
            self.line = stmt.line;
            match self.exec(stmt)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<Flow, Fault> {
        match &stmt.kind {
            StmtKind::Append(text) => self.out.push_str(text),
            StmtKind::Echo { expr, escape } => {
                let value = self.eval(expr)?;
                let text = to_display(&value);
                if *escape {
                    self.out.push_str(&escape_html(&text));
                } else {
                    self.out.push_str(&text);
                }
            }
            StmtKind::Declare { name, value } => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Null,
                };
                if let Some(frame) = self.frames.last_mut() {
                    frame.insert(name.clone(), value);
                }
            }
            StmtKind::Assign { name, op, value } => {
                let rhs = self.eval(value)?;
                let next = match op {
                    AssignOp::Set => rhs,
                    AssignOp::Add => {
                        let current = self.lookup(name)?;
                        add(&current, &rhs)
                    }
                    AssignOp::Sub => {
                        let current = self.lookup(name)?;
                        number_value(to_number(&current) - to_number(&rhs))
                    }
                };
                self.set_var(name, next);
            }
            StmtKind::If {
                branches,
                otherwise,
            } => {
                for branch in branches {
                    self.line = branch.line;
                    if is_truthy(&self.eval(&branch.cond)?) {
                        return self.exec_block(&branch.body);
                    }
                }
                if let Some(body) = otherwise {
                    return self.exec_block(body);
                }
            }
            StmtKind::ForOf {
                item,
                index,
                iterable,
                body,
            } => {
                let iterable = self.eval(iterable)?;
                for (key, value) in self.entries(&iterable, "of")? {
                    self.set_var(item, value);
                    if let Some(index) = index {
                        self.set_var(index, key);
                    }
                    if let Flow::Break = self.exec_block(body)? {
                        break;
                    }
                }
            }
            StmtKind::ForIn {
                key,
                iterable,
                body,
            } => {
                let iterable = self.eval(iterable)?;
                let keys: Vec<Value> = match &iterable {
                    Value::Object(map) => map.keys().cloned().map(Value::String).collect(),
                    Value::Array(items) => (0..items.len()).map(|i| Value::String(i.to_string())).collect(),
                    Value::String(s) => (0..s.chars().count()).map(|i| Value::String(i.to_string())).collect(),
                    _ => Vec::new(),
                };
                for k in keys {
                    self.set_var(key, k);
                    if let Flow::Break = self.exec_block(body)? {
                        break;
                    }
                }
            }
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
            }
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
        }
        Ok(Flow::Normal)
    }

    /// `(index, value)` pairs for `for ... of`.
    fn entries(&self, iterable: &Value, form: &str) -> Result<Vec<(Value, Value)>, Fault> {
        Ok(match iterable {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, v)| (number_value(i as f64), v.clone()))
                .collect(),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| (Value::String(k.clone()), v.clone()))
                .collect(),
            Value::String(s) => s
                .chars()
                .enumerate()
                .map(|(i, c)| (number_value(i as f64), Value::String(c.to_string())))
                .collect(),
            Value::Null => Vec::new(),
            other => {
                return self.fault(format!(
                    "{} value is not iterable with `{}`",
                    type_name(other),
                    form
                ));
            }
        })
    }

    fn lookup(&self, name: &str) -> Result<Value, Fault> {
        if name == "$data" {
            return Ok(self.data.clone());
        }
        for frame in self.frames.iter().rev() {
            if let Some(value) = frame.get(name) {
                return Ok(value.clone());
            }
        }
        if self.scope.helper(name).is_some() || self.scope.block(name).is_some() {
            return self.fault(format!("{} is a helper and can only be called", name));
        }
        self.fault(format!("{} is not defined", name))
    }

    fn set_var(&mut self, name: &str, value: Value) {
        for frame in self.frames.iter_mut().rev() {
            if let Some(slot) = frame.get_mut(name) {
                *slot = value;
                return;
            }
        }
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name.to_string(), value);
        }
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, Fault> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Ident(name) => self.lookup(name),
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item)?);
                }
                Ok(Value::Array(values))
            }
            Expr::Object(entries) => {
                let mut map = Map::new();
                for (key, value) in entries {
                    let value = self.eval(value)?;
                    map.insert(key.clone(), value);
                }
                Ok(Value::Object(map))
            }
            Expr::Member(object, name) => {
                let object = self.eval(object)?;
                self.member(&object, name)
            }
            Expr::Index(object, index) => {
                let object = self.eval(object)?;
                let index = self.eval(index)?;
                self.index(&object, &index)
            }
            Expr::Call { callee, args } => self.call(callee, args),
            Expr::Unary(UnaryOp::Not, operand) => Ok(Value::Bool(!is_truthy(&self.eval(operand)?))),
            Expr::Unary(UnaryOp::Neg, operand) => Ok(number_value(-to_number(&self.eval(operand)?))),
            Expr::Binary(op, left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(binary(*op, &left, &right))
            }
            Expr::And(left, right) => {
                let left = self.eval(left)?;
                if is_truthy(&left) {
                    self.eval(right)
                } else {
                    Ok(left)
                }
            }
            Expr::Or(left, right) => {
                let left = self.eval(left)?;
                if is_truthy(&left) {
                    Ok(left)
                } else {
                    self.eval(right)
                }
            }
            Expr::Conditional(cond, then, otherwise) => {
                if is_truthy(&self.eval(cond)?) {
                    self.eval(then)
                } else {
                    self.eval(otherwise)
                }
            }
        }
    }

    fn member(&self, object: &Value, name: &str) -> Result<Value, Fault> {
        match object {
            Value::Null => self.fault(format!("Cannot read property '{}' of null", name)),
            Value::Object(map) => Ok(map.get(name).cloned().unwrap_or(Value::Null)),
            Value::Array(items) if name == "length" => Ok(number_value(items.len() as f64)),
            Value::String(s) if name == "length" => Ok(number_value(s.chars().count() as f64)),
            _ => Ok(Value::Null),
        }
    }

    fn index(&self, object: &Value, index: &Value) -> Result<Value, Fault> {
        match (object, index) {
            (Value::Null, _) => self.fault(format!(
                "Cannot read property '{}' of null",
                to_display(index)
            )),
            (_, Value::String(name)) if !object.is_object() => self.member(object, name),
            (Value::Array(items), Value::Number(n)) => Ok(n
                .as_u64()
                .and_then(|i| items.get(i as usize))
                .cloned()
                .unwrap_or(Value::Null)),
            (Value::String(s), Value::Number(n)) => Ok(n
                .as_u64()
                .and_then(|i| s.chars().nth(i as usize))
                .map_or(Value::Null, |c| Value::String(c.to_string()))),
            (Value::Object(map), key) => Ok(map.get(&to_display(key)).cloned().unwrap_or(Value::Null)),
            _ => Ok(Value::Null),
        }
    }

    fn values(&mut self, callee: &str, args: &[Arg]) -> Result<Vec<Value>, Fault> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Arg::Value(expr) => values.push(self.eval(expr)?),
                Arg::Body(_) => return self.fault(format!("{} does not take a block body", callee)),
            }
        }
        Ok(values)
    }

    fn call(&mut self, callee: &str, args: &[Arg]) -> Result<Value, Fault> {
        if let Some(helper) = self.scope.helper(callee).cloned() {
            let values = self.values(callee, args)?;
            return helper
                .call(&values)
                .or_else(|err| self.helper_fault(callee, err));
        }
        if let Some(block) = self.scope.block(callee).cloned() {
            return self.call_block(callee, &block, args);
        }
        match callee {
            "include" => self.include(args),
            "append" => {
                for value in self.values(callee, args)? {
                    self.out.push_str(&to_display(&value));
                }
                Ok(Value::Null)
            }
            _ => self.fault(format!("{} is not a function", callee)),
        }
    }

    fn helper_fault<T>(&self, callee: &str, err: HelperError) -> Result<T, Fault> {
        match err.line {
            // Raised inside a block body; already attributed.
            Some(line) => Err(Fault {
                message: err.message,
                line,
            }),
            None => self.fault(format!("{}: {}", callee, err.message)),
        }
    }

    fn call_block(&mut self, callee: &str, block: &BlockHelper, args: &[Arg]) -> Result<Value, Fault> {
        let mut values = Vec::new();
        let mut body = None;
        for arg in args {
            match arg {
                Arg::Value(expr) => values.push(self.eval(expr)?),
                Arg::Body(function) => body = Some(function),
            }
        }

        let open_line = self.line;
        let mut output = String::new();
        let result = match body {
            Some(function) => {
                let mut render = |params: &[Value]| -> Result<String, HelperError> {
                    self.render_body(function, params)
                        .map_err(|fault| HelperError::new(fault.message).at_line(fault.line))
                };
                let mut invocation = BlockInvocation::new(
                    &values,
                    Some(&mut render as &mut dyn FnMut(&[Value]) -> Result<String, HelperError>),
                    &mut output,
                );
                block.call(&mut invocation)
            }
            None => {
                let mut invocation = BlockInvocation::new(&values, None, &mut output);
                block.call(&mut invocation)
            }
        };
        match result {
            Ok(()) => {
                self.out.push_str(&output);
                Ok(Value::Null)
            }
            Err(err) => {
                self.line = open_line;
                self.helper_fault(callee, err)
            }
        }
    }

    fn render_body(&mut self, function: &Function, params: &[Value]) -> Result<String, Fault> {
        let frame = function
            .params
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), params.get(i).cloned().unwrap_or(Value::Null)))
            .collect();
        self.frames.push(frame);
        let saved = std::mem::take(&mut self.out);
        let result = self.exec_block(&function.body);
        let rendered = std::mem::replace(&mut self.out, saved);
        self.frames.pop();
        result.map(|_| rendered)
    }

    fn include(&mut self, args: &[Arg]) -> Result<Value, Fault> {
        let values = self.values("include", args)?;
        let identity = match values.first() {
            Some(Value::String(identity)) => identity.clone(),
            Some(other) => {
                return self.fault(format!(
                    "include expects a template name, got {}",
                    type_name(other)
                ));
            }
            None => return self.fault("include expects a template name"),
        };
        if self.depth >= MAX_INCLUDE_DEPTH {
            return self.fault(format!(
                "include of '{}' exceeds the nesting limit of {}",
                identity, MAX_INCLUDE_DEPTH
            ));
        }
        let Some(render) = self.scope.resolve_include(&identity) else {
            return self.fault(format!("template '{}' is not available for include", identity));
        };
        let data = values.get(1).unwrap_or(self.data);
        match render.try_render_nested(data, self.depth + 1) {
            Ok(text) => Ok(Value::String(text)),
            Err(err) => self.fault(format!("include of '{}' failed: {}", identity, err)),
        }
    }
}

/// `+`: string concatenation when either side is not a number-like value.
fn add(left: &Value, right: &Value) -> Value {
    let numeric = |v: &Value| matches!(v, Value::Number(_) | Value::Bool(_) | Value::Null);
    if numeric(left) && numeric(right) {
        number_value(to_number(left) + to_number(right))
    } else {
        Value::String(format!("{}{}", display_operand(left), display_operand(right)))
    }
}

fn display_operand(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Number(n) => format_number(n.as_f64().unwrap_or(f64::NAN)),
        other => to_display(other),
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Value {
    let num = |f: fn(f64, f64) -> f64| number_value(f(to_number(left), to_number(right)));
    let compare = |f: fn(std::cmp::Ordering) -> bool| {
        let ordering = match (left, right) {
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => to_number(left).partial_cmp(&to_number(right)),
        };
        Value::Bool(ordering.is_some_and(f))
    };
    match op {
        BinaryOp::Add => add(left, right),
        BinaryOp::Sub => num(|a, b| a - b),
        BinaryOp::Mul => num(|a, b| a * b),
        BinaryOp::Div => num(|a, b| a / b),
        BinaryOp::Rem => num(|a, b| a % b),
        BinaryOp::Lt => compare(|o| o.is_lt()),
        BinaryOp::Le => compare(|o| o.is_le()),
        BinaryOp::Gt => compare(|o| o.is_gt()),
        BinaryOp::Ge => compare(|o| o.is_ge()),
        BinaryOp::Eq => Value::Bool(loose_equals(left, right)),
        BinaryOp::Ne => Value::Bool(!loose_equals(left, right)),
        BinaryOp::StrictEq => Value::Bool(strict_equals(left, right)),
        BinaryOp::StrictNe => Value::Bool(!strict_equals(left, right)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Scope;
    use crate::script::parser::parse_shell;
    use crate::script::test_support::shell_of;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run_with(scope: &Scope, ops: &[(&str, &str)], data: Value) -> Result<String, Fault> {
        let body = parse_shell(&shell_of(ops)).unwrap();
        let globals = match &data {
            Value::Object(map) => map.clone().into_iter().collect(),
            _ => HashMap::new(),
        };
        Interpreter::new(scope, &data, globals, 0).run(&body)
    }

    fn run(ops: &[(&str, &str)], data: Value) -> Result<String, Fault> {
        run_with(&Scope::new(""), ops, data)
    }

    #[test]
    fn test_echo_and_escape() {
        let out = run(
            &[("=", "name"), ("#", "name"), ("text", "!")],
            json!({"name": "<b>"}),
        )
        .unwrap();
        assert_eq!(out, "&lt;b&gt;<b>!");
    }

    #[test]
    fn test_if_else_chain() {
        let ops = [
            ("", "if (n > 1) {"),
            ("text", "many"),
            ("", "} else if (n === 1) {"),
            ("text", "one"),
            ("", "} else {"),
            ("text", "none"),
            ("", "}"),
        ];
        assert_eq!(run(&ops, json!({"n": 3})).unwrap(), "many");
        assert_eq!(run(&ops, json!({"n": 1})).unwrap(), "one");
        assert_eq!(run(&ops, json!({"n": 0})).unwrap(), "none");
    }

    #[test]
    fn test_for_of_break_continue() {
        let ops = [
            ("", "for (x, i of xs) {"),
            ("", "if (x === 'skip') { continue }"),
            ("", "if (x === 'stop') { break }"),
            ("#", "i + ':' + x + ' '"),
            ("", "}"),
        ];
        let out = run(&ops, json!({"xs": ["a", "skip", "b", "stop", "c"]})).unwrap();
        assert_eq!(out, "0:a 2:b ");
    }

    #[test]
    fn test_for_in_object() {
        let ops = [("", "for (k in obj) {"), ("#", "k + '=' + obj[k] + ';'"), ("", "}")];
        let out = run(&ops, json!({"obj": {"a": 1, "b": true}})).unwrap();
        assert_eq!(out, "a=1;b=true;");
    }

    #[test]
    fn test_variables_and_arithmetic() {
        let ops = [
            ("", "var total = 0"),
            ("", "for (n of nums) { total += n }"),
            ("", "total++"),
            ("=", "total * 2 + '!'"),
        ];
        assert_eq!(run(&ops, json!({"nums": [1, 2, 3]})).unwrap(), "14!");
    }

    #[test]
    fn test_member_of_null_faults() {
        let err = run(&[("text", "a\n"), ("=", "user.name")], json!({"user": null})).unwrap_err();
        assert_eq!(err.message, "Cannot read property 'name' of null");
    }

    #[test]
    fn test_unknown_function_faults() {
        let err = run(&[("", "nothing(1)")], json!({})).unwrap_err();
        assert_eq!(err.message, "nothing is not a function");
    }

    #[test]
    fn test_append_builtin() {
        assert_eq!(run(&[("", "append('a', 1, null)")], json!({})).unwrap(), "a1");
    }

    #[test]
    fn test_length_and_data() {
        let out = run(
            &[("=", "items.length + name.length"), ("=", "$data.name")],
            json!({"items": [1, 2], "name": "abc"}),
        )
        .unwrap();
        assert_eq!(out, "5abc");
    }

    #[test]
    fn test_add_semantics() {
        assert_eq!(add(&json!(1), &json!(2)), json!(3));
        assert_eq!(add(&json!("a"), &json!(1)), json!("a1"));
        assert_eq!(add(&json!(1.5), &json!("x")), json!("1.5x"));
        assert_eq!(binary(BinaryOp::Lt, &json!("a"), &json!("b")), json!(true));
        assert_eq!(binary(BinaryOp::Rem, &json!(7), &json!(4)), json!(3));
    }
}
