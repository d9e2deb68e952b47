//! Resolution of `<+path>` expressions against the execution ambiance.

use serde_json::Value;
use tollgate_types::{Ambiance, Error, ExpressionResolver};

use crate::template::is_input_marker;

const OPEN: &str = "<+";
const CLOSE: char = '>';

/// Resolves `<+path>` expressions in string leaves using [`Ambiance::lookup`].
///
/// - A leaf that is exactly one expression takes the resolved JSON value.
/// - Expressions embedded in longer text are replaced by their string form.
/// - Unknown expressions and execution-input markers are left as written.
#[derive(Debug, Default, Clone, Copy)]
pub struct AmbianceResolver;

impl AmbianceResolver {
    pub fn new() -> Self {
        Self
    }
}

impl ExpressionResolver for AmbianceResolver {
    fn resolve(&self, ambiance: &Ambiance, value: &Value) -> tollgate_types::Result<Value> {
        resolve_value(ambiance, value)
    }
}

fn resolve_value(ambiance: &Ambiance, value: &Value) -> tollgate_types::Result<Value> {
    match value {
        Value::String(s) => resolve_string(ambiance, s),
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_value(ambiance, item))
            .collect::<tollgate_types::Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, child) in map {
                out.insert(key.clone(), resolve_value(ambiance, child)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn resolve_string(ambiance: &Ambiance, s: &str) -> tollgate_types::Result<Value> {
    if is_input_marker(s) || !s.contains(OPEN) {
        return Ok(Value::String(s.to_string()));
    }

    let trimmed = s.trim();
    if let Some(path) = whole_expression(trimmed) {
        return Ok(ambiance
            .lookup(path)
            .unwrap_or_else(|| Value::String(s.to_string())));
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find(OPEN) {
        out.push_str(&rest[..start]);
        let after = &rest[start + OPEN.len()..];
        let end = after
            .find(CLOSE)
            .ok_or_else(|| Error::Expression(format!("unterminated expression in '{s}'")))?;
        let path = &after[..end];
        match ambiance.lookup(path) {
            Some(Value::String(v)) => out.push_str(&v),
            Some(v) => out.push_str(&v.to_string()),
            None => {
                out.push_str(OPEN);
                out.push_str(path);
                out.push(CLOSE);
            }
        }
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(Value::String(out))
}

/// `<+path>` with nothing around it.
fn whole_expression(s: &str) -> Option<&str> {
    let path = s.strip_prefix(OPEN)?.strip_suffix(CLOSE)?;
    (!path.is_empty() && !path.contains(OPEN) && !path.contains(CLOSE)).then_some(path)
}
