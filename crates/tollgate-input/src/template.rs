//! Execution-input templates and the template/input merge.
//!
//! A template is a YAML fragment in which some leaves carry the runtime
//! input marker:
//!
//! ```yaml
//! step:
//!   spec:
//!     script: <+input>.executionInput()
//!     retries: <+input>.default(3).executionInput()
//!     region: <+input>.allowedValues(us, eu).executionInput()
//! ```
//!
//! Merging walks the template and the user-supplied tree side by side.
//! Objects are matched by key and arrays by position. A marker leaf takes
//! the user value at the same path verbatim (strings, numbers, lists and
//! maps keep their type); without one it falls back to the marker's
//! `.default(...)` and finally to the raw marker text.

use serde_json::{Map, Value};

use crate::error::{InputError, Result};

/// Prefix shared by every runtime input expression.
pub const INPUT_MARKER_PREFIX: &str = "<+input>";

const EXECUTION_INPUT_CALL: &str = "executionInput";
const DEFAULT_CALL: &str = "default";
const ALLOWED_VALUES_CALL: &str = "allowedValues";

/// A parsed `<+input>...` leaf.
#[derive(Debug, Clone, PartialEq)]
pub struct InputMarker {
    /// Whether the marker carries `.executionInput()`.
    pub execution_input: bool,
    /// Value of `.default(...)`, parsed as a YAML scalar.
    pub default: Option<Value>,
    /// Values listed in `.allowedValues(...)`.
    pub allowed_values: Option<Vec<Value>>,
}

impl InputMarker {
    /// Parse a string leaf. Returns `None` when it is not an input marker.
    pub fn parse(s: &str) -> Option<Self> {
        let rest = s.trim().strip_prefix(INPUT_MARKER_PREFIX)?;
        let mut marker = InputMarker {
            execution_input: false,
            default: None,
            allowed_values: None,
        };

        for (name, args) in parse_calls(rest) {
            match name {
                EXECUTION_INPUT_CALL => marker.execution_input = true,
                DEFAULT_CALL => marker.default = Some(parse_scalar(args)),
                ALLOWED_VALUES_CALL => {
                    marker.allowed_values = Some(
                        split_args(args)
                            .into_iter()
                            .map(parse_scalar)
                            .collect(),
                    )
                }
                _ => {}
            }
        }
        Some(marker)
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Whether `value` satisfies `.allowedValues(...)`, if declared.
    pub fn allows(&self, value: &Value) -> bool {
        match &self.allowed_values {
            None => true,
            Some(allowed) => {
                let candidate = scalar_text(value);
                allowed.iter().any(|a| scalar_text(a) == candidate)
            }
        }
    }
}

/// Whether a string leaf is a runtime input marker.
pub fn is_input_marker(s: &str) -> bool {
    s.trim_start().starts_with(INPUT_MARKER_PREFIX)
}

/// Split `.name(args).other(args)` into `(name, args)` pairs.
///
/// Parentheses nest, so `.default(f(1))` yields `("default", "f(1)")`.
fn parse_calls(s: &str) -> Vec<(&str, &str)> {
    let mut calls = Vec::new();
    let mut remaining = s;

    while let Some(after_dot) = remaining.strip_prefix('.') {
        let Some(open) = after_dot.find('(') else {
            break;
        };
        let name = after_dot[..open].trim();

        let mut depth = 0usize;
        let mut close = None;
        for (i, c) in after_dot[open..].char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(open + i);
                        break;
                    }
                }
                _ => {}
            }
        }
        let Some(close) = close else {
            break; // Unbalanced parentheses: stop parsing
        };

        calls.push((name, after_dot[open + 1..close].trim()));
        remaining = after_dot[close + 1..].trim_start();
    }

    calls
}

fn split_args(args: &str) -> Vec<&str> {
    args.split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .collect()
}

/// Parse a marker argument as a YAML scalar (`1234` becomes a number).
fn parse_scalar(text: &str) -> Value {
    match serde_yaml::from_str::<Value>(text) {
        Ok(Value::Null) | Err(_) => Value::String(text.to_string()),
        Ok(v) => v,
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Merge a parsed template with a parsed user input tree.
pub fn merge_template_with_input(template: &Value, user_input: &Value) -> Value {
    merge_node(template, Some(user_input))
}

fn merge_node(template: &Value, input: Option<&Value>) -> Value {
    match template {
        Value::Object(map) => {
            let mut merged = Map::new();
            for (key, value) in map {
                merged.insert(key.clone(), merge_node(value, input.and_then(|i| i.get(key))));
            }
            Value::Object(merged)
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .enumerate()
                .map(|(idx, item)| merge_node(item, input.and_then(|i| i.get(idx))))
                .collect(),
        ),
        Value::String(s) => match InputMarker::parse(s) {
            Some(marker) => match input {
                Some(supplied) if !supplied.is_null() => supplied.clone(),
                _ => marker.default.unwrap_or_else(|| template.clone()),
            },
            None => template.clone(),
        },
        other => other.clone(),
    }
}

/// Parse YAML into a JSON value tree; blank documents become an empty map.
pub fn parse_yaml(yaml: &str) -> Result<Value> {
    if yaml.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    match serde_yaml::from_str::<Value>(yaml)? {
        Value::Null => Ok(Value::Object(Map::new())),
        v => Ok(v),
    }
}

/// Parse both documents and merge them.
pub fn merge_yaml(template_yaml: &str, user_input_yaml: &str) -> Result<Value> {
    let template = parse_yaml(template_yaml)?;
    let user_input = parse_yaml(user_input_yaml)?;
    Ok(merge_template_with_input(&template, &user_input))
}

/// Check every user-supplied marker value against its `.allowedValues(...)`.
pub fn validate_allowed_values(template: &Value, merged: &Value) -> Result<()> {
    for path in marker_paths(template) {
        let (Some(Value::String(raw)), Some(value)) =
            (value_at_path(template, &path), value_at_path(merged, &path))
        else {
            continue;
        };
        let Some(marker) = InputMarker::parse(raw) else {
            continue;
        };
        // Unresolved markers are validated by the required-variable check.
        if matches!(value, Value::String(s) if is_input_marker(s)) {
            continue;
        }
        if !marker.allows(value) {
            return Err(InputError::NotAllowed {
                path,
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// Dotted paths (`a.b[0].c`) of every marker leaf in a template.
pub fn marker_paths(template: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    collect_marker_paths(template, String::new(), &mut paths);
    paths
}

fn collect_marker_paths(value: &Value, prefix: String, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                collect_marker_paths(child, path, out);
            }
        }
        Value::Array(items) => {
            for (idx, child) in items.iter().enumerate() {
                collect_marker_paths(child, format!("{prefix}[{idx}]"), out);
            }
        }
        Value::String(s) if is_input_marker(s) => out.push(prefix),
        _ => {}
    }
}

/// Navigate a dotted path with optional array indices (`a.b[0].c`).
pub fn value_at_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for part in path.split('.') {
        let (name, indices) = match part.find('[') {
            Some(bracket) => (&part[..bracket], &part[bracket..]),
            None => (part, ""),
        };
        if !name.is_empty() {
            current = current.get(name)?;
        }
        for index in indices
            .split(']')
            .filter_map(|s| s.strip_prefix('['))
        {
            current = current.get(index.parse::<usize>().ok()?)?;
        }
    }
    Some(current)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    const MARKER: &str = "<+input>.executionInput()";

    /// Flat templates: each key is either a marker leaf or a fixed value.
    fn template_strategy() -> impl Strategy<Value = Vec<(String, bool)>> {
        prop::collection::vec(("[a-z]{1,8}", any::<bool>()), 1..8)
    }

    fn build_template(fields: &[(String, bool)]) -> Value {
        let mut map = Map::new();
        for (key, is_marker) in fields {
            let leaf = if *is_marker {
                json!(MARKER)
            } else {
                json!(format!("fixed-{key}"))
            };
            map.insert(key.clone(), leaf);
        }
        Value::Object(map)
    }

    proptest! {
        /// Property: the merged tree has exactly the template's keys.
        #[test]
        fn merge_preserves_template_shape(
            fields in template_strategy(),
            extra in "[A-Z]{1,8}",
        ) {
            let template = build_template(&fields);
            let mut input = Map::new();
            input.insert(extra.clone(), json!("ignored"));
            let merged = merge_template_with_input(&template, &Value::Object(input));

            let keys = |v: &Value| v.as_object().map(|m| m.keys().cloned().collect::<Vec<_>>());
            prop_assert_eq!(keys(&merged), keys(&template));
            prop_assert!(merged.get(&extra).is_none());
        }

        /// Property: with full input every marker takes the supplied value
        /// and fixed leaves keep the template value.
        #[test]
        fn full_input_fills_every_marker(
            fields in template_strategy(),
            value in "[a-zA-Z0-9 ]{0,16}",
        ) {
            let template = build_template(&fields);
            let input: Map<String, Value> = fields
                .iter()
                .map(|(k, _)| (k.clone(), json!(value.clone())))
                .collect();
            let merged = merge_template_with_input(&template, &Value::Object(input));

            for (key, _) in &fields {
                let expected = match template.get(key) {
                    Some(Value::String(s)) if is_input_marker(s) => json!(value.clone()),
                    Some(other) => other.clone(),
                    None => unreachable!(),
                };
                prop_assert_eq!(merged.get(key), Some(&expected));
            }
            prop_assert!(marker_paths(&merged).is_empty());
        }

        /// Property: with empty input the merge is the identity on marker-only templates.
        #[test]
        fn empty_input_leaves_markers(fields in template_strategy()) {
            let template = build_template(&fields);
            let merged = merge_template_with_input(&template, &json!({}));
            prop_assert_eq!(merged, template);
        }
    }
}
