//! Required-variable validation for execution input.
//!
//! Variables are declared in the node's rendered YAML under `variables`
//! lists:
//!
//! ```yaml
//! stage:
//!   variables:
//!     - name: var1
//!       type: String
//!       value: <+input>.default(1234).executionInput()
//!       required: true
//! ```
//!
//! The execution-input YAML mirrors that shape; supplied values are matched
//! by variable name within the `variables` list at the same parent path.

use serde_json::Value;

use crate::error::{InputError, Result};
use crate::template::{InputMarker, is_input_marker, parse_yaml};

const VARIABLES_KEY: &str = "variables";

/// Fail when a required variable that uses the input marker was not supplied.
///
/// With `is_partial`, variables whose marker declares `.default(...)` may be
/// left blank (the default applies). Non-required variables are never checked.
pub fn check_value_for_required_variables_provided(
    field_yaml: &str,
    execution_input_yaml: &str,
    is_partial: bool,
) -> Result<()> {
    let fields = parse_yaml(field_yaml)?;
    let supplied = parse_yaml(execution_input_yaml)?;
    check_node(&fields, Some(&supplied), is_partial)
}

fn check_node(fields: &Value, supplied: Option<&Value>, is_partial: bool) -> Result<()> {
    match fields {
        Value::Object(map) => {
            for (key, child) in map {
                let supplied_child = supplied.and_then(|s| s.get(key));
                if key == VARIABLES_KEY
                    && let Value::Array(declarations) = child
                {
                    check_variables(declarations, supplied_child, is_partial)?;
                    continue;
                }
                check_node(child, supplied_child, is_partial)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for (idx, child) in items.iter().enumerate() {
                check_node(child, supplied.and_then(|s| s.get(idx)), is_partial)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn check_variables(
    declarations: &[Value],
    supplied: Option<&Value>,
    is_partial: bool,
) -> Result<()> {
    for declaration in declarations {
        let Some(name) = declaration.get("name").and_then(Value::as_str) else {
            continue;
        };
        if !is_required(declaration) {
            continue;
        }
        let Some(marker) = declaration
            .get("value")
            .and_then(Value::as_str)
            .and_then(InputMarker::parse)
        else {
            continue;
        };

        let provided = supplied_value(supplied, name);
        if !is_blank(provided) {
            continue;
        }

        if !marker.has_default() {
            return Err(InputError::RequiredValueMissing {
                name: name.to_string(),
            });
        }
        if !is_partial {
            return Err(InputError::RequiredDefaultMissing {
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

fn is_required(declaration: &Value) -> bool {
    match declaration.get("required") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Find `value` of the supplied variable with the given name.
fn supplied_value<'a>(supplied: Option<&'a Value>, name: &str) -> Option<&'a Value> {
    supplied?
        .as_array()?
        .iter()
        .find(|v| v.get("name").and_then(Value::as_str) == Some(name))?
        .get("value")
}

/// Missing, null, whitespace-only and still-unresolved marker values are blank.
fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty() || is_input_marker(s),
        Some(_) => false,
    }
}
