use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Resolution state of an execution-input instance.
///
/// `Pending` is the only state that accepts input; both other states are
/// terminal and are reached through a compare-and-set in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputInstanceState {
    Pending,
    Resolved,
    Expired,
}

impl InputInstanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "resolved" => Some(Self::Resolved),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }
}

impl std::fmt::Display for InputInstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending (or settled) request for human-supplied execution input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionInputInstance {
    /// Correlation id used with the wait/notify engine.
    pub input_instance_id: String,
    pub node_execution_id: String,
    /// YAML fragment whose `<+input>` leaves are supplied at runtime.
    pub template: String,
    /// Rendered YAML of the owning node; source of `required` declarations.
    pub field_yaml: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_input_template: Option<Value>,
    /// Raw YAML accepted when the instance was resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_input: Option<String>,
    pub state: InputInstanceState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExecutionInputInstance {
    /// Create a pending instance with a freshly generated correlation id.
    pub fn new(
        node_execution_id: impl Into<String>,
        template: impl Into<String>,
        field_yaml: impl Into<String>,
    ) -> Self {
        Self::with_id(
            Uuid::new_v4().to_string(),
            node_execution_id,
            template,
            field_yaml,
        )
    }

    pub fn with_id(
        input_instance_id: impl Into<String>,
        node_execution_id: impl Into<String>,
        template: impl Into<String>,
        field_yaml: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            input_instance_id: input_instance_id.into(),
            node_execution_id: node_execution_id.into(),
            template: template.into(),
            field_yaml: field_yaml.into(),
            merged_input_template: None,
            user_input: None,
            state: InputInstanceState::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == InputInstanceState::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_instance_is_pending() {
        let instance = ExecutionInputInstance::new("node-1", "a: b", "");
        assert!(instance.is_pending());
        assert!(instance.merged_input_template.is_none());
        assert!(Uuid::parse_str(&instance.input_instance_id).is_ok());
    }

    #[test]
    fn test_state_parse() {
        for state in [
            InputInstanceState::Pending,
            InputInstanceState::Resolved,
            InputInstanceState::Expired,
        ] {
            assert_eq!(InputInstanceState::parse(state.as_str()), Some(state));
        }
        assert_eq!(InputInstanceState::parse("bogus"), None);
    }
}
