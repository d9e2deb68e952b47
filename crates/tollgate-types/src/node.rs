//! Node executions and their static plan definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Ambiance, FailureInfo, Status};

/// Kind of adviser a plan node declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdviserType {
    /// Continue with the template's default values when input never arrives.
    ProceedWithDefaultValue,
    NextStep,
    OnSuccess,
    OnFail,
    Retry,
    ManualIntervention,
    Ignore,
    Abort,
    MarkSuccess,
}

/// An adviser declared on a plan node, with its opaque parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdviserObtainment {
    pub adviser_type: AdviserType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
}

impl AdviserObtainment {
    pub fn new(adviser_type: AdviserType) -> Self {
        Self {
            adviser_type,
            parameters: None,
        }
    }
}

/// Static definition of a node from the compiled plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanNode {
    pub uuid: String,
    pub identifier: String,
    #[serde(default)]
    pub adviser_obtainments: Vec<AdviserObtainment>,
    /// YAML fragment whose marker leaves are resolved at runtime.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_input_template: Option<String>,
}

impl PlanNode {
    pub fn new(uuid: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            identifier: identifier.into(),
            adviser_obtainments: Vec::new(),
            execution_input_template: None,
        }
    }

    pub fn with_adviser(mut self, adviser_type: AdviserType) -> Self {
        self.adviser_obtainments
            .push(AdviserObtainment::new(adviser_type));
        self
    }

    /// Whether the node falls back to default values when its input wait expires.
    pub fn proceeds_with_default_value(&self) -> bool {
        self.adviser_obtainments
            .iter()
            .any(|o| o.adviser_type == AdviserType::ProceedWithDefaultValue)
    }
}

/// A single running (or finished) instance of a plan node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeExecution {
    pub uuid: String,
    pub plan_node_id: String,
    pub ambiance: Ambiance,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_info: Option<FailureInfo>,
    pub updated_at: DateTime<Utc>,
}

impl NodeExecution {
    pub fn new(
        uuid: impl Into<String>,
        plan_node_id: impl Into<String>,
        ambiance: Ambiance,
        status: Status,
    ) -> Self {
        Self {
            uuid: uuid.into(),
            plan_node_id: plan_node_id.into(),
            ambiance,
            status,
            failure_info: None,
            updated_at: Utc::now(),
        }
    }
}
