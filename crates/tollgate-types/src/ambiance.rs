//! Execution context carried alongside every node execution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifiers and expression scope of a running node execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ambiance {
    pub plan_execution_id: String,
    pub account_id: String,
    pub org_id: String,
    pub project_id: String,
    /// Node execution this ambiance belongs to.
    pub node_execution_id: String,
    /// Additional expression values keyed by dotted path
    /// (e.g. `pipeline.variables.region`).
    #[serde(default)]
    pub expressions: BTreeMap<String, Value>,
}

impl Ambiance {
    pub fn new(
        plan_execution_id: impl Into<String>,
        account_id: impl Into<String>,
        org_id: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            plan_execution_id: plan_execution_id.into(),
            account_id: account_id.into(),
            org_id: org_id.into(),
            project_id: project_id.into(),
            ..Default::default()
        }
    }

    /// Scope this ambiance to a specific node execution.
    pub fn with_node_execution(mut self, node_execution_id: impl Into<String>) -> Self {
        self.node_execution_id = node_execution_id.into();
        self
    }

    /// Add an expression value available to `<+path>` lookups.
    pub fn with_expression(mut self, path: impl Into<String>, value: Value) -> Self {
        self.expressions.insert(path.into(), value);
        self
    }

    /// Look up a dotted expression path.
    ///
    /// Built-in identifiers take precedence over `expressions`.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let builtin = match path {
            "account.identifier" | "account.accountId" => Some(&self.account_id),
            "org.identifier" => Some(&self.org_id),
            "project.identifier" => Some(&self.project_id),
            "pipeline.executionId" => Some(&self.plan_execution_id),
            _ => None,
        };
        match builtin {
            Some(v) => Some(Value::String(v.clone())),
            None => self.expressions.get(path).cloned(),
        }
    }
}
