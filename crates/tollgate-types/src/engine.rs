//! Collaborator traits for the orchestration engine and expression service.
//!
//! The execution-input protocol never owns node executions; it reads them
//! and asks the engine to transition, end, advise or restart them. These
//! traits are defined here so that the protocol crate and engine
//! implementations can depend on them without depending on each other.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::{Ambiance, FailureInfo, NodeExecution, PlanNode, Result, Status};

/// Node-execution operations the execution-input protocol relies on.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    /// Fetch a node execution by id.
    async fn get_node_execution(&self, node_execution_id: &str) -> Result<NodeExecution>;

    /// Fetch the plan node a node execution was created from.
    async fn get_plan_node(&self, plan_node_id: &str) -> Result<PlanNode>;

    /// Conditionally move a node execution to `status`.
    ///
    /// The write only applies when the current status is not in
    /// `excluded`. Returns the updated record, or `None` when the
    /// precondition did not hold.
    async fn update_status_with_ops(
        &self,
        node_execution_id: &str,
        status: Status,
        excluded: &[Status],
    ) -> Result<Option<NodeExecution>>;

    /// Terminate the execution branch owned by the ambiance's node.
    async fn end_node_execution(&self, ambiance: &Ambiance) -> Result<()>;

    /// Queue an advise event so the node's advisers pick the next route.
    async fn queue_advising_event(
        &self,
        node_execution: &NodeExecution,
        failure_info: FailureInfo,
        from_status: Status,
    ) -> Result<()>;

    /// Continue running a node execution that was suspended.
    async fn start_node_execution(&self, ambiance: &Ambiance) -> Result<()>;
}

/// Shared orchestrator type for use across crates.
pub type SharedOrchestrator = Arc<dyn Orchestrator>;

/// Resolves remaining runtime expressions in a merged input map.
pub trait ExpressionResolver: Send + Sync {
    fn resolve(&self, ambiance: &Ambiance, value: &Value) -> Result<Value>;
}

/// Shared resolver type for use across crates.
pub type SharedResolver = Arc<dyn ExpressionResolver>;
