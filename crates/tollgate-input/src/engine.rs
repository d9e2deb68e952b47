//! In-memory orchestration engine.
//!
//! Keeps node executions and plan nodes in maps and records every
//! side effect the execution-input protocol asks for, so embedders and
//! tests can drive the protocol without a real engine.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tollgate_types::{
    Ambiance, Error, FailureInfo, NodeExecution, Orchestrator, PlanNode, Result, Status,
};
use tracing::debug;

/// Side effect requested from the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StatusChanged {
        node_execution_id: String,
        from: Status,
        to: Status,
    },
    Ended {
        node_execution_id: String,
    },
    Advised {
        node_execution_id: String,
        failure_info: FailureInfo,
        from_status: Status,
    },
    Started {
        node_execution_id: String,
    },
}

#[derive(Default)]
struct State {
    node_executions: HashMap<String, NodeExecution>,
    plan_nodes: HashMap<String, PlanNode>,
    events: Vec<EngineEvent>,
    // Calls left to fail with a transient error
    failures_remaining: u32,
}

/// [`Orchestrator`] backed by in-process maps.
#[derive(Default)]
pub struct InMemoryOrchestrator {
    state: Mutex<State>,
}

impl InMemoryOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_plan_node(&self, plan_node: PlanNode) {
        self.state
            .lock()
            .plan_nodes
            .insert(plan_node.uuid.clone(), plan_node);
    }

    pub fn insert_node_execution(&self, node_execution: NodeExecution) {
        self.state
            .lock()
            .node_executions
            .insert(node_execution.uuid.clone(), node_execution);
    }

    /// Current status of a node execution.
    pub fn node_status(&self, node_execution_id: &str) -> Option<Status> {
        self.state
            .lock()
            .node_executions
            .get(node_execution_id)
            .map(|n| n.status)
    }

    /// Side effects recorded so far, oldest first.
    pub fn events(&self) -> Vec<EngineEvent> {
        self.state.lock().events.clone()
    }

    /// Make the next `count` mutating calls fail with a transient error.
    pub fn fail_next(&self, count: u32) {
        self.state.lock().failures_remaining = count;
    }

    fn check_available(state: &mut State) -> Result<()> {
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(Error::Orchestration("engine unavailable".to_string()));
        }
        Ok(())
    }

    fn node_id(ambiance: &Ambiance) -> Result<String> {
        if ambiance.node_execution_id.is_empty() {
            return Err(Error::Orchestration(
                "ambiance has no node execution".to_string(),
            ));
        }
        Ok(ambiance.node_execution_id.clone())
    }
}

#[async_trait]
impl Orchestrator for InMemoryOrchestrator {
    async fn get_node_execution(&self, node_execution_id: &str) -> Result<NodeExecution> {
        self.state
            .lock()
            .node_executions
            .get(node_execution_id)
            .cloned()
            .ok_or_else(|| Error::NodeExecutionNotFound(node_execution_id.to_string()))
    }

    async fn get_plan_node(&self, plan_node_id: &str) -> Result<PlanNode> {
        self.state
            .lock()
            .plan_nodes
            .get(plan_node_id)
            .cloned()
            .ok_or_else(|| Error::PlanNodeNotFound(plan_node_id.to_string()))
    }

    async fn update_status_with_ops(
        &self,
        node_execution_id: &str,
        status: Status,
        excluded: &[Status],
    ) -> Result<Option<NodeExecution>> {
        let mut state = self.state.lock();
        Self::check_available(&mut state)?;

        let Some(node) = state.node_executions.get_mut(node_execution_id) else {
            return Err(Error::NodeExecutionNotFound(node_execution_id.to_string()));
        };
        if excluded.contains(&node.status) {
            debug!(
                node_execution_id,
                current = %node.status,
                requested = %status,
                "Status update precondition not met"
            );
            return Ok(None);
        }

        let from = node.status;
        node.status = status;
        node.updated_at = Utc::now();
        let updated = node.clone();
        state.events.push(EngineEvent::StatusChanged {
            node_execution_id: node_execution_id.to_string(),
            from,
            to: status,
        });
        Ok(Some(updated))
    }

    async fn end_node_execution(&self, ambiance: &Ambiance) -> Result<()> {
        let node_execution_id = Self::node_id(ambiance)?;
        let mut state = self.state.lock();
        Self::check_available(&mut state)?;
        state.events.push(EngineEvent::Ended { node_execution_id });
        Ok(())
    }

    async fn queue_advising_event(
        &self,
        node_execution: &NodeExecution,
        failure_info: FailureInfo,
        from_status: Status,
    ) -> Result<()> {
        let mut state = self.state.lock();
        Self::check_available(&mut state)?;
        if let Some(node) = state.node_executions.get_mut(&node_execution.uuid) {
            node.failure_info = Some(failure_info.clone());
        }
        state.events.push(EngineEvent::Advised {
            node_execution_id: node_execution.uuid.clone(),
            failure_info,
            from_status,
        });
        Ok(())
    }

    async fn start_node_execution(&self, ambiance: &Ambiance) -> Result<()> {
        let node_execution_id = Self::node_id(ambiance)?;
        let mut state = self.state.lock();
        Self::check_available(&mut state)?;
        state.events.push(EngineEvent::Started { node_execution_id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_node(status: Status) -> InMemoryOrchestrator {
        let engine = InMemoryOrchestrator::new();
        let ambiance = Ambiance::new("plan", "acc", "org", "proj").with_node_execution("n1");
        engine.insert_node_execution(NodeExecution::new("n1", "p1", ambiance, status));
        engine
    }

    #[tokio::test]
    async fn test_conditional_update() {
        let engine = engine_with_node(Status::Running);

        let updated = engine
            .update_status_with_ops("n1", Status::InputWaiting, Status::final_statuses())
            .await
            .unwrap();
        assert_eq!(updated.unwrap().status, Status::InputWaiting);

        engine
            .update_status_with_ops("n1", Status::Aborted, &[])
            .await
            .unwrap();
        let skipped = engine
            .update_status_with_ops("n1", Status::Expired, Status::final_statuses())
            .await
            .unwrap();
        assert!(skipped.is_none());
        assert_eq!(engine.node_status("n1"), Some(Status::Aborted));
        assert_eq!(engine.events().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_records() {
        let engine = InMemoryOrchestrator::new();
        assert!(matches!(
            engine.get_node_execution("x").await,
            Err(Error::NodeExecutionNotFound(_))
        ));
        assert!(matches!(
            engine.get_plan_node("x").await,
            Err(Error::PlanNodeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_fail_next() {
        let engine = engine_with_node(Status::Running);
        engine.fail_next(1);
        let ambiance = engine.get_node_execution("n1").await.unwrap().ambiance;

        assert!(matches!(
            engine.start_node_execution(&ambiance).await,
            Err(Error::Orchestration(_))
        ));
        engine.start_node_execution(&ambiance).await.unwrap();
        assert_eq!(
            engine.events(),
            vec![EngineEvent::Started {
                node_execution_id: "n1".to_string()
            }]
        );
    }
}
