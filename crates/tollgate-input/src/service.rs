//! Execution-input service: lookup, persistence and user-driven continuation.

use serde_json::Value;
use tollgate_types::{SharedOrchestrator, SharedResolver};
use tracing::{debug, info, warn};

use crate::instance::ExecutionInputInstance;
use crate::required;
use crate::storage::SharedInputStorage;
use crate::template::{marker_paths, merge_template_with_input, parse_yaml, validate_allowed_values};
use crate::wait_notify::WaitNotifyEngine;
use crate::{InputError, Result};

/// Entry point for reading and completing execution-input instances.
#[derive(Clone)]
pub struct ExecutionInputService {
    storage: SharedInputStorage,
    resolver: SharedResolver,
    wait_notify: WaitNotifyEngine,
    orchestrator: SharedOrchestrator,
}

impl ExecutionInputService {
    pub fn new(
        storage: SharedInputStorage,
        resolver: SharedResolver,
        wait_notify: WaitNotifyEngine,
        orchestrator: SharedOrchestrator,
    ) -> Self {
        Self {
            storage,
            resolver,
            wait_notify,
            orchestrator,
        }
    }

    pub fn storage(&self) -> &SharedInputStorage {
        &self.storage
    }

    pub fn wait_notify(&self) -> &WaitNotifyEngine {
        &self.wait_notify
    }

    pub fn get_execution_input_instance(
        &self,
        node_execution_id: &str,
    ) -> Result<Option<ExecutionInputInstance>> {
        self.storage.get_by_node_execution_id(node_execution_id)
    }

    /// Batch lookup; the result is ordered by node execution id and omits unknown ids.
    pub fn get_execution_input_instances(
        &self,
        node_execution_ids: &[String],
    ) -> Result<Vec<ExecutionInputInstance>> {
        self.storage.list_by_node_execution_ids(node_execution_ids)
    }

    pub fn save(&self, instance: ExecutionInputInstance) -> Result<ExecutionInputInstance> {
        self.storage.save(&instance)?;
        debug!(
            node_execution_id = %instance.node_execution_id,
            input_instance_id = %instance.input_instance_id,
            "Saved execution input instance"
        );
        Ok(instance)
    }

    /// Template YAML of the node's pending instance, for rendering an input form.
    pub fn get_execution_input_template(&self, node_execution_id: &str) -> Result<String> {
        match self.storage.get_by_node_execution_id(node_execution_id)? {
            Some(instance) if instance.is_pending() => Ok(instance.template),
            Some(_) => Err(InputError::InvalidRequest(format!(
                "execution input for node execution {node_execution_id} is no longer pending"
            ))),
            None => Err(InputError::InvalidRequest(format!(
                "no execution input for node execution {node_execution_id}"
            ))),
        }
    }

    /// Accept user input for a waiting node and wake its continuation.
    ///
    /// Returns `Ok(false)` when the input cannot be merged or its
    /// expressions cannot be resolved; nothing is persisted in that case
    /// and the caller may retry. Fails with [`InputError::InvalidRequest`]
    /// when no pending instance exists for the node, including when the
    /// wait already timed out or another submission won.
    pub async fn continue_execution(
        &self,
        node_execution_id: &str,
        user_input_yaml: &str,
    ) -> Result<bool> {
        let instance = match self.storage.get_by_node_execution_id(node_execution_id)? {
            Some(instance) if instance.is_pending() => instance,
            Some(instance) => {
                return Err(InputError::InvalidRequest(format!(
                    "execution input for node execution {node_execution_id} is already {}",
                    instance.state
                )));
            }
            None => {
                return Err(InputError::InvalidRequest(format!(
                    "no execution input for node execution {node_execution_id}"
                )));
            }
        };

        let (template, user_input) =
            match (parse_yaml(&instance.template), parse_yaml(user_input_yaml)) {
                (Ok(template), Ok(user_input)) => (template, user_input),
                (Err(e), _) | (_, Err(e)) => {
                    warn!(node_execution_id, error = %e, "Could not parse execution input");
                    return Ok(false);
                }
            };
        let merged = merge_template_with_input(&template, &user_input);
        validate_allowed_values(&template, &merged)?;

        let node_execution = self.orchestrator.get_node_execution(node_execution_id).await?;
        let merged = match self.resolver.resolve(&node_execution.ambiance, &merged) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(node_execution_id, error = %e, "Could not resolve execution input expressions");
                return Ok(false);
            }
        };

        if !self
            .storage
            .resolve(&instance.input_instance_id, &merged, user_input_yaml)?
        {
            return Err(InputError::InvalidRequest(format!(
                "execution input for node execution {node_execution_id} was already settled"
            )));
        }

        let signalled = self
            .wait_notify
            .done_with(&instance.input_instance_id, merged);
        info!(
            node_execution_id,
            input_instance_id = %instance.input_instance_id,
            fields = marker_paths(&template).len(),
            signalled,
            "Execution input accepted"
        );
        Ok(true)
    }

    /// Remove instances owned by the given node executions. Unknown ids are ignored.
    pub fn delete_execution_input_instance_for_given_node_execution_ids(
        &self,
        node_execution_ids: &[String],
    ) -> Result<usize> {
        let deleted = self.storage.delete_by_node_execution_ids(node_execution_ids)?;
        debug!(
            requested = node_execution_ids.len(),
            deleted, "Deleted execution input instances"
        );
        Ok(deleted)
    }

    pub fn check_value_for_required_variables_provided(
        &self,
        field_yaml: &str,
        execution_input_yaml: &str,
        is_partial: bool,
    ) -> Result<()> {
        required::check_value_for_required_variables_provided(
            field_yaml,
            execution_input_yaml,
            is_partial,
        )
    }
}

impl std::fmt::Debug for ExecutionInputService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionInputService")
            .field("wait_notify", &self.wait_notify)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use tollgate_types::{Ambiance, NodeExecution, Status};

    use super::*;
    use crate::engine::InMemoryOrchestrator;
    use crate::expression::AmbianceResolver;
    use crate::instance::InputInstanceState;
    use crate::storage::MockInputStorage;

    const TEMPLATE: &str = "a: <+input>.executionInput()\nb: <+input>.default(7).executionInput()\n";

    fn service() -> ExecutionInputService {
        let orchestrator = Arc::new(InMemoryOrchestrator::new());
        let ambiance = Ambiance::new("plan", "acc", "org", "proj").with_node_execution("n1");
        orchestrator.insert_node_execution(NodeExecution::new(
            "n1",
            "p1",
            ambiance,
            Status::InputWaiting,
        ));
        ExecutionInputService::new(
            Arc::new(MockInputStorage::new()),
            Arc::new(AmbianceResolver),
            WaitNotifyEngine::current(),
            orchestrator,
        )
    }

    #[tokio::test]
    async fn test_continue_persists_merged_map() {
        let service = service();
        service
            .save(ExecutionInputInstance::new("n1", TEMPLATE, ""))
            .unwrap();

        assert!(service
            .continue_execution("n1", "a: <+project.identifier>")
            .await
            .unwrap());

        let stored = service.get_execution_input_instance("n1").unwrap().unwrap();
        assert_eq!(stored.state, InputInstanceState::Resolved);
        assert_eq!(stored.merged_input_template, Some(json!({"a": "proj", "b": 7})));
        assert_eq!(stored.user_input.as_deref(), Some("a: <+project.identifier>"));
    }

    #[tokio::test]
    async fn test_continue_twice_is_rejected() {
        let service = service();
        service
            .save(ExecutionInputInstance::new("n1", TEMPLATE, ""))
            .unwrap();
        assert!(service.continue_execution("n1", "a: 1").await.unwrap());

        let err = service.continue_execution("n1", "a: 2").await.unwrap_err();
        assert!(matches!(err, InputError::InvalidRequest(_)));
        let stored = service.get_execution_input_instance("n1").unwrap().unwrap();
        assert_eq!(stored.merged_input_template, Some(json!({"a": 1, "b": 7})));
    }

    #[tokio::test]
    async fn test_continue_without_instance() {
        let service = service();
        let err = service.continue_execution("n1", "a: 1").await.unwrap_err();
        assert!(matches!(err, InputError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_malformed_input_returns_false() {
        let service = service();
        service
            .save(ExecutionInputInstance::new("n1", TEMPLATE, ""))
            .unwrap();

        assert!(!service.continue_execution("n1", "a: [oops").await.unwrap());
        assert!(!service
            .continue_execution("n1", "a: \"<+unterminated\"")
            .await
            .unwrap());

        let stored = service.get_execution_input_instance("n1").unwrap().unwrap();
        assert!(stored.is_pending());
        assert!(stored.merged_input_template.is_none());
    }

    #[tokio::test]
    async fn test_allowed_values_enforced() {
        let service = service();
        let template = "env: <+input>.allowedValues(dev,prod).executionInput()";
        service
            .save(ExecutionInputInstance::new("n1", template, ""))
            .unwrap();

        let err = service.continue_execution("n1", "env: qa").await.unwrap_err();
        assert!(matches!(err, InputError::NotAllowed { .. }));
        assert!(service.continue_execution("n1", "env: prod").await.unwrap());
    }

    #[tokio::test]
    async fn test_template_lookup() {
        let service = service();
        service
            .save(ExecutionInputInstance::new("n1", TEMPLATE, ""))
            .unwrap();
        assert_eq!(service.get_execution_input_template("n1").unwrap(), TEMPLATE);
        assert!(service.get_execution_input_template("n2").is_err());
    }

    #[tokio::test]
    async fn test_lookup_is_idempotent() {
        let service = service();
        let saved = service
            .save(ExecutionInputInstance::new("n1", TEMPLATE, ""))
            .unwrap();
        let first = service.get_execution_input_instance("n1").unwrap();
        let second = service.get_execution_input_instance("n1").unwrap();
        assert_eq!(first, second);
        assert_eq!(first.unwrap(), saved);
    }

    #[tokio::test]
    async fn test_delete_then_continue() {
        let service = service();
        service
            .save(ExecutionInputInstance::new("n1", TEMPLATE, ""))
            .unwrap();
        let ids = vec!["n1".to_string()];
        assert_eq!(
            service
                .delete_execution_input_instance_for_given_node_execution_ids(&ids)
                .unwrap(),
            1
        );
        assert_eq!(
            service
                .delete_execution_input_instance_for_given_node_execution_ids(&ids)
                .unwrap(),
            0
        );
        assert!(service.continue_execution("n1", "a: 1").await.is_err());
    }
}
