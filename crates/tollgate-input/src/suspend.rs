//! Parking a running node until its execution input arrives.

use std::sync::Arc;
use std::time::Duration;

use tollgate_types::{Ambiance, SharedOrchestrator, Status};
use tracing::{debug, info};

use crate::callback::WaitForInputCallback;
use crate::executor::{ResumeExecutor, WaitConfig, with_retries};
use crate::instance::{ExecutionInputInstance, InputInstanceState};
use crate::service::ExecutionInputService;
use crate::Result;

/// Suspends node executions on an execution-input wait.
#[derive(Clone)]
pub struct WaitForInputHelper {
    service: ExecutionInputService,
    orchestrator: SharedOrchestrator,
    executor: ResumeExecutor,
    config: WaitConfig,
}

impl WaitForInputHelper {
    pub fn new(
        service: ExecutionInputService,
        orchestrator: SharedOrchestrator,
        executor: ResumeExecutor,
        config: WaitConfig,
    ) -> Self {
        Self {
            service,
            orchestrator,
            executor,
            config,
        }
    }

    pub fn config(&self) -> &WaitConfig {
        &self.config
    }

    /// Persist a pending instance, register its wait and mark the node
    /// `InputWaiting`. Returns the instance's correlation id without
    /// waiting for input.
    ///
    /// `timeout` defaults to the configured wait timeout.
    pub async fn wait_for_execution_input(
        &self,
        ambiance: &Ambiance,
        node_execution_id: &str,
        template: &str,
        field_yaml: &str,
        timeout: Option<Duration>,
    ) -> Result<String> {
        let instance = self.service.save(ExecutionInputInstance::new(
            node_execution_id,
            template,
            field_yaml,
        ))?;
        let input_instance_id = instance.input_instance_id;

        let mut ambiance = ambiance.clone();
        if ambiance.node_execution_id.is_empty() {
            ambiance.node_execution_id = node_execution_id.to_string();
        }
        let callback = Arc::new(WaitForInputCallback::new(
            node_execution_id,
            input_instance_id.clone(),
            ambiance,
            Arc::clone(&self.orchestrator),
            Arc::clone(self.service.storage()),
            self.service.wait_notify().clone(),
            self.executor.clone(),
            self.config.clone(),
        ));
        let timeout = timeout.unwrap_or(self.config.default_timeout);
        self.service.wait_notify().wait_for_all_on(
            callback.clone(),
            std::slice::from_ref(&input_instance_id),
            timeout,
        );

        let updated = with_retries("update_status_with_ops", &self.config, || {
            self.orchestrator.update_status_with_ops(
                node_execution_id,
                Status::InputWaiting,
                Status::final_statuses(),
            )
        })
        .await;
        let updated = match updated {
            Ok(updated) => updated,
            Err(e) => {
                self.service.wait_notify().cancel(&input_instance_id);
                self.service
                    .storage()
                    .delete_by_node_execution_ids(&[node_execution_id.to_string()])?;
                return Err(e.into());
            }
        };
        if updated.is_none() {
            debug!(node_execution_id, "Node already finished; not marking InputWaiting");
        }

        // Input may have been accepted before the node was marked waiting,
        // in which case the engine's resume found nothing to resume.
        if let Some(current) = self.service.storage().get_by_instance_id(&input_instance_id)?
            && current.state == InputInstanceState::Resolved
            && let Err(e) = callback.resume().await
        {
            callback.requeue("resume", &e);
        }

        info!(
            node_execution_id,
            input_instance_id = %input_instance_id,
            timeout_secs = timeout.as_secs(),
            "Waiting for execution input"
        );
        Ok(input_instance_id)
    }
}
