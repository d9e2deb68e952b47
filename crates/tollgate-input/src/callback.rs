//! Continuation run when an execution-input wait settles.
//!
//! Both settle paths end in engine calls. When those calls still fail
//! after [`with_retries`], the callback parks itself again on the same
//! correlation id with a short deadline, so the re-fired timeout picks the
//! work up from the instance's stored state: `Resolved` resumes the node,
//! `Expired` finishes the expiry.

use std::sync::Arc;

use async_trait::async_trait;
use tollgate_types::{Ambiance, FailureInfo, NodeExecution, PlanNode, SharedOrchestrator, Status};
use tracing::{debug, error, info, warn};

use crate::executor::{ResumeExecutor, WaitConfig, with_retries};
use crate::instance::InputInstanceState;
use crate::storage::SharedInputStorage;
use crate::template::merge_yaml;
use crate::wait_notify::{NotifyCallback, ResponseData, WaitNotifyEngine};
use crate::{InputError, Result};

/// Resumes a node once input arrives, or expires it when the wait times out.
#[derive(Clone)]
pub struct WaitForInputCallback {
    node_execution_id: String,
    input_instance_id: String,
    ambiance: Ambiance,
    orchestrator: SharedOrchestrator,
    storage: SharedInputStorage,
    wait_notify: WaitNotifyEngine,
    executor: ResumeExecutor,
    config: WaitConfig,
}

impl WaitForInputCallback {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        node_execution_id: impl Into<String>,
        input_instance_id: impl Into<String>,
        ambiance: Ambiance,
        orchestrator: SharedOrchestrator,
        storage: SharedInputStorage,
        wait_notify: WaitNotifyEngine,
        executor: ResumeExecutor,
        config: WaitConfig,
    ) -> Self {
        Self {
            node_execution_id: node_execution_id.into(),
            input_instance_id: input_instance_id.into(),
            ambiance,
            orchestrator,
            storage,
            wait_notify,
            executor,
            config,
        }
    }

    pub fn node_execution_id(&self) -> &str {
        &self.node_execution_id
    }

    pub fn input_instance_id(&self) -> &str {
        &self.input_instance_id
    }

    /// Move the node `InputWaiting -> Running` and restart it.
    ///
    /// Returns `false` when the node was no longer waiting, which is how
    /// concurrent resumes of the same node collapse into one.
    pub async fn resume(&self) -> Result<bool> {
        let not_waiting = Status::all_except(Status::InputWaiting);
        let not_waiting = not_waiting.as_slice();
        let updated = with_retries("update_status_with_ops", &self.config, || {
            self.orchestrator.update_status_with_ops(
                &self.node_execution_id,
                Status::Running,
                not_waiting,
            )
        })
        .await?;

        if updated.is_none() {
            debug!(
                node_execution_id = %self.node_execution_id,
                "Node no longer waiting for input; skipping resume"
            );
            return Ok(false);
        }

        with_retries("start_node_execution", &self.config, || {
            self.orchestrator.start_node_execution(&self.ambiance)
        })
        .await?;

        info!(
            node_execution_id = %self.node_execution_id,
            input_instance_id = %self.input_instance_id,
            "Resumed node after execution input"
        );
        Ok(true)
    }

    /// Park this callback again so a failed settle is retried.
    ///
    /// Non-transient failures are logged and dropped.
    pub(crate) fn requeue(&self, operation: &str, e: &InputError) {
        if !e.is_transient() {
            error!(
                node_execution_id = %self.node_execution_id,
                input_instance_id = %self.input_instance_id,
                operation,
                error = %e,
                "Giving up on execution input wait"
            );
            return;
        }
        let delay = self.config.requeue_delay();
        warn!(
            node_execution_id = %self.node_execution_id,
            input_instance_id = %self.input_instance_id,
            operation,
            error = %e,
            retry_in_ms = delay.as_millis() as u64,
            "Execution input wait failed; requeued"
        );
        self.wait_notify.wait_for_all_on(
            Arc::new(self.clone()),
            std::slice::from_ref(&self.input_instance_id),
            delay,
        );
    }

    async fn expire(&self) -> Result<()> {
        let retrying = match self.storage.get_by_instance_id(&self.input_instance_id)? {
            None => {
                debug!(
                    input_instance_id = %self.input_instance_id,
                    "Execution input instance deleted before timeout"
                );
                return Ok(());
            }
            Some(instance) => match instance.state {
                InputInstanceState::Resolved => {
                    info!(
                        node_execution_id = %self.node_execution_id,
                        "Execution input arrived as the wait timed out; resuming"
                    );
                    return self.resume().await.map(|_| ());
                }
                InputInstanceState::Pending => false,
                // Claimed by an earlier attempt whose engine calls failed
                InputInstanceState::Expired => true,
            },
        };

        let node_execution = with_retries("get_node_execution", &self.config, || {
            self.orchestrator.get_node_execution(&self.node_execution_id)
        })
        .await?;
        let plan_node = with_retries("get_plan_node", &self.config, || {
            self.orchestrator.get_plan_node(&node_execution.plan_node_id)
        })
        .await?;

        if plan_node.proceeds_with_default_value() {
            return self.proceed_with_defaults(&plan_node).await;
        }

        if !retrying && !self.storage.expire(&self.input_instance_id)? {
            // Lost the claim between the read above and now
            return match self.storage.get_by_instance_id(&self.input_instance_id)? {
                Some(instance) if instance.state == InputInstanceState::Resolved => {
                    self.resume().await.map(|_| ())
                }
                _ => Ok(()),
            };
        }

        self.finish_expiry(node_execution, &plan_node, retrying).await
    }

    /// Leave the node to its default-value adviser, recording the template
    /// defaults as the instance's merged input.
    async fn proceed_with_defaults(&self, plan_node: &PlanNode) -> Result<()> {
        let Some(instance) = self.storage.get_by_instance_id(&self.input_instance_id)? else {
            return Ok(());
        };
        if instance.is_pending() {
            let defaults = merge_yaml(&instance.template, "")?;
            if self.storage.resolve(&self.input_instance_id, &defaults, "")? {
                info!(
                    node_execution_id = %self.node_execution_id,
                    plan_node = %plan_node.identifier,
                    "Execution input timed out; proceeding with default values"
                );
                return Ok(());
            }
        }
        match self.storage.get_by_instance_id(&self.input_instance_id)? {
            Some(instance) if instance.state == InputInstanceState::Resolved => {
                self.resume().await.map(|_| ())
            }
            _ => Ok(()),
        }
    }

    async fn finish_expiry(
        &self,
        node_execution: NodeExecution,
        plan_node: &PlanNode,
        retrying: bool,
    ) -> Result<()> {
        let updated = if retrying && node_execution.status == Status::Expired {
            Some(node_execution)
        } else {
            with_retries("update_status_with_ops", &self.config, || {
                self.orchestrator.update_status_with_ops(
                    &self.node_execution_id,
                    Status::Expired,
                    Status::final_statuses(),
                )
            })
            .await?
        };

        let Some(updated) = updated else {
            debug!(
                node_execution_id = %self.node_execution_id,
                "Node already finished; ignoring input timeout"
            );
            return Ok(());
        };

        if plan_node.adviser_obtainments.is_empty() {
            with_retries("end_node_execution", &self.config, || {
                self.orchestrator.end_node_execution(&updated.ambiance)
            })
            .await?;
            info!(node_execution_id = %self.node_execution_id, "Execution input expired; ended node");
        } else {
            with_retries("queue_advising_event", &self.config, || {
                self.orchestrator.queue_advising_event(
                    &updated,
                    FailureInfo::input_timeout(),
                    Status::InputWaiting,
                )
            })
            .await?;
            info!(
                node_execution_id = %self.node_execution_id,
                advisers = plan_node.adviser_obtainments.len(),
                "Execution input expired; routed timeout to advisers"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl NotifyCallback for WaitForInputCallback {
    async fn notify(&self, _response: ResponseData) {
        let this = self.clone();
        self.executor.spawn(async move {
            if let Err(e) = this.resume().await {
                this.requeue("resume", &e);
            }
        });
    }

    async fn notify_timeout(&self) {
        if let Err(e) = self.expire().await {
            self.requeue("expire", &e);
        }
    }

    async fn notify_error(&self, _response: ResponseData) {
        unimplemented!("execution input waits do not report errors")
    }
}
