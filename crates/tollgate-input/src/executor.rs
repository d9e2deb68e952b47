//! Background execution for resume work and retry policy for engine calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tollgate_config::WaitSection;
use tracing::warn;

/// Runtime knobs for waiting, resuming and retrying.
#[derive(Debug, Clone)]
pub struct WaitConfig {
    /// Deadline used when the caller does not supply one.
    pub default_timeout: Duration,
    /// Attempts per orchestrator call (at least one is always made).
    pub max_retries: u32,
    /// Base delay between attempts; attempt `n` waits `n * retry_backoff`.
    pub retry_backoff: Duration,
    /// Maximum resume callbacks running at once.
    pub resume_concurrency: usize,
}

impl WaitConfig {
    /// Delay before a wait whose engine calls all failed is tried again.
    pub fn requeue_delay(&self) -> Duration {
        self.retry_backoff * (self.max_retries.max(1) + 1)
    }
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self::from(&WaitSection::default())
    }
}

impl From<&WaitSection> for WaitConfig {
    fn from(section: &WaitSection) -> Self {
        Self {
            default_timeout: section.default_timeout(),
            max_retries: section.max_retries,
            retry_backoff: section.retry_backoff(),
            resume_concurrency: section.resume_concurrency.max(1),
        }
    }
}

/// Bounded background executor for resuming node executions.
#[derive(Debug, Clone)]
pub struct ResumeExecutor {
    handle: Handle,
    permits: Arc<Semaphore>,
}

impl ResumeExecutor {
    pub fn new(handle: Handle, concurrency: usize) -> Self {
        Self {
            handle,
            permits: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    /// Executor on the current tokio runtime.
    pub fn current(concurrency: usize) -> Self {
        Self::new(Handle::current(), concurrency)
    }

    /// Run `task` in the background once a permit is available.
    pub fn spawn<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permits = Arc::clone(&self.permits);
        self.handle.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            task.await;
        })
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

/// Run an orchestrator call, retrying transient failures with linear backoff.
///
/// Only [`tollgate_types::Error::Orchestration`] is treated as transient;
/// lookups that fail with not-found are returned immediately.
pub async fn with_retries<T, F, Fut>(
    operation: &str,
    config: &WaitConfig,
    mut call: F,
) -> tollgate_types::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = tollgate_types::Result<T>>,
{
    let attempts = config.max_retries.max(1);
    let mut attempt = 1;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(tollgate_types::Error::Orchestration(msg)) if attempt < attempts => {
                warn!(
                    operation,
                    attempt,
                    attempts,
                    error = %msg,
                    "Orchestrator call failed, retrying"
                );
                tokio::time::sleep(config.retry_backoff * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
