//! Keyed wait/notify engine with per-wait timeouts.
//!
//! A caller parks a continuation ([`NotifyCallback`]) under one or more
//! correlation ids. The wait completes when every id has been signalled
//! with [`WaitNotifyEngine::done_with`], or times out when its deadline
//! passes first. Completion and timeout both start by removing the wait
//! from the registry under one lock, so exactly one of them ever reaches
//! the callback.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Responses collected for a wait, keyed by correlation id.
pub type ResponseData = BTreeMap<String, Value>;

/// Continuation invoked by the engine when a wait settles.
#[async_trait]
pub trait NotifyCallback: Send + Sync {
    /// Every correlation id of the wait was signalled.
    async fn notify(&self, response: ResponseData);

    /// The wait's deadline passed before all ids were signalled.
    async fn notify_timeout(&self);

    /// The producer reported a failure instead of a response.
    async fn notify_error(&self, response: ResponseData);
}

struct PendingWait {
    callback: Arc<dyn NotifyCallback>,
    remaining: HashSet<String>,
    responses: ResponseData,
    timer: Option<AbortHandle>,
}

#[derive(Default)]
struct Registry {
    waits: HashMap<String, PendingWait>,
    // correlation id -> wait id
    index: HashMap<String, String>,
}

impl Registry {
    // Signalled and re-registered ids have already left `remaining`, so
    // only the wait's own outstanding index entries are touched.
    fn remove_wait(&mut self, wait_id: &str) -> Option<PendingWait> {
        let wait = self.waits.remove(wait_id)?;
        for id in &wait.remaining {
            if self.index.get(id).is_some_and(|owner| owner == wait_id) {
                self.index.remove(id);
            }
        }
        Some(wait)
    }
}

/// Registry of parked continuations, driven by a tokio runtime.
#[derive(Clone)]
pub struct WaitNotifyEngine {
    handle: Handle,
    registry: Arc<Mutex<Registry>>,
}

impl WaitNotifyEngine {
    /// Create an engine that runs timers and callbacks on `handle`.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Create an engine bound to the current tokio runtime.
    ///
    /// Panics outside a runtime, like [`Handle::current`].
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Park `callback` until every id in `correlation_ids` is signalled or
    /// `timeout` elapses. Returns the wait id.
    ///
    /// Ids already owned by another pending wait are moved to this one.
    pub fn wait_for_all_on(
        &self,
        callback: Arc<dyn NotifyCallback>,
        correlation_ids: &[String],
        timeout: Duration,
    ) -> String {
        let wait_id = Uuid::new_v4().to_string();
        {
            let mut registry = self.registry.lock();
            for id in correlation_ids {
                if let Some(previous) = registry.index.insert(id.clone(), wait_id.clone())
                    && let Some(wait) = registry.waits.get_mut(&previous)
                {
                    warn!(correlation_id = %id, "Correlation id re-registered; moving to new wait");
                    wait.remaining.remove(id);
                }
            }
            registry.waits.insert(
                wait_id.clone(),
                PendingWait {
                    callback,
                    remaining: correlation_ids.iter().cloned().collect(),
                    responses: ResponseData::new(),
                    timer: None,
                },
            );
        }

        let registry = Arc::clone(&self.registry);
        let timer_wait_id = wait_id.clone();
        let timer = self.handle.spawn(async move {
            tokio::time::sleep(timeout).await;
            let claimed = registry.lock().remove_wait(&timer_wait_id);
            if let Some(wait) = claimed {
                info!(wait_id = %timer_wait_id, "Wait timed out");
                wait.callback.notify_timeout().await;
            }
        });

        // The timer may already have fired for a zero timeout
        if let Some(wait) = self.registry.lock().waits.get_mut(&wait_id) {
            wait.timer = Some(timer.abort_handle());
        }

        debug!(
            wait_id = %wait_id,
            correlation_ids = ?correlation_ids,
            timeout_ms = timeout.as_millis() as u64,
            "Registered wait"
        );
        wait_id
    }

    /// Signal one correlation id.
    ///
    /// Returns `false` when no pending wait owns the id (already settled,
    /// timed out, cancelled, or never registered).
    pub fn done_with(&self, correlation_id: &str, response: Value) -> bool {
        let completed = {
            let mut registry = self.registry.lock();
            let Some(wait_id) = registry.index.remove(correlation_id) else {
                debug!(correlation_id = %correlation_id, "No pending wait for correlation id");
                return false;
            };
            let Some(wait) = registry.waits.get_mut(&wait_id) else {
                return false;
            };
            wait.remaining.remove(correlation_id);
            wait.responses.insert(correlation_id.to_string(), response);
            if wait.remaining.is_empty() {
                registry.remove_wait(&wait_id)
            } else {
                None
            }
        };

        if let Some(wait) = completed {
            if let Some(timer) = &wait.timer {
                timer.abort();
            }
            let callback = wait.callback;
            let responses = wait.responses;
            self.handle.spawn(async move {
                callback.notify(responses).await;
            });
        }
        true
    }

    /// Drop the wait owning `correlation_id` without invoking its callback.
    pub fn cancel(&self, correlation_id: &str) -> bool {
        let mut registry = self.registry.lock();
        let Some(wait_id) = registry.index.get(correlation_id).cloned() else {
            return false;
        };
        match registry.remove_wait(&wait_id) {
            Some(wait) => {
                if let Some(timer) = wait.timer {
                    timer.abort();
                }
                true
            }
            None => false,
        }
    }

    /// Number of waits not yet settled.
    pub fn pending_count(&self) -> usize {
        self.registry.lock().waits.len()
    }

    /// Whether a pending wait owns `correlation_id`.
    pub fn is_pending(&self, correlation_id: &str) -> bool {
        self.registry.lock().index.contains_key(correlation_id)
    }
}

impl std::fmt::Debug for WaitNotifyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitNotifyEngine")
            .field("pending", &self.pending_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    #[derive(Debug, PartialEq)]
    enum Outcome {
        Notified(ResponseData),
        TimedOut,
    }

    struct ChannelCallback(mpsc::UnboundedSender<Outcome>);

    #[async_trait]
    impl NotifyCallback for ChannelCallback {
        async fn notify(&self, response: ResponseData) {
            let _ = self.0.send(Outcome::Notified(response));
        }

        async fn notify_timeout(&self) {
            let _ = self.0.send(Outcome::TimedOut);
        }

        async fn notify_error(&self, _response: ResponseData) {}
    }

    fn callback() -> (Arc<dyn NotifyCallback>, mpsc::UnboundedReceiver<Outcome>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(ChannelCallback(tx)), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_with_notifies_once() {
        let engine = WaitNotifyEngine::current();
        let (cb, mut rx) = callback();
        engine.wait_for_all_on(cb, &["c1".to_string()], Duration::from_secs(60));
        assert_eq!(engine.pending_count(), 1);

        assert!(engine.done_with("c1", json!({"a": 1})));
        assert!(!engine.done_with("c1", json!({"a": 2})));

        let outcome = rx.recv().await.unwrap();
        let mut expected = ResponseData::new();
        expected.insert("c1".to_string(), json!({"a": 1}));
        assert_eq!(outcome, Outcome::Notified(expected));
        assert_eq!(engine.pending_count(), 0);

        // Timer was aborted; nothing else arrives
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_claims_wait() {
        let engine = WaitNotifyEngine::current();
        let (cb, mut rx) = callback();
        engine.wait_for_all_on(cb, &["c1".to_string()], Duration::from_secs(5));

        assert_eq!(rx.recv().await.unwrap(), Outcome::TimedOut);
        assert!(!engine.done_with("c1", json!(null)));
        assert_eq!(engine.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_all_ids() {
        let engine = WaitNotifyEngine::current();
        let (cb, mut rx) = callback();
        let ids = vec!["c1".to_string(), "c2".to_string()];
        engine.wait_for_all_on(cb, &ids, Duration::from_secs(60));

        assert!(engine.done_with("c1", json!(1)));
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
        assert!(engine.is_pending("c2"));

        assert!(engine.done_with("c2", json!(2)));
        match rx.recv().await.unwrap() {
            Outcome::Notified(responses) => {
                assert_eq!(responses.len(), 2);
                assert_eq!(responses["c2"], json!(2));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_wait() {
        let engine = WaitNotifyEngine::current();
        let (cb, mut rx) = callback();
        engine.wait_for_all_on(cb, &["c1".to_string()], Duration::from_secs(5));

        assert!(engine.cancel("c1"));
        assert!(!engine.cancel("c1"));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(engine.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settling_one_wait_keeps_others_indexed() {
        let engine = WaitNotifyEngine::current();
        let (first, _rx1) = callback();
        let (second, _rx2) = callback();
        engine.wait_for_all_on(first, &["a1".to_string(), "a2".to_string()], Duration::from_secs(5));
        engine.wait_for_all_on(second, &["b1".to_string()], Duration::from_secs(60));

        assert!(engine.cancel("a2"));
        assert!(!engine.is_pending("a1"));
        assert!(!engine.is_pending("a2"));
        assert!(engine.is_pending("b1"));
        assert_eq!(engine.registry.lock().index.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_moved_id_survives_old_wait_timeout() {
        let engine = WaitNotifyEngine::current();
        let (old, mut old_rx) = callback();
        let (new, mut new_rx) = callback();
        engine.wait_for_all_on(old, &["c1".to_string()], Duration::from_secs(5));
        engine.wait_for_all_on(new, &["c1".to_string()], Duration::from_secs(60));

        assert_eq!(old_rx.recv().await.unwrap(), Outcome::TimedOut);
        assert!(engine.is_pending("c1"));
        assert!(engine.done_with("c1", json!(1)));
        assert!(matches!(new_rx.recv().await.unwrap(), Outcome::Notified(_)));
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let engine = WaitNotifyEngine::current();
        assert!(!engine.done_with("nope", json!(null)));
        assert!(!engine.is_pending("nope"));
    }
}
