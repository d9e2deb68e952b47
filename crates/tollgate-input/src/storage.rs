//! Storage abstraction for execution-input instances.
//!
//! ```text
//! InputInstanceStorage (trait)   - instance CRUD + compare-and-set transitions
//!     └── SqliteInputStore       - Default SQLite implementation
//!     └── MockInputStorage       - In-memory mock for testing
//! ```
//!
//! The two transitions out of `Pending` (`resolve` and `expire`) are
//! conditional writes: exactly one of them can succeed for an instance,
//! which is what makes late input and a firing timeout race-safe.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;

use crate::instance::{ExecutionInputInstance, InputInstanceState};
use crate::{InputError, Result};

/// Persistence operations for execution-input instances.
pub trait InputInstanceStorage: Send + Sync {
    /// Persist a new pending instance.
    ///
    /// Fails with [`InputError::Duplicate`] when the node execution already
    /// owns an instance.
    fn save(&self, instance: &ExecutionInputInstance) -> Result<()>;

    /// Look up the instance owned by a node execution.
    fn get_by_node_execution_id(
        &self,
        node_execution_id: &str,
    ) -> Result<Option<ExecutionInputInstance>>;

    /// Look up an instance by correlation id.
    fn get_by_instance_id(&self, input_instance_id: &str)
    -> Result<Option<ExecutionInputInstance>>;

    /// Batch lookup, ordered by node execution id.
    fn list_by_node_execution_ids(
        &self,
        node_execution_ids: &[String],
    ) -> Result<Vec<ExecutionInputInstance>>;

    /// `Pending -> Resolved`, writing the merged map and raw input.
    ///
    /// Returns `false` when the instance is missing or no longer pending.
    fn resolve(&self, input_instance_id: &str, merged: &Value, user_input: &str) -> Result<bool>;

    /// `Pending -> Expired`.
    ///
    /// Returns `false` when the instance is missing or no longer pending.
    fn expire(&self, input_instance_id: &str) -> Result<bool>;

    /// Delete instances owned by the given node executions. Missing ids are ignored.
    fn delete_by_node_execution_ids(&self, node_execution_ids: &[String]) -> Result<usize>;
}

/// Shared storage handle.
pub type SharedInputStorage = Arc<dyn InputInstanceStorage>;

/// Mock implementation of [`InputInstanceStorage`] for testing.
#[derive(Debug, Default)]
pub struct MockInputStorage {
    // Keyed by node execution id
    instances: Mutex<HashMap<String, ExecutionInputInstance>>,
}

impl MockInputStorage {
    /// Create a new empty mock storage.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.lock().is_empty()
    }

    fn transition(
        &self,
        input_instance_id: &str,
        apply: impl FnOnce(&mut ExecutionInputInstance),
    ) -> bool {
        let mut map = self.instances.lock();
        match map
            .values_mut()
            .find(|i| i.input_instance_id == input_instance_id && i.is_pending())
        {
            Some(instance) => {
                apply(instance);
                instance.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

impl InputInstanceStorage for MockInputStorage {
    fn save(&self, instance: &ExecutionInputInstance) -> Result<()> {
        let mut map = self.instances.lock();
        if map.contains_key(&instance.node_execution_id) {
            return Err(InputError::Duplicate(instance.node_execution_id.clone()));
        }
        map.insert(instance.node_execution_id.clone(), instance.clone());
        Ok(())
    }

    fn get_by_node_execution_id(
        &self,
        node_execution_id: &str,
    ) -> Result<Option<ExecutionInputInstance>> {
        Ok(self.instances.lock().get(node_execution_id).cloned())
    }

    fn get_by_instance_id(
        &self,
        input_instance_id: &str,
    ) -> Result<Option<ExecutionInputInstance>> {
        Ok(self
            .instances
            .lock()
            .values()
            .find(|i| i.input_instance_id == input_instance_id)
            .cloned())
    }

    fn list_by_node_execution_ids(
        &self,
        node_execution_ids: &[String],
    ) -> Result<Vec<ExecutionInputInstance>> {
        let map = self.instances.lock();
        let mut results: Vec<_> = node_execution_ids
            .iter()
            .filter_map(|id| map.get(id).cloned())
            .collect();
        results.sort_by(|a, b| a.node_execution_id.cmp(&b.node_execution_id));
        results.dedup_by(|a, b| a.node_execution_id == b.node_execution_id);
        Ok(results)
    }

    fn resolve(&self, input_instance_id: &str, merged: &Value, user_input: &str) -> Result<bool> {
        Ok(self.transition(input_instance_id, |instance| {
            instance.state = InputInstanceState::Resolved;
            instance.merged_input_template = Some(merged.clone());
            instance.user_input = Some(user_input.to_string());
        }))
    }

    fn expire(&self, input_instance_id: &str) -> Result<bool> {
        Ok(self.transition(input_instance_id, |instance| {
            instance.state = InputInstanceState::Expired;
        }))
    }

    fn delete_by_node_execution_ids(&self, node_execution_ids: &[String]) -> Result<usize> {
        let mut map = self.instances.lock();
        Ok(node_execution_ids
            .iter()
            .filter(|id| map.remove(id.as_str()).is_some())
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mock_duplicate_rejected() {
        let storage = MockInputStorage::new();
        storage
            .save(&ExecutionInputInstance::new("node-1", "a: b", ""))
            .unwrap();
        let err = storage
            .save(&ExecutionInputInstance::new("node-1", "c: d", ""))
            .unwrap_err();
        assert!(matches!(err, InputError::Duplicate(ref id) if id == "node-1"));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_mock_resolve_once() {
        let storage = MockInputStorage::new();
        let instance = ExecutionInputInstance::new("node-1", "a: b", "");
        storage.save(&instance).unwrap();

        assert!(storage
            .resolve(&instance.input_instance_id, &json!({"a": 1}), "a: 1")
            .unwrap());
        assert!(!storage
            .resolve(&instance.input_instance_id, &json!({"a": 2}), "a: 2")
            .unwrap());
        assert!(!storage.expire(&instance.input_instance_id).unwrap());

        let stored = storage.get_by_node_execution_id("node-1").unwrap().unwrap();
        assert_eq!(stored.state, InputInstanceState::Resolved);
        assert_eq!(stored.merged_input_template, Some(json!({"a": 1})));
    }

    #[test]
    fn test_mock_delete_is_idempotent() {
        let storage = MockInputStorage::new();
        storage
            .save(&ExecutionInputInstance::new("node-1", "a: b", ""))
            .unwrap();
        let ids = vec!["node-1".to_string(), "missing".to_string()];
        assert_eq!(storage.delete_by_node_execution_ids(&ids).unwrap(), 1);
        assert_eq!(storage.delete_by_node_execution_ids(&ids).unwrap(), 0);
        assert!(storage.is_empty());
    }
}
