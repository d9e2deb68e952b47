//! Execution-input wait/resume protocol for Tollgate.
//!
//! A node that needs human-supplied values parks itself with
//! [`WaitForInputHelper`], which persists an [`ExecutionInputInstance`] and
//! registers a [`WaitForInputCallback`] with the [`WaitNotifyEngine`].
//! [`ExecutionInputService::continue_execution`] later merges the user's
//! YAML into the instance template, resolves expressions, persists the
//! result once and wakes the callback, which restarts the node. If the
//! deadline passes first, the callback expires the node and either ends it
//! or hands a timeout failure to its advisers.

pub mod callback;
pub mod engine;
pub mod error;
pub mod executor;
pub mod expression;
pub mod instance;
pub mod required;
pub mod service;
pub mod storage;
pub mod store;
pub mod suspend;
pub mod template;
pub mod wait_notify;

pub use callback::WaitForInputCallback;
pub use engine::{EngineEvent, InMemoryOrchestrator};
pub use error::{InputError, Result};
pub use executor::{ResumeExecutor, WaitConfig, with_retries};
pub use expression::AmbianceResolver;
pub use instance::{ExecutionInputInstance, InputInstanceState};
pub use required::check_value_for_required_variables_provided;
pub use service::ExecutionInputService;
pub use storage::{InputInstanceStorage, MockInputStorage, SharedInputStorage};
pub use store::SqliteInputStore;
pub use suspend::WaitForInputHelper;
pub use template::{InputMarker, marker_paths, merge_template_with_input, merge_yaml, parse_yaml};
pub use wait_notify::{NotifyCallback, ResponseData, WaitNotifyEngine};
