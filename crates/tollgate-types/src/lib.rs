//! Shared types for the Tollgate execution-input service.
//!
//! These types describe the parts of the orchestration engine that the
//! execution-input protocol reads and drives (node executions, plan nodes,
//! advisers, failure info) together with the collaborator traits the
//! protocol calls into.

pub mod ambiance;
pub mod engine;
pub mod error;
pub mod failure;
pub mod node;
pub mod status;

pub use ambiance::Ambiance;
pub use engine::{ExpressionResolver, Orchestrator, SharedOrchestrator, SharedResolver};
pub use error::{Error, Result};
pub use failure::{ErrorCode, FailureData, FailureInfo, FailureType, Level};
pub use node::{AdviserObtainment, AdviserType, NodeExecution, PlanNode};
pub use status::Status;
