//! Error types for orchestration collaborators.

use thiserror::Error;

/// Result type alias using the shared error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by orchestration and expression collaborators.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Node execution not found: {0}")]
    NodeExecutionNotFound(String),

    #[error("Plan node not found: {0}")]
    PlanNodeNotFound(String),

    #[error("Expression error: {0}")]
    Expression(String),

    #[error("Orchestration error: {0}")]
    Orchestration(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
