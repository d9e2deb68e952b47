//! Failure descriptors handed to advisers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    Timeout,
    GeneralError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Level {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureType {
    /// The node waited for execution input past its deadline.
    InputTimeout,
    Timeout,
    Application,
    Unknown,
}

/// One failure entry inside a [`FailureInfo`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureData {
    pub code: ErrorCode,
    pub level: Level,
    pub message: String,
    #[serde(default)]
    pub failure_types: Vec<FailureType>,
}

/// Structured failure attached to a node execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureInfo {
    pub error_message: String,
    #[serde(default)]
    pub failure_types: Vec<FailureType>,
    #[serde(default)]
    pub errors: Vec<FailureData>,
}

impl FailureInfo {
    /// Failure reported when a node's execution input was never supplied.
    pub fn input_timeout() -> Self {
        let message = "Execution input was not provided before the wait timed out".to_string();
        Self {
            error_message: message.clone(),
            failure_types: vec![FailureType::InputTimeout],
            errors: vec![FailureData {
                code: ErrorCode::Timeout,
                level: Level::Error,
                message,
                failure_types: vec![FailureType::InputTimeout],
            }],
        }
    }

    pub fn has_failure_type(&self, failure_type: FailureType) -> bool {
        self.failure_types.contains(&failure_type)
    }
}
