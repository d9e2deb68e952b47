use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// No pending instance can accept the request.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Execution input already exists for node execution: {0}")]
    Duplicate(String),

    #[error("Value or expression not provided for required variable '{name}'")]
    RequiredValueMissing { name: String },

    #[error(
        "Required variable '{name}' declares a default value but no value was provided in the execution input"
    )]
    RequiredDefaultMissing { name: String },

    #[error("Value {value} at '{path}' is not one of the allowed values")]
    NotAllowed { path: String, value: String },

    #[error("Expression error: {0}")]
    Expression(String),

    #[error("Orchestration error: {0}")]
    Orchestration(#[from] tollgate_types::Error),
}

pub type Result<T> = std::result::Result<T, InputError>;

impl InputError {
    /// Failures worth retrying later: store I/O and engine unavailability.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Orchestration(tollgate_types::Error::Orchestration(_))
        )
    }
}
