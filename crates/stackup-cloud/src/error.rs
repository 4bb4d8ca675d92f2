//! Provisioning error types

use crate::resource::ResourceType;
use thiserror::Error;

/// Errors raised while building or running a provisioning plan
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Invalid {resource_type} name '{name}': {reason}")]
    InvalidName {
        resource_type: ResourceType,
        name: String,
        reason: String,
    },

    #[error("Step '{step_id}' failed: {cause}")]
    StepFailure { step_id: String, cause: String },

    #[error("Run cancelled before step '{step_id}'")]
    Cancelled { step_id: String },

    #[error("Step '{step_id}' is missing parameter '{key}'")]
    MissingParameter { step_id: String, key: String },

    #[error("No record for step '{step_id}'")]
    MissingRecord { step_id: String },

    #[error("Run context has already been used (status {status})")]
    ContextReused { status: crate::context::RunStatus },

    #[error("Client error: {0}")]
    Client(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProvisionError {
    /// Whether this error was raised while constructing a plan or its names
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            ProvisionError::InvalidPlan(_) | ProvisionError::InvalidName { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
