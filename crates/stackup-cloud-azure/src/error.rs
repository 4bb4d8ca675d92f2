//! Azure provider error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AzureError {
    #[error("az not found. Please install the Azure CLI: https://aka.ms/installazurecli")]
    AzNotFound,

    #[error("az authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("az command failed: {0}")]
    CommandFailed(String),

    #[error("az returned no {attribute} for {resource}")]
    MissingAttribute { resource: String, attribute: String },

    #[error("Caller IP lookup failed: {0}")]
    CallerIp(String),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<AzureError> for stackup_cloud::ProvisionError {
    fn from(err: AzureError) -> Self {
        stackup_cloud::ProvisionError::Client(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AzureError>;
