//! Provisioning client trait definition

use crate::error::Result;
use crate::plan::StepRequest;
use crate::resource::{Attributes, ResourceType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Boundary to an external cloud resource-management API
///
/// One method per resource type. Each call blocks until the provider has
/// finished and returns the attributes of the created or configured resource.
/// Implementations do not retry; the orchestrator decides what a failure means.
#[async_trait]
pub trait ProvisioningClient: Send + Sync {
    /// Returns the provider name (e.g., "azure", "mock")
    fn name(&self) -> &str;

    /// Check that credentials are already established
    async fn check_auth(&self) -> Result<AuthStatus> {
        Ok(AuthStatus::ok(self.name()))
    }

    async fn create_group(&self, request: &StepRequest) -> Result<Attributes>;

    async fn create_server(&self, request: &StepRequest) -> Result<Attributes>;

    async fn create_database(&self, request: &StepRequest) -> Result<Attributes>;

    async fn add_firewall_rule(&self, request: &StepRequest) -> Result<Attributes>;

    async fn create_registry(&self, request: &StepRequest) -> Result<Attributes>;

    async fn create_plan(&self, request: &StepRequest) -> Result<Attributes>;

    async fn create_app_instance(&self, request: &StepRequest) -> Result<Attributes>;

    async fn bind_connection_string(&self, request: &StepRequest) -> Result<Attributes>;

    async fn enable_cors(&self, request: &StepRequest) -> Result<Attributes>;

    /// Route a request to the method for `resource_type`
    async fn provision(
        &self,
        resource_type: ResourceType,
        request: &StepRequest,
    ) -> Result<Attributes> {
        match resource_type {
            ResourceType::Group => self.create_group(request).await,
            ResourceType::Server => self.create_server(request).await,
            ResourceType::Database => self.create_database(request).await,
            ResourceType::FirewallRule => self.add_firewall_rule(request).await,
            ResourceType::Registry => self.create_registry(request).await,
            ResourceType::Plan => self.create_plan(request).await,
            ResourceType::AppInstance => self.create_app_instance(request).await,
            ResourceType::ConnectionBinding => self.bind_connection_string(request).await,
            ResourceType::CorsRule => self.enable_cors(request).await,
        }
    }
}

/// Authentication status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStatus {
    /// Whether authentication is valid
    pub authenticated: bool,

    /// Account/user information if available
    pub account_info: Option<String>,

    /// Error message if not authenticated
    pub error: Option<String>,
}

impl AuthStatus {
    pub fn ok(account_info: impl Into<String>) -> Self {
        Self {
            authenticated: true,
            account_info: Some(account_info.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            authenticated: false,
            account_info: None,
            error: Some(error.into()),
        }
    }
}
