//! Deterministic in-memory client
//!
//! Used by `stackup up --dry-run` and by the orchestrator tests. Every call is
//! recorded; failures can be injected per step id or per resource type.

use crate::error::{ProvisionError, Result};
use crate::plan::StepRequest;
use crate::provider::ProvisioningClient;
use crate::resource::{Attributes, ResourceType};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

type CallHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Client that fabricates provider attributes without touching any cloud
#[derive(Clone, Default)]
pub struct MockClient {
    failing_steps: HashSet<String>,
    failing_types: HashSet<ResourceType>,
    calls: Arc<Mutex<Vec<String>>>,
    on_call: Option<CallHook>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call made for `step_id`
    pub fn fail_on(mut self, step_id: impl Into<String>) -> Self {
        self.failing_steps.insert(step_id.into());
        self
    }

    /// Fail every call for `resource_type`
    pub fn fail_on_type(mut self, resource_type: ResourceType) -> Self {
        self.failing_types.insert(resource_type);
        self
    }

    /// Run `hook` with the step id at the start of every call
    pub fn on_call(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_call = Some(Arc::new(hook));
        self
    }

    /// Step ids in the order the client saw them
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn respond(&self, resource_type: ResourceType, request: &StepRequest) -> Result<Attributes> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(request.step_id.clone());
        }
        if let Some(hook) = &self.on_call {
            hook(&request.step_id);
        }

        if self.failing_steps.contains(&request.step_id)
            || self.failing_types.contains(&resource_type)
        {
            return Err(ProvisionError::Client(format!(
                "mock failure for {} {}",
                resource_type, request.name
            )));
        }

        let mut attributes: Attributes = request
            .params
            .iter()
            .filter(|(key, _)| !key.contains("password"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let name = &request.name;
        attributes.insert("name".to_string(), name.clone());
        attributes.insert(
            "id".to_string(),
            format!("/mock/{}/{}", resource_type, name),
        );

        match resource_type {
            ResourceType::Server => {
                attributes.insert("fqdn".to_string(), format!("{}.database.windows.net", name));
            }
            ResourceType::Registry => {
                attributes.insert("login_server".to_string(), format!("{}.azurecr.io", name));
            }
            ResourceType::AppInstance => {
                attributes.insert("url".to_string(), format!("https://{}.azurewebsites.net", name));
            }
            _ => {}
        }

        Ok(attributes)
    }
}

#[async_trait]
impl ProvisioningClient for MockClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn create_group(&self, request: &StepRequest) -> Result<Attributes> {
        self.respond(ResourceType::Group, request)
    }

    async fn create_server(&self, request: &StepRequest) -> Result<Attributes> {
        self.respond(ResourceType::Server, request)
    }

    async fn create_database(&self, request: &StepRequest) -> Result<Attributes> {
        self.respond(ResourceType::Database, request)
    }

    async fn add_firewall_rule(&self, request: &StepRequest) -> Result<Attributes> {
        self.respond(ResourceType::FirewallRule, request)
    }

    async fn create_registry(&self, request: &StepRequest) -> Result<Attributes> {
        self.respond(ResourceType::Registry, request)
    }

    async fn create_plan(&self, request: &StepRequest) -> Result<Attributes> {
        self.respond(ResourceType::Plan, request)
    }

    async fn create_app_instance(&self, request: &StepRequest) -> Result<Attributes> {
        self.respond(ResourceType::AppInstance, request)
    }

    async fn bind_connection_string(&self, request: &StepRequest) -> Result<Attributes> {
        self.respond(ResourceType::ConnectionBinding, request)
    }

    async fn enable_cors(&self, request: &StepRequest) -> Result<Attributes> {
        self.respond(ResourceType::CorsRule, request)
    }
}
