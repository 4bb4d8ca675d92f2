//! Azure provisioning client

use crate::az::{Az, AzResource, SqlServerConfig};
use crate::error::AzureError;
use async_trait::async_trait;
use stackup_cloud::{Attributes, AuthStatus, ProvisioningClient, StepRequest};
use std::net::IpAddr;

const DEFAULT_IP_ECHO_URL: &str = "https://api.ipify.org";

/// Provisions the stack through the az CLI
pub struct AzureClient {
    az: Az,
    ip_echo_url: String,
}

impl Default for AzureClient {
    fn default() -> Self {
        Self::new(Az::default())
    }
}

impl AzureClient {
    pub fn new(az: Az) -> Self {
        Self {
            az,
            ip_echo_url: DEFAULT_IP_ECHO_URL.to_string(),
        }
    }

    /// Service that answers with the caller's public IP as plain text
    pub fn with_ip_echo_url(mut self, url: impl Into<String>) -> Self {
        self.ip_echo_url = url.into();
        self
    }

    async fn caller_ip(&self) -> Result<IpAddr, AzureError> {
        let body = reqwest::get(&self.ip_echo_url)
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AzureError::CallerIp(e.to_string()))?
            .text()
            .await
            .map_err(|e| AzureError::CallerIp(e.to_string()))?;
        parse_ip(&body)
    }
}

fn parse_ip(body: &str) -> Result<IpAddr, AzureError> {
    body.trim()
        .parse()
        .map_err(|_| AzureError::CallerIp(format!("not an IP address: {:?}", body.trim())))
}

fn flag(request: &StepRequest, key: &str) -> bool {
    request.param(key) == Some("true")
}

/// `name` and `id` always, plus location when az reports it
fn base_attributes(resource: &AzResource) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert("id".to_string(), resource.id.clone());
    attributes.insert("name".to_string(), resource.name.clone());
    if let Some(location) = &resource.location {
        attributes.insert("location".to_string(), location.clone());
    }
    attributes
}

fn require_field(
    resource: &AzResource,
    value: &Option<String>,
    attribute: &str,
) -> Result<String, AzureError> {
    value.clone().ok_or_else(|| AzureError::MissingAttribute {
        resource: resource.name.clone(),
        attribute: attribute.to_string(),
    })
}

fn split_list(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[async_trait]
impl ProvisioningClient for AzureClient {
    fn name(&self) -> &str {
        "azure"
    }

    async fn check_auth(&self) -> stackup_cloud::Result<AuthStatus> {
        match self.az.account_show().await {
            Ok(account) => {
                let user = account
                    .user
                    .map(|u| u.name)
                    .unwrap_or_else(|| "unknown user".to_string());
                Ok(AuthStatus::ok(format!("{} ({}) as {}", account.name, account.id, user)))
            }
            Err(AzureError::AzNotFound) => Ok(AuthStatus::failed("az is not installed")),
            Err(e) => Ok(AuthStatus::failed(e.to_string())),
        }
    }

    async fn create_group(&self, request: &StepRequest) -> stackup_cloud::Result<Attributes> {
        let location = request.require("location")?;
        let group = self.az.group_create(&request.name, location).await?;
        Ok(base_attributes(&group))
    }

    async fn create_server(&self, request: &StepRequest) -> stackup_cloud::Result<Attributes> {
        let config = SqlServerConfig {
            name: &request.name,
            resource_group: request.require("resource_group")?,
            location: request.require("location")?,
            admin_user: request.require("admin_user")?,
            admin_password: request.require("admin_password")?,
        };
        let server = self.az.sql_server_create(&config).await?;

        let mut attributes = base_attributes(&server);
        attributes.insert(
            "fqdn".to_string(),
            require_field(&server, &server.fully_qualified_domain_name, "fqdn")?,
        );
        attributes.insert("admin_user".to_string(), config.admin_user.to_string());
        Ok(attributes)
    }

    async fn create_database(&self, request: &StepRequest) -> stackup_cloud::Result<Attributes> {
        let server = request.require("server")?;
        let db = self
            .az
            .sql_db_create(
                request.require("resource_group")?,
                server,
                &request.name,
                request.param("service_objective").unwrap_or("Basic"),
            )
            .await?;

        let mut attributes = base_attributes(&db);
        attributes.insert("server".to_string(), server.to_string());
        Ok(attributes)
    }

    async fn add_firewall_rule(&self, request: &StepRequest) -> stackup_cloud::Result<Attributes> {
        let (start_ip, end_ip) = if flag(request, "detect_caller_ip") {
            let ip = self.caller_ip().await?.to_string();
            tracing::info!("Detected caller IP {}", ip);
            (ip.clone(), ip)
        } else {
            (
                request.require("start_ip")?.to_string(),
                request.require("end_ip")?.to_string(),
            )
        };

        let rule = self
            .az
            .sql_firewall_rule_create(
                request.require("resource_group")?,
                request.require("server")?,
                &request.name,
                &start_ip,
                &end_ip,
            )
            .await?;

        let mut attributes = base_attributes(&rule);
        attributes.insert("start_ip".to_string(), start_ip);
        attributes.insert("end_ip".to_string(), end_ip);
        Ok(attributes)
    }

    async fn create_registry(&self, request: &StepRequest) -> stackup_cloud::Result<Attributes> {
        let registry = self
            .az
            .acr_create(
                request.require("resource_group")?,
                &request.name,
                request.param("sku").unwrap_or("Basic"),
                flag(request, "admin_enabled"),
            )
            .await?;

        let mut attributes = base_attributes(&registry);
        attributes.insert(
            "login_server".to_string(),
            require_field(&registry, &registry.login_server, "login_server")?,
        );
        Ok(attributes)
    }

    async fn create_plan(&self, request: &StepRequest) -> stackup_cloud::Result<Attributes> {
        let sku = request.require("sku")?;
        let plan = self
            .az
            .appservice_plan_create(
                request.require("resource_group")?,
                &request.name,
                sku,
                flag(request, "is_linux"),
            )
            .await?;

        let mut attributes = base_attributes(&plan);
        attributes.insert("sku".to_string(), sku.to_string());
        Ok(attributes)
    }

    async fn create_app_instance(&self, request: &StepRequest) -> stackup_cloud::Result<Attributes> {
        let app = self
            .az
            .webapp_create(
                request.require("resource_group")?,
                request.require("plan")?,
                &request.name,
                request.require("runtime")?,
            )
            .await?;

        let host = require_field(&app, &app.default_host_name, "default_host_name")?;
        let mut attributes = base_attributes(&app);
        attributes.insert("url".to_string(), format!("https://{}", host));
        Ok(attributes)
    }

    async fn bind_connection_string(
        &self,
        request: &StepRequest,
    ) -> stackup_cloud::Result<Attributes> {
        let resource_group = request.require("resource_group")?;
        let connection_name = request.require("connection_name")?;
        let connection_string = request.require("connection_string")?;
        let connection_type = request.param("connection_type").unwrap_or("SQLAzure");
        let setting = format!("{}={}", connection_name, connection_string);
        let targets = split_list(request.require("targets")?);

        for app in &targets {
            self.az
                .webapp_connection_string_set(resource_group, app, connection_type, &setting)
                .await?;
            tracing::info!("Bound {} to {}", connection_name, app);
        }

        let mut attributes = Attributes::new();
        attributes.insert("targets".to_string(), targets.join(","));
        attributes.insert("connection_name".to_string(), connection_name.to_string());
        attributes.insert("connection_string".to_string(), connection_string.to_string());
        Ok(attributes)
    }

    async fn enable_cors(&self, request: &StepRequest) -> stackup_cloud::Result<Attributes> {
        let resource_group = request.require("resource_group")?;
        let origins = split_list(request.require("allowed_origins")?);
        let targets = split_list(request.require("targets")?);

        let mut allowed = Vec::new();
        for app in &targets {
            let cors = self.az.webapp_cors_add(resource_group, app, &origins).await?;
            allowed = cors.allowed_origins;
        }

        let mut attributes = Attributes::new();
        attributes.insert("targets".to_string(), targets.join(","));
        attributes.insert("allowed_origins".to_string(), allowed.join(","));
        Ok(attributes)
    }
}
