//! az CLI wrapper
//!
//! Wraps the Azure CLI commands the standard stack needs. Every command is
//! run to completion before the next one starts.

use crate::error::{AzureError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;

/// Flags whose value must never appear in logs
const SECRET_FLAGS: [&str; 2] = ["--admin-password", "--settings"];

/// az CLI wrapper
pub struct Az {
    program: String,
    subscription: Option<String>,
}

impl Default for Az {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Az {
    pub fn new(subscription: Option<String>) -> Self {
        Self {
            program: "az".to_string(),
            subscription,
        }
    }

    /// Use a different executable (a wrapper script, a pinned install)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Check that az is installed and logged in
    pub async fn account_show(&self) -> Result<AccountInfo> {
        let which = Command::new("which").arg(&self.program).output().await?;
        if !which.status.success() {
            return Err(AzureError::AzNotFound);
        }

        self.run_json(&["account", "show"])
            .await
            .map_err(|e| match e {
                AzureError::CommandFailed(msg) => AzureError::AuthenticationFailed(msg),
                other => other,
            })
    }

    /// Run an az command and return stdout
    async fn run_command(&self, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        if let Some(subscription) = &self.subscription {
            cmd.arg("--subscription").arg(subscription);
        }
        cmd.arg("--output").arg("json");
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: {} {}", self.program, redact(args).join(" "));

        let output = cmd.output().await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AzureError::AzNotFound,
            _ => AzureError::IoError(e),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AzureError::CommandFailed(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn run_json<T: DeserializeOwned>(&self, args: &[&str]) -> Result<T> {
        let output = self.run_command(args).await?;
        Ok(serde_json::from_str(&output)?)
    }

    pub async fn group_create(&self, name: &str, location: &str) -> Result<AzResource> {
        self.run_json(&["group", "create", "--name", name, "--location", location])
            .await
    }

    pub async fn sql_server_create(&self, config: &SqlServerConfig<'_>) -> Result<AzResource> {
        self.run_json(&[
            "sql",
            "server",
            "create",
            "--name",
            config.name,
            "--resource-group",
            config.resource_group,
            "--location",
            config.location,
            "--admin-user",
            config.admin_user,
            "--admin-password",
            config.admin_password,
        ])
        .await
    }

    pub async fn sql_db_create(
        &self,
        resource_group: &str,
        server: &str,
        name: &str,
        service_objective: &str,
    ) -> Result<AzResource> {
        self.run_json(&[
            "sql",
            "db",
            "create",
            "--resource-group",
            resource_group,
            "--server",
            server,
            "--name",
            name,
            "--service-objective",
            service_objective,
        ])
        .await
    }

    pub async fn sql_firewall_rule_create(
        &self,
        resource_group: &str,
        server: &str,
        name: &str,
        start_ip: &str,
        end_ip: &str,
    ) -> Result<AzResource> {
        self.run_json(&[
            "sql",
            "server",
            "firewall-rule",
            "create",
            "--resource-group",
            resource_group,
            "--server",
            server,
            "--name",
            name,
            "--start-ip-address",
            start_ip,
            "--end-ip-address",
            end_ip,
        ])
        .await
    }

    pub async fn acr_create(
        &self,
        resource_group: &str,
        name: &str,
        sku: &str,
        admin_enabled: bool,
    ) -> Result<AzResource> {
        let mut args = vec![
            "acr",
            "create",
            "--resource-group",
            resource_group,
            "--name",
            name,
            "--sku",
            sku,
        ];
        if admin_enabled {
            args.push("--admin-enabled");
            args.push("true");
        }
        self.run_json(&args).await
    }

    pub async fn appservice_plan_create(
        &self,
        resource_group: &str,
        name: &str,
        sku: &str,
        is_linux: bool,
    ) -> Result<AzResource> {
        let mut args = vec![
            "appservice",
            "plan",
            "create",
            "--resource-group",
            resource_group,
            "--name",
            name,
            "--sku",
            sku,
        ];
        if is_linux {
            args.push("--is-linux");
        }
        self.run_json(&args).await
    }

    pub async fn webapp_create(
        &self,
        resource_group: &str,
        plan: &str,
        name: &str,
        runtime: &str,
    ) -> Result<AzResource> {
        self.run_json(&[
            "webapp",
            "create",
            "--resource-group",
            resource_group,
            "--plan",
            plan,
            "--name",
            name,
            "--runtime",
            runtime,
        ])
        .await
    }

    pub async fn webapp_connection_string_set(
        &self,
        resource_group: &str,
        app: &str,
        connection_type: &str,
        setting: &str,
    ) -> Result<()> {
        self.run_command(&[
            "webapp",
            "config",
            "connection-string",
            "set",
            "--resource-group",
            resource_group,
            "--name",
            app,
            "--connection-string-type",
            connection_type,
            "--settings",
            setting,
        ])
        .await?;
        Ok(())
    }

    pub async fn webapp_cors_add(
        &self,
        resource_group: &str,
        app: &str,
        origins: &[&str],
    ) -> Result<CorsInfo> {
        let mut args = vec![
            "webapp",
            "cors",
            "add",
            "--resource-group",
            resource_group,
            "--name",
            app,
            "--allowed-origins",
        ];
        args.extend_from_slice(origins);
        self.run_json(&args).await
    }
}

/// Replace the value following a secret flag with `***`
fn redact<'a>(args: &[&'a str]) -> Vec<&'a str> {
    let mut out = Vec::with_capacity(args.len());
    let mut hide_next = false;
    for arg in args {
        if hide_next {
            out.push("***");
            hide_next = false;
        } else {
            hide_next = SECRET_FLAGS.contains(arg);
            out.push(*arg);
        }
    }
    out
}

/// Parameters for `az sql server create`
#[derive(Debug, Clone)]
pub struct SqlServerConfig<'a> {
    pub name: &'a str,
    pub resource_group: &'a str,
    pub location: &'a str,
    pub admin_user: &'a str,
    pub admin_password: &'a str,
}

/// Account returned by `az account show`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountInfo {
    pub id: String,
    pub name: String,
    pub user: Option<AccountUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountUser {
    pub name: String,
}

/// Fields shared by the az `create` outputs the stack reads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzResource {
    pub id: String,
    pub name: String,
    pub location: Option<String>,
    pub fully_qualified_domain_name: Option<String>,
    pub login_server: Option<String>,
    pub default_host_name: Option<String>,
    pub start_ip_address: Option<String>,
}

/// Output of `az webapp cors add`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorsInfo {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}
