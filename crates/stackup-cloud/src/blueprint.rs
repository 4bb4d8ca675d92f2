//! The standard microservice stack
//!
//! Resource group, SQL server and database, firewall rules, container
//! registry, app service plan, one web app per service, the SQL connection
//! string bound onto every app, and CORS on every app.

use crate::context::RunContext;
use crate::error::Result;
use crate::output::upper_snake;
use crate::plan::{ProvisioningPlan, ProvisioningStep, StepParams};
use crate::resource::ResourceType;
use stackup_config::StackConfig;

pub const GROUP: &str = "resource-group";
pub const SQL_SERVER: &str = "sql-server";
pub const SQL_DB: &str = "sql-db";
pub const FIREWALL_AZURE: &str = "firewall-allow-azure";
pub const FIREWALL_CALLER: &str = "firewall-allow-caller";
pub const REGISTRY: &str = "registry";
pub const APP_PLAN: &str = "app-plan";
pub const CONNECTION_BINDING: &str = "connection-binding";
pub const CORS: &str = "cors";

/// Name of the connection string entry set on every app
pub const CONNECTION_NAME: &str = "DefaultConnection";

/// Step id of the app instance for `service`
pub fn app_step_id(service: &str) -> String {
    format!("app-{}", service)
}

/// Output key of the URL of `service` (e.g., `USER_SERVICE_URL`)
pub fn service_url_key(service: &str) -> String {
    format!("{}_SERVICE_URL", upper_snake(service))
}

fn group_name(ctx: &RunContext) -> Result<String> {
    Ok(ctx.require_record(GROUP)?.name().to_string())
}

fn app_names(ctx: &RunContext, app_ids: &[String]) -> Result<String> {
    let names = app_ids
        .iter()
        .map(|id| ctx.require_record(id).map(|r| r.name().to_string()))
        .collect::<Result<Vec<_>>>()?;
    Ok(names.join(","))
}

/// ADO.NET connection string for the stack's database
pub fn connection_string(fqdn: &str, database: &str, user: &str, password: &str) -> String {
    format!(
        "Server=tcp:{},1433;Initial Catalog={};Persist Security Info=False;User ID={};Password={};\
         MultipleActiveResultSets=False;Encrypt=True;TrustServerCertificate=False;Connection Timeout=30;",
        fqdn, database, user, password
    )
}

/// Build the standard stack plan for `config`
pub fn standard_plan(config: &StackConfig) -> Result<ProvisioningPlan> {
    let mut steps = Vec::new();

    let region = config.region.clone();
    steps.push(
        ProvisioningStep::new(GROUP, ResourceType::Group)
            .describe("Creating resource group")
            .name_label(config.resource_group_label.as_str())
            .params(move |_| Ok(StepParams::new().with("location", region.as_str())))
            .export("name", "RESOURCE_GROUP")
            .export("location", "LOCATION"),
    );

    let (region, user, password) = (
        config.region.clone(),
        config.sql_admin_user.clone(),
        config.sql_admin_password.clone(),
    );
    steps.push(
        ProvisioningStep::new(SQL_SERVER, ResourceType::Server)
            .describe("Creating SQL server")
            .depends_on(GROUP)
            .name_label("sqlserver")
            .params(move |ctx| {
                Ok(StepParams::new()
                    .with("resource_group", group_name(ctx)?)
                    .with("location", region.as_str())
                    .with("admin_user", user.as_str())
                    .with("admin_password", password.as_str()))
            })
            .export("name", "SQL_SERVER")
            .export("fqdn", "SQL_SERVER_FQDN"),
    );

    steps.push(
        ProvisioningStep::new(SQL_DB, ResourceType::Database)
            .describe("Creating SQL database")
            .depends_on(SQL_SERVER)
            .name_label("microservicesdb")
            .params(|ctx| {
                Ok(StepParams::new()
                    .with("resource_group", group_name(ctx)?)
                    .with("server", ctx.require_record(SQL_SERVER)?.name())
                    .with("service_objective", "Basic"))
            })
            .export("name", "SQL_DB"),
    );

    steps.push(
        ProvisioningStep::new(FIREWALL_AZURE, ResourceType::FirewallRule)
            .describe("Allowing Azure services through the SQL firewall")
            .depends_on(SQL_SERVER)
            .name_label("allow-azure-services")
            .params(|ctx| {
                Ok(StepParams::new()
                    .with("resource_group", group_name(ctx)?)
                    .with("server", ctx.require_record(SQL_SERVER)?.name())
                    .with("start_ip", "0.0.0.0")
                    .with("end_ip", "0.0.0.0"))
            }),
    );

    // The caller's public address is only known to the adapter
    steps.push(
        ProvisioningStep::new(FIREWALL_CALLER, ResourceType::FirewallRule)
            .describe("Allowing the caller IP through the SQL firewall")
            .depends_on(SQL_SERVER)
            .optional()
            .name_label("allow-caller-ip")
            .params(|ctx| {
                Ok(StepParams::new()
                    .with("resource_group", group_name(ctx)?)
                    .with("server", ctx.require_record(SQL_SERVER)?.name())
                    .with("detect_caller_ip", "true"))
            }),
    );

    let registry_sku = config.registry_sku.clone();
    steps.push(
        ProvisioningStep::new(REGISTRY, ResourceType::Registry)
            .describe("Creating container registry")
            .depends_on(GROUP)
            .name_label("acr")
            .params(move |ctx| {
                Ok(StepParams::new()
                    .with("resource_group", group_name(ctx)?)
                    .with("sku", registry_sku.as_str())
                    .with("admin_enabled", "true"))
            })
            .export("name", "ACR_NAME")
            .export("login_server", "ACR_LOGIN_SERVER"),
    );

    let sku = config.sku_tier.clone();
    steps.push(
        ProvisioningStep::new(APP_PLAN, ResourceType::Plan)
            .describe("Creating app service plan")
            .depends_on(GROUP)
            .name_label("microservices-plan")
            .params(move |ctx| {
                Ok(StepParams::new()
                    .with("resource_group", group_name(ctx)?)
                    .with("sku", sku.as_str())
                    .with("is_linux", "true"))
            })
            .export("name", "APP_SERVICE_PLAN"),
    );

    let mut app_ids = Vec::new();
    for service in &config.services {
        let id = app_step_id(service);
        let runtime = config.app_runtime_version.clone();
        let prefix = upper_snake(service);
        steps.push(
            ProvisioningStep::new(id.as_str(), ResourceType::AppInstance)
                .describe(format!("Creating {} service web app", service))
                .depends_on(APP_PLAN)
                .name_label(format!("{}-service", service))
                .params(move |ctx| {
                    Ok(StepParams::new()
                        .with("resource_group", group_name(ctx)?)
                        .with("plan", ctx.require_record(APP_PLAN)?.name())
                        .with("runtime", runtime.as_str()))
                })
                .export("name", format!("{}_SERVICE_NAME", prefix))
                .export("url", service_url_key(service)),
        );
        app_ids.push(id);
    }

    let (user, password) = (config.sql_admin_user.clone(), config.sql_admin_password.clone());
    let targets = app_ids.clone();
    let mut binding = ProvisioningStep::new(CONNECTION_BINDING, ResourceType::ConnectionBinding)
        .describe("Binding the SQL connection string to the web apps")
        .depends_on(SQL_DB)
        .name_label("sql-connection");
    for id in &app_ids {
        binding = binding.depends_on(id.as_str());
    }
    steps.push(
        binding
            .params(move |ctx| {
                let fqdn = ctx.require_attribute(SQL_SERVER, "fqdn")?;
                let database = ctx.require_record(SQL_DB)?.name();
                Ok(StepParams::new()
                    .with("resource_group", group_name(ctx)?)
                    .with("targets", app_names(ctx, &targets)?)
                    .with("connection_name", CONNECTION_NAME)
                    .with("connection_type", "SQLAzure")
                    .with(
                        "connection_string",
                        connection_string(fqdn, database, &user, &password),
                    ))
            })
            .export("connection_string", "CONNECTION_STRING"),
    );

    let origins = config.cors_origins.join(",");
    let targets = app_ids.clone();
    let mut cors = ProvisioningStep::new(CORS, ResourceType::CorsRule)
        .describe("Enabling CORS on the web apps")
        .name_label("cors");
    for id in &app_ids {
        cors = cors.depends_on(id.as_str());
    }
    steps.push(cors.params(move |ctx| {
        Ok(StepParams::new()
            .with("resource_group", group_name(ctx)?)
            .with("targets", app_names(ctx, &targets)?)
            .with("allowed_origins", origins.as_str()))
    }));

    ProvisioningPlan::new(steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProvisionError;

    #[test]
    fn test_standard_plan_shape() {
        let plan = standard_plan(&StackConfig::default()).unwrap();
        let ids: Vec<&str> = plan.steps().iter().map(|s| s.id()).collect();
        assert_eq!(
            ids,
            [
                GROUP,
                SQL_SERVER,
                SQL_DB,
                FIREWALL_AZURE,
                FIREWALL_CALLER,
                REGISTRY,
                APP_PLAN,
                "app-user",
                "app-product",
                CONNECTION_BINDING,
                CORS,
            ]
        );

        let optional: Vec<&str> = plan
            .steps()
            .iter()
            .filter(|s| !s.is_required())
            .map(|s| s.id())
            .collect();
        assert_eq!(optional, [FIREWALL_CALLER]);
    }

    #[test]
    fn test_services_drive_app_steps() {
        let config = StackConfig {
            services: vec!["orders".to_string()],
            ..Default::default()
        };
        let plan = standard_plan(&config).unwrap();

        assert_eq!(plan.len(), 10);
        let app = plan.step("app-orders").unwrap();
        assert_eq!(app.exports()["url"], "ORDERS_SERVICE_URL");
        assert_eq!(
            plan.step(CORS).unwrap().dependencies(),
            ["app-orders".to_string()]
        );
    }

    #[test]
    fn test_invalid_service_name_fails_construction() {
        let config = StackConfig {
            services: vec!["User_Svc".to_string()],
            ..Default::default()
        };
        let err = standard_plan(&config).unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidName { .. }));
    }

    #[test]
    fn test_connection_string_format() {
        let value = connection_string("srv.database.windows.net", "db1", "admin", "pw");
        assert!(value.starts_with("Server=tcp:srv.database.windows.net,1433;Initial Catalog=db1;"));
        assert!(value.contains("User ID=admin;Password=pw;"));
        assert!(value.ends_with("Connection Timeout=30;"));
    }
}
