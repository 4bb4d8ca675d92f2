//! Resource types and the records produced for them

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Attributes reported by the provider for one resource (endpoint, id, ...)
pub type Attributes = BTreeMap<String, String>;

/// Kind of resource a provisioning step creates or configures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    /// Resource group that owns every other resource
    Group,
    /// Database server
    Server,
    /// Database hosted on a server
    Database,
    /// Firewall rule on a database server
    FirewallRule,
    /// Container registry
    Registry,
    /// Compute plan hosting application instances
    Plan,
    /// Application instance (web app)
    AppInstance,
    /// Connection string bound onto application instances
    ConnectionBinding,
    /// CORS rule on an application instance
    CorsRule,
}

impl ResourceType {
    pub const ALL: [ResourceType; 9] = [
        ResourceType::Group,
        ResourceType::Server,
        ResourceType::Database,
        ResourceType::FirewallRule,
        ResourceType::Registry,
        ResourceType::Plan,
        ResourceType::AppInstance,
        ResourceType::ConnectionBinding,
        ResourceType::CorsRule,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Group => "group",
            ResourceType::Server => "server",
            ResourceType::Database => "database",
            ResourceType::FirewallRule => "firewall_rule",
            ResourceType::Registry => "registry",
            ResourceType::Plan => "plan",
            ResourceType::AppInstance => "app_instance",
            ResourceType::ConnectionBinding => "connection_binding",
            ResourceType::CorsRule => "cors_rule",
        }
    }
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable record of one successfully created or configured resource
///
/// Records are only minted by the orchestrator, once per successful step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    step_id: String,
    resource_type: ResourceType,
    name: String,
    attributes: Attributes,

    /// Attribute name -> output artifact key declared by the step
    #[serde(default)]
    exports: BTreeMap<String, String>,

    created_at: DateTime<Utc>,
}

impl ResourceRecord {
    pub(crate) fn new(
        step_id: impl Into<String>,
        resource_type: ResourceType,
        name: impl Into<String>,
        attributes: Attributes,
        exports: BTreeMap<String, String>,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            resource_type,
            name: name.into(),
            attributes,
            exports,
            created_at: Utc::now(),
        }
    }

    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn exports(&self) -> &BTreeMap<String, String> {
        &self.exports
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_serde_names() {
        let json = serde_json::to_string(&ResourceType::AppInstance).unwrap();
        assert_eq!(json, "\"app_instance\"");

        let parsed: ResourceType = serde_json::from_str("\"firewall_rule\"").unwrap();
        assert_eq!(parsed, ResourceType::FirewallRule);
    }

    #[test]
    fn test_display_matches_serde() {
        for ty in ResourceType::ALL {
            let json = serde_json::to_string(&ty).unwrap();
            assert_eq!(json.trim_matches('"'), ty.to_string());
        }
    }

    #[test]
    fn test_record_attribute_lookup() {
        let mut attributes = Attributes::new();
        attributes.insert("fqdn".to_string(), "db.example.net".to_string());
        let record = ResourceRecord::new(
            "sql-server",
            ResourceType::Server,
            "sqlserver-1",
            attributes,
            BTreeMap::new(),
        );

        assert_eq!(record.attribute("fqdn"), Some("db.example.net"));
        assert_eq!(record.attribute("missing"), None);
        assert_eq!(record.resource_type(), ResourceType::Server);
    }
}
