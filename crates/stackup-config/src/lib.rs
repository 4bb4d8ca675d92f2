//! stackup configuration
//!
//! Every value has a default matching the stack the original deployment
//! scripts hardcoded, so a run needs no configuration file at all.

pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_PATH_ENV: &str = "STACKUP_CONFIG_PATH";

const CANDIDATES: [&str; 2] = ["stackup.local.yaml", "stackup.yaml"];

/// Settings for the standard microservice stack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackConfig {
    /// Base label of the resource group (the run seed is appended)
    pub resource_group_label: String,
    pub region: String,
    pub sql_admin_user: String,
    pub sql_admin_password: String,
    /// SKU of the app service plan
    pub sku_tier: String,
    pub app_runtime_version: String,
    pub registry_sku: String,
    /// One application instance is created per service
    pub services: Vec<String>,
    pub cors_origins: Vec<String>,
    /// Where the KEY=VALUE artifact is written
    pub output_path: PathBuf,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            resource_group_label: "microservices-rg".to_string(),
            region: "eastus".to_string(),
            sql_admin_user: "sqladmin".to_string(),
            sql_admin_password: "P@ssw0rd1234!".to_string(),
            sku_tier: "B1".to_string(),
            app_runtime_version: "DOTNETCORE:8.0".to_string(),
            registry_sku: "Basic".to_string(),
            services: vec!["user".to_string(), "product".to_string()],
            cors_origins: vec!["*".to_string()],
            output_path: PathBuf::from("deployment-output.txt"),
        }
    }
}

impl StackConfig {
    /// Read a YAML file; keys it omits keep their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, then the first config file found, then environment overrides
    ///
    /// Returns the file that was used, if any.
    pub fn load() -> Result<(Self, Option<PathBuf>)> {
        let file = find_config_file();
        let mut config = match &file {
            Some(path) => {
                tracing::debug!("Loading configuration from {}", path.display());
                Self::from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok((config, file))
    }

    /// Apply `STACKUP_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        let overrides: [(&str, &mut String); 4] = [
            ("STACKUP_REGION", &mut self.region),
            ("STACKUP_SQL_ADMIN_USER", &mut self.sql_admin_user),
            ("STACKUP_SQL_ADMIN_PASSWORD", &mut self.sql_admin_password),
            ("STACKUP_SKU_TIER", &mut self.sku_tier),
        ];
        for (var, field) in overrides {
            if let Ok(value) = std::env::var(var) {
                if !value.is_empty() {
                    *field = value;
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("resource_group_label", &self.resource_group_label),
            ("region", &self.region),
            ("sql_admin_user", &self.sql_admin_user),
            ("sql_admin_password", &self.sql_admin_password),
            ("sku_tier", &self.sku_tier),
            ("app_runtime_version", &self.app_runtime_version),
            ("registry_sku", &self.registry_sku),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{} must not be empty", field)));
            }
        }

        if self.services.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one service is required".to_string(),
            ));
        }
        if let Some(dup) = self
            .services
            .iter()
            .enumerate()
            .find(|(i, s)| self.services[..*i].contains(*s))
            .map(|(_, s)| s)
        {
            return Err(ConfigError::Invalid(format!("service '{}' is listed twice", dup)));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("output_path must not be empty".to_string()));
        }

        Ok(())
    }
}

/// stackup's directory under the user's configuration directory
pub fn get_config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("stackup"))
        .ok_or(ConfigError::ConfigDirNotFound)
}

/// Locate the configuration file
///
/// Search order:
/// 1. `STACKUP_CONFIG_PATH`
/// 2. Current directory: stackup.local.yaml, stackup.yaml
/// 3. ~/.config/stackup/stackup.yaml
pub fn find_config_file() -> Option<PathBuf> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Some(path);
        }
        tracing::warn!("{} points to missing file {}", CONFIG_PATH_ENV, path.display());
    }

    if let Ok(current_dir) = std::env::current_dir() {
        for filename in CANDIDATES {
            let path = current_dir.join(filename);
            if path.exists() {
                return Some(path);
            }
        }
    }

    let global = get_config_dir().ok()?.join("stackup.yaml");
    global.exists().then_some(global)
}
