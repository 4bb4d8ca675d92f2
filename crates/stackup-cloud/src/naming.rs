//! Run-scoped resource naming
//!
//! Every name is `<label><separator><seed>`, where the seed is fixed when the
//! run starts. The same label and seed always give the same name, and two runs
//! with different seeds never share a name for the same label.

use crate::error::{ProvisionError, Result};
use crate::resource::ResourceType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Number of digits a seed occupies inside a generated name
pub const SEED_WIDTH: usize = 13;

const SEED_MODULUS: i64 = 10_i64.pow(SEED_WIDTH as u32);

/// Seed fixed at run start and shared by every name of that run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunSeed(i64);

impl RunSeed {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Seed derived from the wall clock (milliseconds since the Unix epoch)
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn value(&self) -> i64 {
        self.0
    }

    /// Fixed-width decimal rendering used inside names
    pub fn render(&self) -> String {
        format!("{:0width$}", self.0.rem_euclid(SEED_MODULUS), width = SEED_WIDTH)
    }
}

impl std::fmt::Display for RunSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Characters a provider accepts in a resource name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameCharset {
    /// Lowercase letters, digits and hyphens
    LowerAlnumHyphen,
    /// Lowercase letters and digits only
    LowerAlnum,
}

impl NameCharset {
    fn allows(&self, c: char) -> bool {
        match self {
            NameCharset::LowerAlnumHyphen => {
                c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'
            }
            NameCharset::LowerAlnum => c.is_ascii_lowercase() || c.is_ascii_digit(),
        }
    }

    fn separator(&self) -> &'static str {
        match self {
            NameCharset::LowerAlnumHyphen => "-",
            NameCharset::LowerAlnum => "",
        }
    }
}

/// Naming constraints for one resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamePolicy {
    pub min_len: usize,
    pub max_len: usize,
    pub charset: NameCharset,
}

impl NamePolicy {
    pub const fn new(min_len: usize, max_len: usize, charset: NameCharset) -> Self {
        Self {
            min_len,
            max_len,
            charset,
        }
    }

    /// Length of a generated name for `label`
    fn name_len(&self, label: &str) -> usize {
        label.len() + self.charset.separator().len() + SEED_WIDTH
    }
}

/// Produces collision-free names from a base label and the run seed
#[derive(Debug, Clone)]
pub struct NameGenerator {
    policies: HashMap<ResourceType, NamePolicy>,
}

impl Default for NameGenerator {
    /// Azure naming rules for the resources the standard stack creates
    fn default() -> Self {
        use NameCharset::*;

        let policies = [
            (ResourceType::Group, NamePolicy::new(1, 90, LowerAlnumHyphen)),
            (ResourceType::Server, NamePolicy::new(1, 63, LowerAlnumHyphen)),
            (ResourceType::Database, NamePolicy::new(1, 128, LowerAlnumHyphen)),
            (ResourceType::FirewallRule, NamePolicy::new(1, 128, LowerAlnumHyphen)),
            (ResourceType::Registry, NamePolicy::new(5, 50, LowerAlnum)),
            (ResourceType::Plan, NamePolicy::new(1, 40, LowerAlnumHyphen)),
            (ResourceType::AppInstance, NamePolicy::new(2, 60, LowerAlnumHyphen)),
            (ResourceType::ConnectionBinding, NamePolicy::new(1, 128, LowerAlnumHyphen)),
            (ResourceType::CorsRule, NamePolicy::new(1, 128, LowerAlnumHyphen)),
        ]
        .into_iter()
        .collect();

        Self { policies }
    }
}

impl NameGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the policy for one resource type
    pub fn with_policy(mut self, resource_type: ResourceType, policy: NamePolicy) -> Self {
        self.policies.insert(resource_type, policy);
        self
    }

    pub fn policy(&self, resource_type: ResourceType) -> Option<&NamePolicy> {
        self.policies.get(&resource_type)
    }

    /// Check that `label` yields a valid name for any seed
    pub fn validate_label(&self, resource_type: ResourceType, label: &str) -> Result<()> {
        let policy = self.policy_for(resource_type, label)?;
        let invalid = |reason: String| ProvisionError::InvalidName {
            resource_type,
            name: label.to_string(),
            reason,
        };

        let Some(first) = label.chars().next() else {
            return Err(invalid("label is empty".to_string()));
        };
        if !first.is_ascii_lowercase() {
            return Err(invalid("label must start with a lowercase letter".to_string()));
        }
        if let Some(bad) = label.chars().find(|c| !policy.charset.allows(*c)) {
            return Err(invalid(format!("character '{}' is not allowed", bad)));
        }
        if label.ends_with('-') {
            return Err(invalid("label must not end with '-'".to_string()));
        }

        let len = policy.name_len(label);
        if len > policy.max_len {
            return Err(invalid(format!(
                "generated name would be {} characters, limit is {}",
                len, policy.max_len
            )));
        }
        if len < policy.min_len {
            return Err(invalid(format!(
                "generated name would be {} characters, minimum is {}",
                len, policy.min_len
            )));
        }

        Ok(())
    }

    /// Name for `label` in the run identified by `seed`
    ///
    /// Pure in `(resource_type, label, seed)`. Never truncates: a name that
    /// does not fit the policy is an error.
    pub fn generate(
        &self,
        resource_type: ResourceType,
        label: &str,
        seed: RunSeed,
    ) -> Result<String> {
        self.validate_label(resource_type, label)?;
        let policy = self.policy_for(resource_type, label)?;
        Ok(format!(
            "{}{}{}",
            label,
            policy.charset.separator(),
            seed.render()
        ))
    }

    fn policy_for(&self, resource_type: ResourceType, label: &str) -> Result<&NamePolicy> {
        self.policies
            .get(&resource_type)
            .ok_or_else(|| ProvisionError::InvalidName {
                resource_type,
                name: label.to_string(),
                reason: "no naming policy for this resource type".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_deterministic() {
        let names = NameGenerator::default();
        let seed = RunSeed::new(1_700_000_000_123);

        let first = names
            .generate(ResourceType::Server, "sqlserver", seed)
            .unwrap();
        for _ in 0..10 {
            assert_eq!(
                names
                    .generate(ResourceType::Server, "sqlserver", seed)
                    .unwrap(),
                first
            );
        }
        assert_eq!(first, "sqlserver-1700000000123");
    }

    #[test]
    fn test_registry_names_have_no_separator() {
        let names = NameGenerator::default();
        let name = names
            .generate(ResourceType::Registry, "acr", RunSeed::new(42))
            .unwrap();
        assert_eq!(name, "acr0000000000042");
    }

    #[test]
    fn test_different_seeds_give_different_names() {
        let names = NameGenerator::default();
        let a = names
            .generate(ResourceType::AppInstance, "user-service", RunSeed::new(1))
            .unwrap();
        let b = names
            .generate(ResourceType::AppInstance, "user-service", RunSeed::new(2))
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_negative_seed_renders_fixed_width() {
        assert_eq!(RunSeed::new(-1).render().len(), SEED_WIDTH);
    }

    #[test]
    fn test_rejects_disallowed_characters() {
        let names = NameGenerator::default();
        let err = names
            .generate(ResourceType::Registry, "my-acr", RunSeed::new(1))
            .unwrap_err();
        assert!(matches!(err, ProvisionError::InvalidName { .. }));

        let err = names
            .validate_label(ResourceType::Group, "Upper")
            .unwrap_err();
        assert!(err.to_string().contains("lowercase"));
    }

    #[test]
    fn test_rejects_names_over_limit_instead_of_truncating() {
        let names = NameGenerator::default();
        let label = "p".repeat(30);
        let err = names
            .generate(ResourceType::Plan, &label, RunSeed::new(1))
            .unwrap_err();
        assert!(err.to_string().contains("limit is 40"));
    }

    #[test]
    fn test_rejects_empty_label() {
        let names = NameGenerator::default();
        assert!(names.validate_label(ResourceType::Database, "").is_err());
    }

    #[test]
    fn test_custom_policy_overrides_default() {
        let names = NameGenerator::default().with_policy(
            ResourceType::Group,
            NamePolicy::new(1, 16, NameCharset::LowerAlnumHyphen),
        );
        assert!(names.validate_label(ResourceType::Group, "rg").is_ok());
        assert!(names.validate_label(ResourceType::Group, "resources").is_err());
    }
}
