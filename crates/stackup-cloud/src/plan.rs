//! Provisioning steps and the validated plan that orders them

use crate::context::RunContext;
use crate::error::{ProvisionError, Result};
use crate::naming::{NameGenerator, RunSeed};
use crate::output::{RUN_SEED_KEY, STATUS_KEY, upper_snake};
use crate::resource::ResourceType;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Resolves a step's input parameters from what earlier steps produced
pub type ParamsFn = Arc<dyn Fn(&RunContext) -> Result<StepParams> + Send + Sync>;

/// Input parameters handed to the client for one step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepParams {
    values: BTreeMap<String, String>,
}

impl StepParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Fully resolved input for one client call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRequest {
    pub step_id: String,
    pub name: String,
    pub params: StepParams,
}

impl StepRequest {
    /// Get a parameter the client cannot work without
    pub fn require(&self, key: &str) -> Result<&str> {
        self.params
            .get(key)
            .ok_or_else(|| ProvisionError::MissingParameter {
                step_id: self.step_id.clone(),
                key: key.to_string(),
            })
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key)
    }
}

/// One declarative "create or configure a resource" unit
#[derive(Clone)]
pub struct ProvisioningStep {
    id: String,
    resource_type: ResourceType,
    description: String,
    depends_on: Vec<String>,
    required: bool,
    name_label: String,
    params_fn: ParamsFn,
    exports: BTreeMap<String, String>,
}

impl std::fmt::Debug for ProvisioningStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningStep")
            .field("id", &self.id)
            .field("resource_type", &self.resource_type)
            .field("depends_on", &self.depends_on)
            .field("required", &self.required)
            .field("name_label", &self.name_label)
            .field("exports", &self.exports)
            .finish_non_exhaustive()
    }
}

impl ProvisioningStep {
    /// New required step whose name label defaults to its id
    pub fn new(id: impl Into<String>, resource_type: ResourceType) -> Self {
        let id = id.into();
        Self {
            description: format!("Creating {} {}", resource_type, id),
            name_label: id.clone(),
            id,
            resource_type,
            depends_on: Vec::new(),
            required: true,
            params_fn: Arc::new(|_| Ok(StepParams::new())),
            exports: BTreeMap::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn depends_on(mut self, step_id: impl Into<String>) -> Self {
        let step_id = step_id.into();
        if !self.depends_on.contains(&step_id) {
            self.depends_on.push(step_id);
        }
        self
    }

    /// Mark the step best-effort: a failure becomes a warning
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn name_label(mut self, label: impl Into<String>) -> Self {
        self.name_label = label.into();
        self
    }

    pub fn params<F>(mut self, f: F) -> Self
    where
        F: Fn(&RunContext) -> Result<StepParams> + Send + Sync + 'static,
    {
        self.params_fn = Arc::new(f);
        self
    }

    /// Publish `attribute` under `key` in the output artifact
    pub fn export(mut self, attribute: impl Into<String>, key: impl Into<String>) -> Self {
        self.exports.insert(attribute.into(), key.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn dependencies(&self) -> &[String] {
        &self.depends_on
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn label(&self) -> &str {
        &self.name_label
    }

    pub fn exports(&self) -> &BTreeMap<String, String> {
        &self.exports
    }

    /// Run the step's parameter function against the current context
    pub fn resolve_params(&self, ctx: &RunContext) -> Result<StepParams> {
        (self.params_fn)(ctx)
    }
}

/// Validated, ordered, immutable list of steps
#[derive(Debug, Clone)]
pub struct ProvisioningPlan {
    steps: Vec<ProvisioningStep>,
    names: NameGenerator,
}

impl ProvisioningPlan {
    /// Validate `steps` with the default naming policies
    pub fn new(steps: Vec<ProvisioningStep>) -> Result<Self> {
        Self::with_names(steps, NameGenerator::default())
    }

    pub fn with_names(steps: Vec<ProvisioningStep>, names: NameGenerator) -> Result<Self> {
        validate(&steps, &names)?;
        Ok(Self { steps, names })
    }

    pub fn steps(&self) -> &[ProvisioningStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step(&self, id: &str) -> Option<&ProvisioningStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn names(&self) -> &NameGenerator {
        &self.names
    }

    /// Names every step would use in the run identified by `seed`, in plan order
    pub fn resolve_names(&self, seed: RunSeed) -> Result<Vec<(String, String)>> {
        self.steps
            .iter()
            .map(|step| {
                let name = self
                    .names
                    .generate(step.resource_type, &step.name_label, seed)?;
                Ok((step.id.clone(), name))
            })
            .collect()
    }
}

fn invalid(msg: impl Into<String>) -> ProvisionError {
    ProvisionError::InvalidPlan(msg.into())
}

fn validate(steps: &[ProvisioningStep], names: &NameGenerator) -> Result<()> {
    let Some(first) = steps.first() else {
        return Err(invalid("plan has no steps"));
    };
    if first.resource_type != ResourceType::Group {
        return Err(invalid(format!(
            "first step '{}' must be a group, found {}",
            first.id, first.resource_type
        )));
    }

    let declared: HashSet<&str> = steps.iter().map(|s| s.id.as_str()).collect();
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut export_keys: HashMap<&str, &str> = HashMap::new();
    // Whether each step reaches the group through its dependencies
    let mut rooted: HashMap<&str, bool> = HashMap::new();
    // Unexported attributes are written as `<STEP_ID>_<ATTRIBUTE>`, so every
    // key under a step's prefix belongs to that step
    let generated_prefixes: Vec<(&str, String)> = steps
        .iter()
        .map(|s| (s.id.as_str(), format!("{}_", upper_snake(&s.id))))
        .collect();

    for (index, step) in steps.iter().enumerate() {
        if step.id.trim().is_empty() {
            return Err(invalid(format!("step {} has an empty id", index + 1)));
        }
        if seen.contains_key(step.id.as_str()) {
            return Err(invalid(format!("duplicate step id '{}'", step.id)));
        }
        if index > 0 && step.resource_type == ResourceType::Group {
            return Err(invalid(format!(
                "step '{}' declares a second group; only the first step may be a group",
                step.id
            )));
        }

        let mut reaches_root = index == 0;
        for dep in &step.depends_on {
            if dep == &step.id {
                return Err(invalid(format!("step '{}' depends on itself", step.id)));
            }
            if !seen.contains_key(dep.as_str()) {
                if declared.contains(dep.as_str()) {
                    return Err(invalid(format!(
                        "step '{}' depends on '{}', which appears later in the plan",
                        step.id, dep
                    )));
                }
                return Err(invalid(format!(
                    "step '{}' depends on undeclared step '{}'",
                    step.id, dep
                )));
            }
            reaches_root |= rooted.get(dep.as_str()).copied().unwrap_or(false);
        }
        if !reaches_root {
            return Err(invalid(format!(
                "step '{}' does not depend on the group '{}'",
                step.id, first.id
            )));
        }

        for (attribute, key) in &step.exports {
            if !is_output_key(key) {
                return Err(invalid(format!(
                    "step '{}' exports invalid key '{}'",
                    step.id, key
                )));
            }
            if key == STATUS_KEY || key == RUN_SEED_KEY {
                return Err(invalid(format!(
                    "step '{}' exports reserved key '{}'",
                    step.id, key
                )));
            }
            for (owner, prefix) in &generated_prefixes {
                if !key.starts_with(prefix.as_str()) {
                    continue;
                }
                let own_default =
                    *owner == step.id && *key == upper_snake(&format!("{}_{}", step.id, attribute));
                if !own_default {
                    return Err(invalid(format!(
                        "output key '{}' exported by '{}' collides with the keys generated for step '{}'",
                        key, step.id, owner
                    )));
                }
            }
            if let Some(owner) = export_keys.insert(key.as_str(), step.id.as_str()) {
                return Err(invalid(format!(
                    "output key '{}' is exported by both '{}' and '{}'",
                    key, owner, step.id
                )));
            }
        }

        names.validate_label(step.resource_type, &step.name_label)?;

        seen.insert(step.id.as_str(), index);
        rooted.insert(step.id.as_str(), reaches_root);
    }

    Ok(())
}

/// `UPPER_SNAKE` keys only
pub(crate) fn is_output_key(key: &str) -> bool {
    key.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && key
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}
