//! Run-scoped accumulator of created resources

use crate::error::{ProvisionError, Result};
use crate::naming::RunSeed;
use crate::resource::ResourceRecord;
use serde::{Deserialize, Serialize};

/// Lifecycle of one orchestrator run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Aborted,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Aborted)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Idle => write!(f, "idle"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Aborted => write!(f, "aborted"),
        }
    }
}

/// Non-fatal failure of a best-effort step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepWarning {
    pub step_id: String,
    pub cause: String,
}

impl std::fmt::Display for StepWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.step_id, self.cause)
    }
}

/// Mutable state of a single run, passed from step to step
///
/// Created fresh for every run and never reused. Records are append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    run_seed: RunSeed,
    records: Vec<ResourceRecord>,
    warnings: Vec<StepWarning>,
    status: RunStatus,
}

impl RunContext {
    /// Fresh context seeded from the wall clock
    pub fn new() -> Self {
        Self::with_seed(RunSeed::now())
    }

    pub fn with_seed(run_seed: RunSeed) -> Self {
        Self {
            run_seed,
            records: Vec::new(),
            warnings: Vec::new(),
            status: RunStatus::Idle,
        }
    }

    pub fn run_seed(&self) -> RunSeed {
        self.run_seed
    }

    pub fn records(&self) -> &[ResourceRecord] {
        &self.records
    }

    pub fn warnings(&self) -> &[StepWarning] {
        &self.warnings
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Record produced by `step_id`, if that step succeeded
    pub fn record(&self, step_id: &str) -> Option<&ResourceRecord> {
        self.records.iter().find(|r| r.step_id() == step_id)
    }

    pub fn has_record(&self, step_id: &str) -> bool {
        self.record(step_id).is_some()
    }

    /// Record of a dependency a params function cannot do without
    pub fn require_record(&self, step_id: &str) -> Result<&ResourceRecord> {
        self.record(step_id)
            .ok_or_else(|| ProvisionError::MissingRecord {
                step_id: step_id.to_string(),
            })
    }

    /// Attribute `key` of the record produced by `step_id`
    pub fn require_attribute(&self, step_id: &str, key: &str) -> Result<&str> {
        self.require_record(step_id)?
            .attribute(key)
            .ok_or_else(|| ProvisionError::MissingParameter {
                step_id: step_id.to_string(),
                key: key.to_string(),
            })
    }

    pub(crate) fn start(&mut self) {
        self.status = RunStatus::Running;
    }

    pub(crate) fn push_record(&mut self, record: ResourceRecord) {
        debug_assert!(!self.has_record(record.step_id()));
        self.records.push(record);
    }

    pub(crate) fn push_warning(&mut self, step_id: impl Into<String>, cause: impl Into<String>) {
        self.warnings.push(StepWarning {
            step_id: step_id.into(),
            cause: cause.into(),
        });
    }

    pub(crate) fn finish(&mut self, status: RunStatus) {
        debug_assert!(status.is_terminal());
        self.status = status;
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}
