//! Run report persistence
//!
//! Keeps the JSON report of the most recent run in `.stackup/last-run.json`,
//! with the report before it kept as `last-run.json.backup`.

use crate::context::RunContext;
use crate::error::{ProvisionError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

const REPORT_VERSION: u32 = 1;
const REPORT_DIR: &str = ".stackup";
const REPORT_FILE: &str = "last-run.json";
const REPORT_BACKUP: &str = "last-run.json.backup";

/// Everything known about one finished (or aborted) run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Report file version
    pub version: u32,

    /// Provider the run talked to
    pub provider: String,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Error that aborted the run
    pub error: Option<String>,

    pub context: RunContext,
}

impl RunReport {
    pub fn new(
        provider: impl Into<String>,
        started_at: DateTime<Utc>,
        context: RunContext,
        error: Option<String>,
    ) -> Self {
        Self {
            version: REPORT_VERSION,
            provider: provider.into(),
            started_at,
            finished_at: Utc::now(),
            error,
            context,
        }
    }
}

/// Reads and writes run reports under a project root
pub struct ReportStore {
    project_root: PathBuf,
}

impl ReportStore {
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            project_root: project_root.as_ref().to_path_buf(),
        }
    }

    fn report_dir(&self) -> PathBuf {
        self.project_root.join(REPORT_DIR)
    }

    pub fn report_path(&self) -> PathBuf {
        self.report_dir().join(REPORT_FILE)
    }

    fn backup_path(&self) -> PathBuf {
        self.report_dir().join(REPORT_BACKUP)
    }

    /// Load the latest report, if any run has been recorded
    pub async fn load(&self) -> Result<Option<RunReport>> {
        let path = self.report_path();
        if !path.exists() {
            tracing::debug!("No run report at {}", path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&path).await?;
        let report: RunReport = serde_json::from_str(&content)?;

        if report.version > REPORT_VERSION {
            return Err(ProvisionError::Report(format!(
                "Report version {} is newer than supported version {}",
                report.version, REPORT_VERSION
            )));
        }

        Ok(Some(report))
    }

    /// Save `report`, keeping the previous one as a backup
    pub async fn save(&self, report: &RunReport) -> Result<()> {
        let dir = self.report_dir();
        if !dir.exists() {
            fs::create_dir_all(&dir).await?;
            tracing::debug!("Created report directory: {}", dir.display());
        }

        let path = self.report_path();
        let backup = self.backup_path();

        if path.exists() {
            if backup.exists() {
                fs::remove_file(&backup).await?;
            }
            fs::rename(&path, &backup).await?;
        }

        let content = serde_json::to_string_pretty(report)?;
        fs::write(&path, content).await?;

        tracing::debug!(
            "Saved run report with {} records",
            report.context.records().len()
        );
        Ok(())
    }
}
