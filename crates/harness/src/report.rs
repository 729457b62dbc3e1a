//! Run report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{ErrorKind, HarnessResult};
use crate::ledger::{Release, ReleaseOutcome};

/// Why a scenario did not run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    /// Filtered out by tag or name selection
    Deselected,
    /// Configuration cannot satisfy a fixture
    MissingFixture(String),
    /// A value an earlier scenario should have published is absent
    MissingPrerequisite(String),
    /// An earlier fatal failure stopped the run
    Aborted { by: String },
    /// The scenario decided not to run
    SelfSkipped(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Deselected => write!(f, "deselected"),
            SkipReason::MissingFixture(reason) => write!(f, "missing fixture: {}", reason),
            SkipReason::MissingPrerequisite(reason) => write!(f, "{}", reason),
            SkipReason::Aborted { by } => write!(f, "run aborted by {}", by),
            SkipReason::SelfSkipped(reason) => write!(f, "{}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed { error: String, kind: ErrorKind },
    Skipped { reason: SkipReason },
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Passed => "passed",
            Outcome::Failed { .. } => "failed",
            Outcome::Skipped { .. } => "skipped",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub priority: i32,
    pub outcome: Outcome,
    pub duration_ms: u64,
}

/// Outcome of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Scenario whose failure stopped the run
    pub aborted_by: Option<String>,
    pub scenarios: Vec<ScenarioReport>,
    pub cleanup: Vec<Release>,
    pub cleanup_warnings: Vec<String>,
}

impl RunReport {
    pub fn new(
        started_at: DateTime<Utc>,
        duration_ms: u64,
        scenarios: Vec<ScenarioReport>,
        aborted_by: Option<String>,
        cleanup: Vec<Release>,
    ) -> Self {
        let count = |label: &str| scenarios.iter().filter(|s| s.outcome.label() == label).count();
        let passed = count("passed");
        let failed = count("failed");
        let skipped = count("skipped");
        let cleanup_warnings = cleanup
            .iter()
            .filter_map(|r| match &r.outcome {
                ReleaseOutcome::Failed(err) => Some(format!("{}: {}", r.resource, err)),
                _ => None,
            })
            .collect();

        Self {
            started_at,
            duration_ms,
            total: scenarios.len(),
            passed,
            failed,
            skipped,
            aborted_by,
            scenarios,
            cleanup,
            cleanup_warnings,
        }
    }

    /// No scenario failed. Cleanup warnings do not affect the verdict.
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    pub fn scenario(&self, name: &str) -> Option<&ScenarioReport> {
        self.scenarios.iter().find(|s| s.name == name)
    }

    /// Serialize into `dir/run-report.<ext>`, returning the path written
    pub fn write(&self, dir: &Path, format: ReportFormat) -> HarnessResult<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("run-report.{}", format.extension()));
        let content = match format {
            ReportFormat::Json => serde_json::to_string_pretty(self)?,
            ReportFormat::Yaml => serde_yaml::to_string(self)?,
        };
        std::fs::write(&path, content)?;
        Ok(path)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Json,
    Yaml,
}

impl ReportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Yaml => "yaml",
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "yaml" | "yml" => Ok(ReportFormat::Yaml),
            other => Err(format!("unknown report format '{}' (expected json or yaml)", other)),
        }
    }
}
