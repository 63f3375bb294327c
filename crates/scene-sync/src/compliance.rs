//! Compliance contract.
//!
//! Building-code checking is owned by another service. The engine consumes a
//! pass/fail verdict and a list of violations and never requires the check
//! to succeed.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use scene_types::{BranchId, SceneId};

use crate::error::SyncResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
    /// No check ran (checker disabled).
    Skipped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub severity: Severity,
    pub title: String,
    pub description: String,
}

impl Violation {
    pub fn new(severity: Severity, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            severity,
            title: title.into(),
            description: description.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.title, self.description)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub status: ComplianceStatus,
    #[serde(default)]
    pub violations: Vec<Violation>,
}

impl ComplianceReport {
    pub fn compliant() -> Self {
        Self {
            status: ComplianceStatus::Compliant,
            violations: Vec::new(),
        }
    }

    pub fn non_compliant(violations: Vec<Violation>) -> Self {
        Self {
            status: ComplianceStatus::NonCompliant,
            violations,
        }
    }

    pub fn skipped() -> Self {
        Self {
            status: ComplianceStatus::Skipped,
            violations: Vec::new(),
        }
    }

    pub fn is_compliant(&self) -> bool {
        self.status != ComplianceStatus::NonCompliant
    }

    /// Violations rendered as `[SEVERITY] title: description`.
    pub fn messages(&self) -> Vec<String> {
        self.violations.iter().map(ToString::to_string).collect()
    }
}

#[async_trait]
pub trait ComplianceChecker: Send + Sync {
    async fn check(&self, scene_id: SceneId, branch_id: BranchId) -> SyncResult<ComplianceReport>;
}

/// Selected when compliance checking is turned off.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledComplianceChecker;

#[async_trait]
impl ComplianceChecker for DisabledComplianceChecker {
    async fn check(&self, scene_id: SceneId, branch_id: BranchId) -> SyncResult<ComplianceReport> {
        tracing::debug!(scene_id = %scene_id, branch_id = %branch_id, "compliance check skipped");
        Ok(ComplianceReport::skipped())
    }
}

/// Answers every check with a fixed report.
///
/// Used where the verdict comes from outside the process (a pre-computed
/// review) and in tests.
#[derive(Clone, Debug)]
pub struct StaticComplianceChecker {
    report: ComplianceReport,
}

impl StaticComplianceChecker {
    pub fn new(report: ComplianceReport) -> Self {
        Self { report }
    }

    pub fn compliant() -> Self {
        Self::new(ComplianceReport::compliant())
    }
}

#[async_trait]
impl ComplianceChecker for StaticComplianceChecker {
    async fn check(&self, scene_id: SceneId, branch_id: BranchId) -> SyncResult<ComplianceReport> {
        tracing::debug!(
            scene_id = %scene_id,
            branch_id = %branch_id,
            violations = self.report.violations.len(),
            "compliance check completed"
        );
        Ok(self.report.clone())
    }
}
