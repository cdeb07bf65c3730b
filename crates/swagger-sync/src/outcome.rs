use std::fmt;

use serde::Serialize;

/// Why an item finished without opening a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The source could not be resolved into a usable document.
    InvalidData,
    /// Content unchanged and the sync branch already has a pull request.
    PrExists,
    /// Content unchanged; the sync branch was removed.
    NoChanges,
    /// Version-only change merged straight into the base branch.
    AutoMerged,
}

/// Why an item failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailReason {
    JsonParseError,
    NoVersion,
    EmptyVersion,
    BranchCreationError,
    FileCreationError,
    PrCreationError,
    NoPullNumber,
    UnexpectedError,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidData => "invalid_data",
            Self::PrExists => "pr_exists",
            Self::NoChanges => "no_changes",
            Self::AutoMerged => "auto_merged",
        }
    }
}

impl FailReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JsonParseError => "json_parse_error",
            Self::NoVersion => "no_version",
            Self::EmptyVersion => "empty_version",
            Self::BranchCreationError => "branch_creation_error",
            Self::FileCreationError => "file_creation_error",
            Self::PrCreationError => "pr_creation_error",
            Self::NoPullNumber => "no_pull_number",
            Self::UnexpectedError => "unexpected_error",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Success { pull_number: u64 },
    Skipped(SkipReason),
    Failed { reason: FailReason, error: Option<String> },
}

impl SyncOutcome {
    pub fn failed(reason: FailReason, error: impl fmt::Display) -> Self {
        Self::Failed {
            reason,
            error: Some(error.to_string()),
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Outcome of one item plus whatever identity was known when it finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemReport {
    pub project: String,
    pub folder: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pull_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub outcome: SyncOutcome,
}

impl ItemReport {
    pub fn new(
        project: impl Into<String>,
        folder: impl Into<String>,
        version: Option<String>,
        outcome: SyncOutcome,
    ) -> Self {
        let (status, reason, pull_number, error) = match &outcome {
            SyncOutcome::Success { pull_number } => ("success", None, Some(*pull_number), None),
            SyncOutcome::Skipped(reason) => ("skipped", Some(reason.as_str()), None, None),
            SyncOutcome::Failed { reason, error } => {
                ("failed", Some(reason.as_str()), None, error.clone())
            }
        };

        Self {
            project: project.into(),
            folder: folder.into(),
            version,
            status,
            reason,
            pull_number,
            error,
            outcome,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.outcome.is_failed()
    }
}

/// Aggregate of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
    pub elapsed_secs: f64,
    pub details: Vec<ItemReport>,
}

impl RunSummary {
    pub fn from_reports(details: Vec<ItemReport>, elapsed_secs: f64) -> Self {
        let count = |status: &str| details.iter().filter(|r| r.status == status).count();

        Self {
            total: details.len(),
            success: count("success"),
            failed: count("failed"),
            skipped: count("skipped"),
            elapsed_secs,
            details,
        }
    }

    /// A run is healthy when nothing failed; skipped items do not count.
    pub fn is_healthy(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_fields_follow_outcome() {
        let ok = ItemReport::new("orders", "v2", Some("1.0".into()), SyncOutcome::Success { pull_number: 7 });
        assert_eq!(ok.status, "success");
        assert_eq!(ok.pull_number, Some(7));
        assert!(ok.reason.is_none());

        let skipped = ItemReport::new("orders", "v2", None, SyncOutcome::Skipped(SkipReason::PrExists));
        assert_eq!(skipped.status, "skipped");
        assert_eq!(skipped.reason, Some("pr_exists"));

        let failed = ItemReport::new(
            "orders",
            "v2",
            None,
            SyncOutcome::failed(FailReason::FileCreationError, "HTTP 422"),
        );
        assert!(failed.is_failed());
        assert_eq!(failed.reason, Some("file_creation_error"));
        assert_eq!(failed.error.as_deref(), Some("HTTP 422"));
    }

    #[test]
    fn summary_counts() {
        let summary = RunSummary::from_reports(
            vec![
                ItemReport::new("a", "v1", None, SyncOutcome::Success { pull_number: 1 }),
                ItemReport::new("b", "v1", None, SyncOutcome::Skipped(SkipReason::NoChanges)),
                ItemReport::new("c", "v1", None, SyncOutcome::Skipped(SkipReason::AutoMerged)),
            ],
            0.5,
        );
        assert_eq!(summary.total, 3);
        assert_eq!(summary.success, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failed, 0);
        assert!(summary.is_healthy());
    }

    #[test]
    fn any_failure_makes_run_unhealthy() {
        let summary = RunSummary::from_reports(
            vec![
                ItemReport::new("a", "v1", None, SyncOutcome::Success { pull_number: 1 }),
                ItemReport::new(
                    "b",
                    "v1",
                    None,
                    SyncOutcome::Failed { reason: FailReason::NoVersion, error: None },
                ),
            ],
            0.0,
        );
        assert_eq!(summary.failed, 1);
        assert!(!summary.is_healthy());
    }

    #[test]
    fn summary_serializes_without_empty_fields() {
        let summary = RunSummary::from_reports(
            vec![ItemReport::new("a", "v1", None, SyncOutcome::Skipped(SkipReason::NoChanges))],
            1.25,
        );
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["skipped"], 1);
        assert_eq!(json["details"][0]["reason"], "no_changes");
        assert!(json["details"][0].get("pull_number").is_none());
        assert!(json["details"][0].get("outcome").is_none());
    }
}
