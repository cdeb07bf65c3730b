/// Prefix of every sync branch when none is configured.
pub const DEFAULT_BRANCH_PREFIX: &str = "swaggerbot";

/// Branch sync branches are created from and merged into.
pub const DEFAULT_BASE_BRANCH: &str = "main";

/// Separator of the reviewer list.
pub const REVIEWER_DELIMITER: char = '|';

/// Read-only settings shared by every item of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub branch_prefix: String,
    pub base_branch: String,
    pub reviewers: Vec<String>,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            branch_prefix: DEFAULT_BRANCH_PREFIX.to_owned(),
            base_branch: DEFAULT_BASE_BRANCH.to_owned(),
            reviewers: Vec::new(),
        }
    }
}

impl SyncSettings {
    /// Split a `|`-delimited reviewer list, dropping blank entries.
    pub fn parse_reviewers(raw: &str) -> Vec<String> {
        raw.split(REVIEWER_DELIMITER)
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_owned)
            .collect()
    }

    /// `{prefix}/{project}/{folder}/{version}`
    pub fn branch_name(&self, project: &str, folder: &str, version: &str) -> String {
        format!("{}/{project}/{folder}/{version}", self.branch_prefix)
    }
}
