use std::fmt;
use std::sync::Arc;

/// Errors returned by a repository host.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("parse error: {0}")]
    Parse(String),
}

impl HostError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Head commit of a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    pub sha: String,
}

/// A file as currently stored on a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoFile {
    pub path: String,
    pub branch: String,
    pub sha: String,
    pub content: String,
    pub download_url: Option<String>,
}

/// A create-or-update request for a single file.
///
/// `sha` is the optimistic-concurrency token: `None` means the file is
/// expected not to exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileWrite {
    pub branch: String,
    pub path: String,
    pub content: String,
    pub message: String,
    pub sha: Option<String>,
}

/// Result of a file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResult {
    /// False when the stored blob sha did not move, i.e. identical content.
    pub changed: bool,
    pub new_sha: Option<String>,
    /// Commit created by the write, when the host reports one.
    pub commit_sha: Option<String>,
}

/// Per-file line statistics of a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    pub path: String,
    pub additions: u64,
    pub deletions: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullState {
    Open,
    Closed,
    All,
}

impl PullState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::All => "all",
        }
    }
}

impl fmt::Display for PullState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter for listing pull requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullQuery {
    pub state: PullState,
    /// Restrict to pull requests whose head is this branch.
    pub head_branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub state: String,
    pub head_branch: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPull {
    pub head: String,
    pub base: String,
    pub title: String,
}

/// The narrow set of repository operations the sync workflow needs.
///
/// Every call is scoped to the single repository the host was built for.
#[async_trait::async_trait]
pub trait RepoHost: Send + Sync {
    /// Head commit of `branch`. Fails with `NotFound` if the branch is absent.
    async fn get_branch_ref(&self, branch: &str) -> Result<BranchRef, HostError>;

    /// Create `branch` pointing at the head of `base`.
    /// Returns `false` when the branch already exists.
    async fn create_branch(&self, branch: &str, base: &str) -> Result<bool, HostError>;

    async fn delete_branch(&self, branch: &str) -> Result<(), HostError>;

    /// Read a file. Fails with `NotFound` if it does not exist on `branch`.
    async fn read_file(&self, branch: &str, path: &str) -> Result<RepoFile, HostError>;

    async fn write_file(&self, write: &FileWrite) -> Result<WriteResult, HostError>;

    async fn commit_changed_files(&self, commit_sha: &str) -> Result<Vec<ChangedFile>, HostError>;

    /// Merge `from` into `to` with a merge commit.
    async fn merge_branch(&self, from: &str, to: &str, message: &str) -> Result<(), HostError>;

    async fn list_pulls(&self, query: &PullQuery) -> Result<Vec<PullRequest>, HostError>;

    /// Open a pull request. Returns `None` if the host answered without a number.
    async fn create_pull(&self, pull: &NewPull) -> Result<Option<u64>, HostError>;

    async fn close_pull(&self, number: u64) -> Result<(), HostError>;

    async fn request_reviewers(&self, number: u64, reviewers: &[String]) -> Result<(), HostError>;
}

#[async_trait::async_trait]
impl<T: RepoHost + ?Sized> RepoHost for Arc<T> {
    async fn get_branch_ref(&self, branch: &str) -> Result<BranchRef, HostError> {
        (**self).get_branch_ref(branch).await
    }

    async fn create_branch(&self, branch: &str, base: &str) -> Result<bool, HostError> {
        (**self).create_branch(branch, base).await
    }

    async fn delete_branch(&self, branch: &str) -> Result<(), HostError> {
        (**self).delete_branch(branch).await
    }

    async fn read_file(&self, branch: &str, path: &str) -> Result<RepoFile, HostError> {
        (**self).read_file(branch, path).await
    }

    async fn write_file(&self, write: &FileWrite) -> Result<WriteResult, HostError> {
        (**self).write_file(write).await
    }

    async fn commit_changed_files(&self, commit_sha: &str) -> Result<Vec<ChangedFile>, HostError> {
        (**self).commit_changed_files(commit_sha).await
    }

    async fn merge_branch(&self, from: &str, to: &str, message: &str) -> Result<(), HostError> {
        (**self).merge_branch(from, to, message).await
    }

    async fn list_pulls(&self, query: &PullQuery) -> Result<Vec<PullRequest>, HostError> {
        (**self).list_pulls(query).await
    }

    async fn create_pull(&self, pull: &NewPull) -> Result<Option<u64>, HostError> {
        (**self).create_pull(pull).await
    }

    async fn close_pull(&self, number: u64) -> Result<(), HostError> {
        (**self).close_pull(number).await
    }

    async fn request_reviewers(&self, number: u64, reviewers: &[String]) -> Result<(), HostError> {
        (**self).request_reviewers(number, reviewers).await
    }
}
