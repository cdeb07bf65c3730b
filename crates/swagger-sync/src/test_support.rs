use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

use crate::fetch::{FetchError, SpecFetcher};
use crate::host::{
    BranchRef, ChangedFile, FileWrite, HostError, NewPull, PullQuery, PullRequest, PullState,
    RepoFile, RepoHost, WriteResult,
};

/// Host operations, for failure injection and call inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    GetBranchRef,
    CreateBranch,
    DeleteBranch,
    ReadFile,
    WriteFile,
    CommitChangedFiles,
    MergeBranch,
    ListPulls,
    CreatePull,
    ClosePull,
    RequestReviewers,
}

#[derive(Default)]
struct State {
    /// branch -> head commit
    branches: HashMap<String, String>,
    /// (branch, path) -> content
    files: HashMap<(String, String), String>,
    commits: HashMap<String, Vec<ChangedFile>>,
    pulls: Vec<PullRequest>,
    next_commit: u64,
    calls: Vec<Op>,
    failing: HashSet<Op>,
    panicking: HashSet<Op>,
    omit_pull_number: bool,
    reviewer_requests: Vec<(u64, Vec<String>)>,
    merges: Vec<(String, String, String)>,
}

impl State {
    fn enter(&mut self, op: Op) -> Result<(), HostError> {
        self.calls.push(op);
        if self.panicking.contains(&op) {
            panic!("injected panic in {op:?}");
        }
        if self.failing.contains(&op) {
            return Err(HostError::Api {
                status: 500,
                message: format!("injected failure in {op:?}"),
            });
        }
        Ok(())
    }

    fn new_commit(&mut self) -> String {
        self.next_commit += 1;
        format!("commit-{}", self.next_commit)
    }

    fn branch_files(&self, branch: &str) -> Vec<(String, String)> {
        self.files
            .iter()
            .filter(|((b, _), _)| b == branch)
            .map(|((_, path), content)| (path.clone(), content.clone()))
            .collect()
    }
}

/// Deterministic stand-in for a git blob sha.
pub fn content_sha(content: &str) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

/// Line statistics between two revisions: common leading and trailing lines
/// are ignored, the rest counts as removed (old) and added (new).
pub fn line_stats(old: &str, new: &str) -> (u64, u64) {
    let old: Vec<&str> = old.lines().collect();
    let new: Vec<&str> = new.lines().collect();

    let prefix = old.iter().zip(&new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let additions = (new.len() - prefix - suffix) as u64;
    let deletions = (old.len() - prefix - suffix) as u64;
    (additions, deletions)
}

/// In-memory repository host for testing. Branches carry their own file sets,
/// writes are sha-checked the way the contents API checks them, and every
/// call is recorded.
pub struct InMemoryRepoHost {
    owner: String,
    state: Mutex<State>,
}

impl InMemoryRepoHost {
    /// A repository with a single empty `base` branch.
    pub fn new(base: &str) -> Self {
        let host = Self {
            owner: "owner".to_owned(),
            state: Mutex::new(State::default()),
        };
        {
            let mut state = host.lock();
            let commit = state.new_commit();
            state.branches.insert(base.to_owned(), commit);
        }
        host
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn seed_branch(&self, branch: &str) {
        let mut state = self.lock();
        let commit = state.new_commit();
        state.branches.insert(branch.to_owned(), commit);
    }

    pub fn seed_file(&self, branch: &str, path: &str, content: &str) {
        self.lock()
            .files
            .insert((branch.to_owned(), path.to_owned()), content.to_owned());
    }

    /// Add a pull request and return its number.
    pub fn seed_pull(&self, head: &str, title: &str, state: PullState) -> u64 {
        let mut s = self.lock();
        let number = s.pulls.len() as u64 + 1;
        s.pulls.push(PullRequest {
            number,
            title: title.to_owned(),
            state: state.as_str().to_owned(),
            head_branch: head.to_owned(),
        });
        number
    }

    pub fn fail_on(&self, op: Op) {
        self.lock().failing.insert(op);
    }

    pub fn panic_on(&self, op: Op) {
        self.lock().panicking.insert(op);
    }

    /// Make `create_pull` answer without a pull request number.
    pub fn omit_pull_number(&self) {
        self.lock().omit_pull_number = true;
    }

    pub fn has_branch(&self, branch: &str) -> bool {
        self.lock().branches.contains_key(branch)
    }

    pub fn file(&self, branch: &str, path: &str) -> Option<String> {
        self.lock()
            .files
            .get(&(branch.to_owned(), path.to_owned()))
            .cloned()
    }

    pub fn pulls(&self) -> Vec<PullRequest> {
        self.lock().pulls.clone()
    }

    pub fn open_pulls(&self) -> Vec<PullRequest> {
        self.lock()
            .pulls
            .iter()
            .filter(|p| p.state == "open")
            .cloned()
            .collect()
    }

    pub fn calls(&self) -> Vec<Op> {
        self.lock().calls.clone()
    }

    pub fn called(&self, op: Op) -> bool {
        self.lock().calls.contains(&op)
    }

    pub fn merges(&self) -> Vec<(String, String, String)> {
        self.lock().merges.clone()
    }

    pub fn reviewer_requests(&self) -> Vec<(u64, Vec<String>)> {
        self.lock().reviewer_requests.clone()
    }
}

#[async_trait::async_trait]
impl RepoHost for InMemoryRepoHost {
    async fn get_branch_ref(&self, branch: &str) -> Result<BranchRef, HostError> {
        let mut state = self.lock();
        state.enter(Op::GetBranchRef)?;
        state
            .branches
            .get(branch)
            .map(|sha| BranchRef { sha: sha.clone() })
            .ok_or_else(|| HostError::NotFound(format!("branch {branch}")))
    }

    async fn create_branch(&self, branch: &str, base: &str) -> Result<bool, HostError> {
        let mut state = self.lock();
        state.enter(Op::CreateBranch)?;

        let head = state
            .branches
            .get(base)
            .cloned()
            .ok_or_else(|| HostError::NotFound(format!("branch {base}")))?;

        if state.branches.contains_key(branch) {
            return Ok(false);
        }

        for (path, content) in state.branch_files(base) {
            state.files.insert((branch.to_owned(), path), content);
        }
        state.branches.insert(branch.to_owned(), head);
        Ok(true)
    }

    async fn delete_branch(&self, branch: &str) -> Result<(), HostError> {
        let mut state = self.lock();
        state.enter(Op::DeleteBranch)?;

        if state.branches.remove(branch).is_none() {
            return Err(HostError::NotFound(format!("branch {branch}")));
        }
        state.files.retain(|(b, _), _| b != branch);
        Ok(())
    }

    async fn read_file(&self, branch: &str, path: &str) -> Result<RepoFile, HostError> {
        let mut state = self.lock();
        state.enter(Op::ReadFile)?;

        let content = state
            .files
            .get(&(branch.to_owned(), path.to_owned()))
            .cloned()
            .ok_or_else(|| HostError::NotFound(format!("{branch}:{path}")))?;

        Ok(RepoFile {
            path: path.to_owned(),
            branch: branch.to_owned(),
            sha: content_sha(&content),
            download_url: Some(format!("https://raw.example/{}/{branch}/{path}", self.owner)),
            content,
        })
    }

    async fn write_file(&self, write: &FileWrite) -> Result<WriteResult, HostError> {
        let mut state = self.lock();
        state.enter(Op::WriteFile)?;

        if !state.branches.contains_key(&write.branch) {
            return Err(HostError::NotFound(format!("branch {}", write.branch)));
        }

        let key = (write.branch.clone(), write.path.clone());
        let existing = state.files.get(&key).cloned();

        match (&existing, &write.sha) {
            (Some(current), Some(sha)) if &content_sha(current) != sha => {
                return Err(HostError::Api {
                    status: 409,
                    message: format!("{} does not match {sha}", write.path),
                });
            }
            (Some(_), None) => {
                return Err(HostError::Api {
                    status: 422,
                    message: "\"sha\" wasn't supplied".to_owned(),
                });
            }
            _ => {}
        }

        let new_sha = content_sha(&write.content);
        let changed = write.sha.as_deref() != Some(new_sha.as_str());

        let commit_sha = if existing.as_deref() == Some(write.content.as_str()) {
            None
        } else {
            let (additions, deletions) = line_stats(existing.as_deref().unwrap_or(""), &write.content);
            let commit = state.new_commit();
            state.commits.insert(
                commit.clone(),
                vec![ChangedFile {
                    path: write.path.clone(),
                    additions,
                    deletions,
                }],
            );
            state.branches.insert(write.branch.clone(), commit.clone());
            state.files.insert(key, write.content.clone());
            Some(commit)
        };

        Ok(WriteResult {
            changed,
            new_sha: Some(new_sha),
            commit_sha,
        })
    }

    async fn commit_changed_files(&self, commit_sha: &str) -> Result<Vec<ChangedFile>, HostError> {
        let mut state = self.lock();
        state.enter(Op::CommitChangedFiles)?;
        state
            .commits
            .get(commit_sha)
            .cloned()
            .ok_or_else(|| HostError::NotFound(format!("commit {commit_sha}")))
    }

    async fn merge_branch(&self, from: &str, to: &str, message: &str) -> Result<(), HostError> {
        let mut state = self.lock();
        state.enter(Op::MergeBranch)?;

        if !state.branches.contains_key(from) || !state.branches.contains_key(to) {
            return Err(HostError::NotFound(format!("merge {from} -> {to}")));
        }

        for (path, content) in state.branch_files(from) {
            state.files.insert((to.to_owned(), path), content);
        }
        let commit = state.new_commit();
        state.branches.insert(to.to_owned(), commit);
        state
            .merges
            .push((from.to_owned(), to.to_owned(), message.to_owned()));
        Ok(())
    }

    async fn list_pulls(&self, query: &PullQuery) -> Result<Vec<PullRequest>, HostError> {
        let mut state = self.lock();
        state.enter(Op::ListPulls)?;

        Ok(state
            .pulls
            .iter()
            .filter(|p| query.state == PullState::All || p.state == query.state.as_str())
            .filter(|p| {
                query
                    .head_branch
                    .as_deref()
                    .is_none_or(|head| p.head_branch == head)
            })
            .cloned()
            .collect())
    }

    async fn create_pull(&self, pull: &NewPull) -> Result<Option<u64>, HostError> {
        let mut state = self.lock();
        state.enter(Op::CreatePull)?;

        if !state.branches.contains_key(&pull.head) {
            return Err(HostError::Api {
                status: 422,
                message: format!("head {} does not exist", pull.head),
            });
        }

        let number = state.pulls.len() as u64 + 1;
        state.pulls.push(PullRequest {
            number,
            title: pull.title.clone(),
            state: "open".to_owned(),
            head_branch: pull.head.clone(),
        });

        if state.omit_pull_number {
            return Ok(None);
        }
        Ok(Some(number))
    }

    async fn close_pull(&self, number: u64) -> Result<(), HostError> {
        let mut state = self.lock();
        state.enter(Op::ClosePull)?;

        let pull = state
            .pulls
            .iter_mut()
            .find(|p| p.number == number)
            .ok_or_else(|| HostError::NotFound(format!("pull {number}")))?;
        pull.state = "closed".to_owned();
        Ok(())
    }

    async fn request_reviewers(&self, number: u64, reviewers: &[String]) -> Result<(), HostError> {
        let mut state = self.lock();
        state.enter(Op::RequestReviewers)?;
        state.reviewer_requests.push((number, reviewers.to_vec()));
        Ok(())
    }
}

/// Fetcher serving fixed bodies by URL. Unknown URLs answer HTTP 404.
#[derive(Default)]
pub struct StaticFetcher {
    bodies: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.bodies.insert(url.into(), body.into());
        self
    }
}

#[async_trait::async_trait]
impl SpecFetcher for StaticFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.bodies.get(url).cloned().ok_or_else(|| FetchError::Status {
            status: 404,
            url: url.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_stats_counts_changed_region() {
        assert_eq!(line_stats("a\nb\nc", "a\nB\nc"), (1, 1));
        assert_eq!(line_stats("", "a\nb"), (2, 0));
        assert_eq!(line_stats("a\nb\nc", "a\nc"), (0, 1));
        assert_eq!(line_stats("a", "a"), (0, 0));
    }

    #[tokio::test]
    async fn branch_copies_base_files() {
        let host = InMemoryRepoHost::new("main");
        host.seed_file("main", "x.json", "{}");

        assert!(host.create_branch("feature", "main").await.unwrap());
        assert!(!host.create_branch("feature", "main").await.unwrap());
        assert_eq!(host.file("feature", "x.json").as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn write_requires_matching_sha() {
        let host = InMemoryRepoHost::new("main");
        host.seed_file("main", "x.json", "old");

        let mut write = FileWrite {
            branch: "main".into(),
            path: "x.json".into(),
            content: "new".into(),
            message: "m".into(),
            sha: None,
        };
        assert!(host.write_file(&write).await.is_err());

        write.sha = Some(content_sha("old"));
        let result = host.write_file(&write).await.unwrap();
        assert!(result.changed);
        assert!(result.commit_sha.is_some());
    }

    #[tokio::test]
    async fn identical_write_is_unchanged() {
        let host = InMemoryRepoHost::new("main");
        host.seed_file("main", "x.json", "same");

        let result = host
            .write_file(&FileWrite {
                branch: "main".into(),
                path: "x.json".into(),
                content: "same".into(),
                message: "m".into(),
                sha: Some(content_sha("same")),
            })
            .await
            .unwrap();
        assert!(!result.changed);
        assert!(result.commit_sha.is_none());
    }

    #[tokio::test]
    async fn injected_failure_surfaces_as_api_error() {
        let host = InMemoryRepoHost::new("main");
        host.fail_on(Op::ListPulls);
        let err = host
            .list_pulls(&PullQuery {
                state: PullState::All,
                head_branch: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, HostError::Api { status: 500, .. }));
    }
}
