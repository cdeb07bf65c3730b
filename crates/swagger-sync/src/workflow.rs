//! Per-item sync workflow.
//!
//! Each item moves through: parse and version extraction, branch ensure,
//! file write, then either cleanup (unchanged content), auto-merge (trivial
//! version bump) or pull request management. Items share nothing but the
//! read-only settings and the host, and every item ends in an [`ItemReport`].

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;
use futures::future::join_all;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::host::{ChangedFile, FileWrite, HostError, NewPull, PullQuery, PullState, RepoHost, WriteResult};
use crate::outcome::{FailReason, ItemReport, RunSummary, SkipReason, SyncOutcome};
use crate::resolve::Resolution;
use crate::settings::SyncSettings;
use crate::spec::SpecItem;
use crate::version::{DocumentError, ParsedDocument};

const UNKNOWN: &str = "unknown";

/// A commit touching exactly one file with one line added and one removed is
/// taken to be a version-string-only change.
pub fn is_trivial_bump(files: &[ChangedFile]) -> bool {
    matches!(files, [only] if only.additions == 1 && only.deletions == 1)
}

/// Whether a pull request title refers to the document `key`
/// (`{project}/{folder}`). Matches whole words so `orders/v2` does not match
/// `orders/v20`.
pub fn title_mentions(title: &str, key: &str) -> bool {
    title.split_whitespace().any(|word| word == key)
}

/// Run the workflow for every resolution and aggregate the results. Never
/// short-circuits: every item produces a report, in input order.
///
/// Items of different documents run concurrently. Items of the same document
/// (`{project}/{folder}`) run one after another in input order, so each sees
/// the pull request opened by the one before it and closes it as stale.
pub async fn sync_all<H>(host: &H, settings: &SyncSettings, resolutions: Vec<Resolution>) -> RunSummary
where
    H: RepoHost + ?Sized,
{
    let started = Instant::now();

    let chains = group_by_document(resolutions).into_iter().map(|group| async move {
        let mut reports = Vec::with_capacity(group.len());
        for (index, resolution) in group {
            reports.push((index, run_guarded(host, settings, index, resolution).await));
        }
        reports
    });

    let mut indexed: Vec<(usize, ItemReport)> = join_all(chains).await.into_iter().flatten().collect();
    indexed.sort_by_key(|(index, _)| *index);
    let reports = indexed.into_iter().map(|(_, report)| report).collect();

    let summary = RunSummary::from_reports(reports, started.elapsed().as_secs_f64());

    info!(
        total = summary.total,
        success = summary.success,
        failed = summary.failed,
        skipped = summary.skipped,
        elapsed_secs = summary.elapsed_secs,
        "sync finished"
    );

    summary
}

/// Indexed resolutions grouped by document key, groups in order of first
/// appearance. Unavailable resolutions each get a group of their own.
fn group_by_document(resolutions: Vec<Resolution>) -> Vec<Vec<(usize, Resolution)>> {
    let mut groups: Vec<Vec<(usize, Resolution)>> = Vec::new();
    let mut by_key: HashMap<String, usize> = HashMap::new();

    for (index, resolution) in resolutions.into_iter().enumerate() {
        let slot = match &resolution {
            Resolution::Ready(item) => *by_key.entry(item.key()).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            }),
            Resolution::Unavailable { .. } => {
                groups.push(Vec::new());
                groups.len() - 1
            }
        };
        groups[slot].push((index, resolution));
    }

    groups
}

/// One item inside its own span. A panic is reported as
/// `failed(unexpected_error)`.
async fn run_guarded<H>(host: &H, settings: &SyncSettings, index: usize, resolution: Resolution) -> ItemReport
where
    H: RepoHost + ?Sized,
{
    let (project, folder) = match &resolution {
        Resolution::Ready(item) => (item.project.to_string(), item.folder.to_string()),
        Resolution::Unavailable { .. } => (UNKNOWN.to_owned(), UNKNOWN.to_owned()),
    };

    let span = info_span!(
        "item",
        index,
        project = %project,
        folder = %folder,
        version = tracing::field::Empty,
    );

    let work = async {
        match &resolution {
            Resolution::Ready(item) => sync_item(host, settings, item).await,
            Resolution::Unavailable { source, reason } => {
                warn!(%source, %reason, "skipping unavailable specification");
                let mut report =
                    ItemReport::new(UNKNOWN, UNKNOWN, None, SyncOutcome::Skipped(SkipReason::InvalidData));
                report.error = Some(format!("{source}: {reason}"));
                report
            }
        }
    };

    AssertUnwindSafe(work)
        .catch_unwind()
        .map(move |result| {
            result.unwrap_or_else(|_| {
                error!("item task panicked");
                ItemReport::new(
                    project,
                    folder,
                    None,
                    SyncOutcome::failed(FailReason::UnexpectedError, "item task panicked"),
                )
            })
        })
        .instrument(span)
        .await
}

/// Run the workflow for one resolved item.
pub async fn sync_item<H>(host: &H, settings: &SyncSettings, item: &SpecItem) -> ItemReport
where
    H: RepoHost + ?Sized,
{
    let project = item.project.as_str();
    let folder = item.folder.as_str();

    let parsed = match ParsedDocument::parse(&item.raw_content) {
        Ok(parsed) => parsed,
        Err(e) => {
            let outcome = match &e {
                DocumentError::InvalidJson(msg) => {
                    error!(url = %item.source_url, error = %msg, "failed to parse JSON");
                    SyncOutcome::failed(FailReason::JsonParseError, msg)
                }
                DocumentError::MissingVersion => {
                    error!(url = %item.source_url, "missing version in specification");
                    SyncOutcome::Failed { reason: FailReason::NoVersion, error: None }
                }
                DocumentError::EmptyVersion => {
                    warn!(url = %item.source_url, "empty version field");
                    SyncOutcome::Failed { reason: FailReason::EmptyVersion, error: None }
                }
            };
            return ItemReport::new(project, folder, None, outcome);
        }
    };

    let version = parsed.version.clone();
    tracing::Span::current().record("version", version.as_str());

    let outcome = run_steps(host, settings, item, &parsed).await;

    match &outcome {
        SyncOutcome::Success { pull_number } => info!(pull_number, "item processed"),
        SyncOutcome::Skipped(reason) => info!(%reason, "item skipped"),
        SyncOutcome::Failed { reason, error } => {
            error!(%reason, error = error.as_deref().unwrap_or(""), "item failed")
        }
    }

    ItemReport::new(project, folder, Some(version), outcome)
}

async fn run_steps<H>(host: &H, settings: &SyncSettings, item: &SpecItem, parsed: &ParsedDocument) -> SyncOutcome
where
    H: RepoHost + ?Sized,
{
    let content = match parsed.render() {
        Ok(content) => content,
        Err(e) => return SyncOutcome::failed(FailReason::UnexpectedError, e),
    };

    let key = item.key();
    let path = item.file_path();
    let branch = settings.branch_name(item.project.as_str(), item.folder.as_str(), &parsed.version);
    let commit_message = format!("build: bump {key} to {}", parsed.version);

    info!(%branch, "processing version");

    let branch_ready = match host.create_branch(&branch, &settings.base_branch).await {
        Ok(true) => {
            info!(%branch, "branch created");
            true
        }
        Ok(false) => {
            info!(%branch, "branch already exists");
            true
        }
        Err(e) => {
            // The write below still runs; it is rejected if the branch is missing.
            warn!(%branch, error = %e, "failed to create branch");
            false
        }
    };

    let write = match write_document(host, &branch, &path, content, &commit_message).await {
        Ok(write) => write,
        Err(e) if !branch_ready && e.is_not_found() => {
            return SyncOutcome::failed(FailReason::BranchCreationError, e);
        }
        Err(e) => {
            error!(%path, error = %e, "failed to write file");
            return SyncOutcome::failed(FailReason::FileCreationError, e);
        }
    };

    if !write.changed {
        debug!(%branch, "content unchanged");
        return match settle_unchanged(host, &branch).await {
            Ok(reason) => SyncOutcome::Skipped(reason),
            Err(e) => SyncOutcome::failed(FailReason::UnexpectedError, e),
        };
    }

    if let Some(commit_sha) = &write.commit_sha {
        let files = match host.commit_changed_files(commit_sha).await {
            Ok(files) => files,
            Err(e) => {
                error!(commit = %commit_sha, error = %e, "failed to inspect commit");
                return SyncOutcome::failed(FailReason::FileCreationError, e);
            }
        };

        if is_trivial_bump(&files) {
            info!(%branch, base = %settings.base_branch, "version-only change, auto-merging");
            let message = format!("auto merge {commit_message}");
            if let Err(e) = host.merge_branch(&branch, &settings.base_branch, &message).await {
                error!(%branch, error = %e, "auto-merge failed");
                return SyncOutcome::failed(FailReason::FileCreationError, e);
            }
            if let Err(e) = settle_unchanged(host, &branch).await {
                warn!(%branch, error = %e, "failed to clean up merged branch");
            }
            return SyncOutcome::Skipped(SkipReason::AutoMerged);
        }
    }

    if let Err(e) = close_stale_pulls(host, &key).await {
        warn!(%key, error = %e, "failed to close old pull requests");
    }

    let pull = NewPull {
        head: branch.clone(),
        base: settings.base_branch.clone(),
        title: commit_message,
    };

    let pull_number = match host.create_pull(&pull).await {
        Ok(Some(number)) => number,
        Ok(None) => {
            error!(%branch, "no pull number returned");
            return SyncOutcome::Failed { reason: FailReason::NoPullNumber, error: None };
        }
        Err(e) => {
            error!(%branch, error = %e, "failed to create pull request");
            return SyncOutcome::failed(FailReason::PrCreationError, e);
        }
    };

    info!(pull_number, "pull request created");

    if !settings.reviewers.is_empty() {
        match host.request_reviewers(pull_number, &settings.reviewers).await {
            Ok(()) => info!(pull_number, reviewers = ?settings.reviewers, "reviewers assigned"),
            Err(e) => warn!(pull_number, error = %e, "failed to assign reviewers"),
        }
    }

    SyncOutcome::Success { pull_number }
}

/// Create or update `path` on `branch`, using the current blob sha (if any) as
/// the concurrency token.
async fn write_document<H>(
    host: &H,
    branch: &str,
    path: &str,
    content: String,
    message: &str,
) -> Result<WriteResult, HostError>
where
    H: RepoHost + ?Sized,
{
    let sha = match host.read_file(branch, path).await {
        Ok(existing) => Some(existing.sha),
        Err(HostError::NotFound(_)) => None,
        Err(e) => {
            warn!(%path, error = %e, "failed to read existing file, writing without sha");
            None
        }
    };

    host.write_file(&FileWrite {
        branch: branch.to_owned(),
        path: path.to_owned(),
        content,
        message: message.to_owned(),
        sha,
    })
    .await
}

/// A branch whose content matches its base either belongs to an existing pull
/// request (kept) or is a leftover (deleted).
async fn settle_unchanged<H>(host: &H, branch: &str) -> Result<SkipReason, HostError>
where
    H: RepoHost + ?Sized,
{
    let pulls = host
        .list_pulls(&PullQuery {
            state: PullState::All,
            head_branch: Some(branch.to_owned()),
        })
        .await?;

    if !pulls.is_empty() {
        info!(%branch, count = pulls.len(), "pull request already exists");
        return Ok(SkipReason::PrExists);
    }

    host.delete_branch(branch).await?;
    info!(%branch, "branch removed");
    Ok(SkipReason::NoChanges)
}

/// Close every open pull request proposing an older revision of the same
/// document.
async fn close_stale_pulls<H>(host: &H, key: &str) -> Result<(), HostError>
where
    H: RepoHost + ?Sized,
{
    let open = host
        .list_pulls(&PullQuery {
            state: PullState::Open,
            head_branch: None,
        })
        .await?;

    let stale: Vec<_> = open.iter().filter(|pr| title_mentions(&pr.title, key)).collect();
    if stale.is_empty() {
        debug!(%key, "no stale pull requests");
        return Ok(());
    }

    info!(%key, numbers = ?stale.iter().map(|pr| pr.number).collect::<Vec<_>>(), "closing stale pull requests");

    let closed = join_all(stale.iter().map(|pr| host.close_pull(pr.number))).await;
    closed.into_iter().collect()
}
