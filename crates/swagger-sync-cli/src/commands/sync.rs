use std::io::Write;
use std::process::ExitCode;

use anyhow::{Context, Result};
use swagger_sync::{RepoHost, Resolver, RunSummary, SpecFetcher, SpecSource, sync_all};
use swagger_sync_github::{GitHubClient, HttpSpecFetcher};
use tracing::{error, info};

use crate::config::SyncConfig;

pub const STATUS_OK: &str = "ok";
pub const STATUS_FAILED: &str = "failed";

/// Resolve the configured sources and sync every item against `host`.
pub async fn execute<H, F>(host: &H, fetcher: F, config: &SyncConfig) -> RunSummary
where
    H: RepoHost + ?Sized,
    F: SpecFetcher,
{
    info!("fetching specifications");
    let resolver = Resolver::new(fetcher).with_patterns(config.patterns.clone());
    let resolutions = resolver.resolve(&config.source).await;
    info!(items = resolutions.len(), "processing items");

    sync_all(host, &config.settings, resolutions).await
}

/// Summary JSON followed by the status line.
pub fn write_report(out: &mut impl Write, summary: &RunSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary).context("failed to serialize summary")?;
    writeln!(out, "{json}")?;
    let status = if summary.is_healthy() { STATUS_OK } else { STATUS_FAILED };
    writeln!(out, "{status}")?;
    Ok(())
}

fn log_configuration(config: &SyncConfig) {
    let source = match &config.source {
        SpecSource::Remote(_) => "url",
        SpecSource::Manifest(_) => "file",
    };
    info!(
        owner = %config.github.owner,
        repo = %config.github.repo,
        branch_prefix = %config.settings.branch_prefix,
        base_branch = %config.settings.base_branch,
        reviewers = if config.settings.reviewers.is_empty() { "not set" } else { "set" },
        source,
        "configuration loaded"
    );
}

pub async fn run(config: SyncConfig) -> Result<ExitCode> {
    log_configuration(&config);

    let host = GitHubClient::new(config.github.clone(), config.policy);
    let fetcher = HttpSpecFetcher::new(config.policy);
    let summary = execute(&host, fetcher, &config).await;

    if !summary.is_healthy() {
        let failed: Vec<_> = summary.details.iter().filter(|d| d.is_failed()).collect();
        error!(count = failed.len(), details = ?failed, "failed items detected");
    }

    write_report(&mut std::io::stdout().lock(), &summary)?;

    Ok(if summary.is_healthy() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
