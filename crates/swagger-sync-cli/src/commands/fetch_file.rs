use std::io::Write;

use anyhow::{Context, Result, bail};
use clap::Args;
use swagger_sync_github::{GitHubClient, GitHubConfig, RepoPath, contents_api_url};

use crate::config::HttpArgs;

#[derive(Debug, Clone, Args)]
pub struct FetchFileArgs {
    #[arg(long, env = "GITHUB_PAT", hide_env_values = true)]
    pub github_pat: String,

    /// github.com blob link, raw.githubusercontent.com link or API URL
    #[arg(long, env = "GITHUB_URL")]
    pub url: Option<String>,

    #[arg(long, env = "GITHUB_ORG")]
    pub owner: Option<String>,

    #[arg(long, env = "GITHUB_REPO")]
    pub repo: Option<String>,

    /// Path of the file inside the repository
    #[arg(long, env = "GITHUB_PATH")]
    pub path: Option<String>,

    #[command(flatten)]
    pub http: HttpArgs,
}

/// The contents API URL the command reads.
pub fn target_url(args: &FetchFileArgs) -> Result<String> {
    let api_base = &args.http.github_api_url;

    if let Some(url) = &args.url {
        return Ok(contents_api_url(url, api_base)?);
    }

    match (&args.owner, &args.repo, &args.path) {
        (Some(owner), Some(repo), Some(path)) => Ok(RepoPath {
            owner: owner.clone(),
            repo: repo.clone(),
            branch: None,
            path: path.clone(),
        }
        .contents_url(api_base)),
        _ => bail!("either GITHUB_URL or GITHUB_ORG, GITHUB_REPO and GITHUB_PATH are required"),
    }
}

pub async fn fetch(args: &FetchFileArgs) -> Result<String> {
    let url = target_url(args)?;
    let client = GitHubClient::new(
        GitHubConfig {
            owner: args.owner.clone().unwrap_or_default(),
            repo: args.repo.clone().unwrap_or_default(),
            token: args.github_pat.clone(),
            api_base_url: Some(args.http.github_api_url.clone()),
        },
        args.http.retry_policy()?,
    );

    client
        .get_raw(&url)
        .await
        .with_context(|| format!("failed to fetch {url}"))
}

pub async fn run(args: FetchFileArgs) -> Result<()> {
    let body = fetch(&args).await?;
    let mut out = std::io::stdout().lock();
    out.write_all(body.as_bytes())?;
    out.flush()?;
    Ok(())
}
