use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use regex::Regex;
use swagger_sync::resolve::{DEFAULT_KEY_PATTERN, DEFAULT_VERSION_PATTERN};
use swagger_sync::settings::{DEFAULT_BASE_BRANCH, DEFAULT_BRANCH_PREFIX};
use swagger_sync::{Locator, Patterns, SpecSource, SyncSettings};
use swagger_sync_github::{DEFAULT_API_BASE, GitHubConfig, RetryPolicy};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const SPEC_SOURCE_VARIABLES: &str = "SWAGGER_URL or SWAGGER_FILE";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<String>),

    #[error("invalid {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

/// Transport options shared by every command that talks to GitHub.
#[derive(Debug, Clone, Args)]
pub struct HttpArgs {
    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_BASE)]
    pub github_api_url: String,

    /// Attempts per HTTP call, including the first
    #[arg(long, env = "HTTP_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub http_max_attempts: u32,

    /// Per-attempt timeout in seconds (0 disables it)
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub http_timeout_secs: u64,
}

impl HttpArgs {
    pub fn retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        if self.http_max_attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "HTTP_MAX_ATTEMPTS",
                message: "must be at least 1".into(),
            });
        }
        let timeout = (self.http_timeout_secs > 0).then(|| Duration::from_secs(self.http_timeout_secs));
        Ok(RetryPolicy::new(self.http_max_attempts, timeout))
    }
}

/// Raw `sync` arguments. Required values are optional here so that every
/// missing one can be reported at once.
#[derive(Debug, Clone, Args)]
pub struct SyncArgs {
    /// Personal access token for the target repository
    #[arg(long, env = "GITHUB_PAT", hide_env_values = true)]
    pub github_pat: Option<String>,

    /// Owner of the target repository
    #[arg(long, env = "GITHUB_USER")]
    pub github_user: Option<String>,

    /// Target repository name
    #[arg(long, env = "GITHUB_REPO")]
    pub github_repo: Option<String>,

    /// Prefix of the sync branches
    #[arg(long, env = "GITHUB_BRANCH", default_value = DEFAULT_BRANCH_PREFIX)]
    pub github_branch: String,

    /// Branch sync branches start from and merge into
    #[arg(long, env = "GITHUB_BRANCH_BASE", default_value = DEFAULT_BASE_BRANCH)]
    pub github_branch_base: String,

    /// Pipe-delimited reviewer logins
    #[arg(long, env = "GITHUB_REVIEWERS")]
    pub github_reviewers: Option<String>,

    /// URL of a single specification document
    #[arg(long, env = "SWAGGER_URL")]
    pub swagger_url: Option<String>,

    /// Manifest listing specification documents
    #[arg(long, env = "SWAGGER_FILE")]
    pub swagger_file: Option<PathBuf>,

    /// Pattern whose first capture group is the project name
    #[arg(long, env = "SWAGGER_KEY_REGEX", default_value = DEFAULT_KEY_PATTERN)]
    pub swagger_key_regex: String,

    /// Pattern whose first capture group is the folder name
    #[arg(long, env = "SWAGGER_VER_REGEX", default_value = DEFAULT_VERSION_PATTERN)]
    pub swagger_ver_regex: String,

    #[command(flatten)]
    pub http: HttpArgs,
}

/// Validated configuration of a sync run.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub github: GitHubConfig,
    pub settings: SyncSettings,
    pub source: SpecSource,
    pub patterns: Patterns,
    pub policy: RetryPolicy,
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

fn check_pattern(name: &'static str, pattern: &str) -> Result<(), ConfigError> {
    Regex::new(pattern).map(drop).map_err(|e| ConfigError::Invalid {
        name,
        message: e.to_string(),
    })
}

impl SyncArgs {
    pub fn validate(&self) -> Result<SyncConfig, ConfigError> {
        let token = present(&self.github_pat);
        let owner = present(&self.github_user);
        let repo = present(&self.github_repo);

        let url = present(&self.swagger_url);
        let no_source = url.is_none() && self.swagger_file.is_none();

        let missing: Vec<String> = [
            ("GITHUB_PAT", token.is_none()),
            ("GITHUB_USER", owner.is_none()),
            ("GITHUB_REPO", repo.is_none()),
            (SPEC_SOURCE_VARIABLES, no_source),
        ]
        .into_iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| name.to_owned())
        .collect();

        let (Some(token), Some(owner), Some(repo)) = (token, owner, repo) else {
            return Err(ConfigError::Missing(missing));
        };

        check_pattern("SWAGGER_KEY_REGEX", &self.swagger_key_regex)?;
        check_pattern("SWAGGER_VER_REGEX", &self.swagger_ver_regex)?;
        let patterns = Patterns {
            key: self.swagger_key_regex.clone(),
            version: self.swagger_ver_regex.clone(),
        };

        let source = match (url, &self.swagger_file) {
            (Some(url), _) => SpecSource::Remote(Locator::Pattern {
                url,
                patterns: patterns.clone(),
            }),
            (None, Some(file)) => SpecSource::Manifest(file.clone()),
            (None, None) => return Err(ConfigError::Missing(missing)),
        };

        let reviewers = self
            .github_reviewers
            .as_deref()
            .map(SyncSettings::parse_reviewers)
            .unwrap_or_default();

        Ok(SyncConfig {
            github: GitHubConfig {
                owner,
                repo,
                token,
                api_base_url: Some(self.http.github_api_url.clone()),
            },
            settings: SyncSettings {
                branch_prefix: self.github_branch.clone(),
                base_branch: self.github_branch_base.clone(),
                reviewers,
            },
            source,
            patterns,
            policy: self.http.retry_policy()?,
        })
    }
}
