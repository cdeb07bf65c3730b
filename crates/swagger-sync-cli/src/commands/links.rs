use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Args;
use futures::future::try_join_all;
use serde_json::Value;
use swagger_sync::{RepoHost, SpecFetcher};
use swagger_sync_github::{GitHubClient, GitHubConfig, HttpSpecFetcher};
use tracing::info;

use crate::config::HttpArgs;
use crate::pipeline::{CICD_SCRIPT_VARIABLE, cicd_script, emit_variable};

pub const DEFAULT_LINKS_OWNER: &str = "atg-frontend";
pub const DEFAULT_LINKS_REPO: &str = "api-swagger-repos";

#[derive(Debug, Clone, Args)]
pub struct LinksArgs {
    /// Personal access token for the specification repository
    #[arg(long, env = "GITHUB_PAT", hide_env_values = true)]
    pub github_pat: String,

    /// Local mapping file
    #[arg(long, env = "FILE_PATH")]
    pub file: Option<PathBuf>,

    /// Remote mapping file
    #[arg(long, env = "FILE_URL")]
    pub url: Option<String>,

    #[arg(long, env = "GITHUB_BRANCH", default_value = "main")]
    pub branch: String,

    #[arg(long, env = "SWAGGER_LINKS_OWNER", default_value = DEFAULT_LINKS_OWNER)]
    pub owner: String,

    #[arg(long, env = "SWAGGER_LINKS_REPO", default_value = DEFAULT_LINKS_REPO)]
    pub repo: String,

    #[command(flatten)]
    pub http: HttpArgs,
}

/// `KEY -> path` pairs of the `swagger` object, in file order.
pub fn parse_mapping(raw: &str) -> Result<Vec<(String, String)>> {
    let document: Value = serde_json::from_str(raw).context("mapping file is not valid JSON")?;
    let Some(swagger) = document.get("swagger").and_then(Value::as_object) else {
        bail!("Cannot find key: swagger");
    };

    swagger
        .iter()
        .map(|(key, path)| match path.as_str() {
            Some(path) => Ok((key.clone(), path.to_owned())),
            None => bail!("swagger.{key} is not a string path"),
        })
        .collect()
}

/// Download URL of every mapped file on `branch`.
pub async fn resolve_links<H>(
    host: &H,
    branch: &str,
    mapping: &[(String, String)],
) -> Result<Vec<(String, String)>>
where
    H: RepoHost + ?Sized,
{
    try_join_all(mapping.iter().map(|(key, path)| async move {
        let file = host
            .read_file(branch, path)
            .await
            .with_context(|| format!("failed to read {path} for {key}"))?;
        let url = file
            .download_url
            .with_context(|| format!("{path} has no download URL"))?;
        Ok::<_, anyhow::Error>((key.clone(), url))
    }))
    .await
}

pub fn write_links(out: &mut impl Write, links: &[(String, String)]) -> Result<()> {
    for (key, url) in links {
        emit_variable(out, key, url)?;
    }
    emit_variable(out, CICD_SCRIPT_VARIABLE, &cicd_script(links))?;
    Ok(())
}

async fn read_mapping(args: &LinksArgs) -> Result<String> {
    match (&args.file, &args.url) {
        (Some(file), _) => std::fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display())),
        (None, Some(url)) => HttpSpecFetcher::new(args.http.retry_policy()?)
            .fetch_text(url)
            .await
            .with_context(|| format!("failed to fetch {url}")),
        (None, None) => bail!("FILE_PATH or FILE_URL is not set."),
    }
}

pub async fn run(args: LinksArgs) -> Result<()> {
    let mapping = parse_mapping(&read_mapping(&args).await?)?;
    info!(entries = mapping.len(), owner = %args.owner, repo = %args.repo, branch = %args.branch, "resolving links");

    let host = GitHubClient::new(
        GitHubConfig {
            owner: args.owner.clone(),
            repo: args.repo.clone(),
            token: args.github_pat.clone(),
            api_base_url: Some(args.http.github_api_url.clone()),
        },
        args.http.retry_policy()?,
    );

    let links = resolve_links(&host, &args.branch, &mapping).await?;
    write_links(&mut std::io::stdout().lock(), &links)
}

#[cfg(test)]
mod tests {
    use swagger_sync::test_support::InMemoryRepoHost;

    use super::*;

    #[test]
    fn mapping_keeps_file_order() {
        let mapping = parse_mapping(r#"{"swagger":{"ZED":"z/swagger.json","ALPHA":"a/swagger.json"}}"#).unwrap();
        assert_eq!(
            mapping,
            vec![
                ("ZED".to_owned(), "z/swagger.json".to_owned()),
                ("ALPHA".to_owned(), "a/swagger.json".to_owned()),
            ]
        );
    }

    #[test]
    fn mapping_requires_swagger_key() {
        let err = parse_mapping(r#"{"other":{}}"#).unwrap_err();
        assert_eq!(err.to_string(), "Cannot find key: swagger");
        assert!(parse_mapping(r#"{"swagger":{"A":1}}"#).is_err());
    }

    #[tokio::test]
    async fn links_resolve_to_download_urls() {
        let host = InMemoryRepoHost::new("main");
        host.seed_file("main", "orders/v2/swagger.json", "{}");
        host.seed_file("main", "users/v1/swagger.json", "{}");

        let mapping = vec![
            ("ORDERS".to_owned(), "orders/v2/swagger.json".to_owned()),
            ("USERS".to_owned(), "users/v1/swagger.json".to_owned()),
        ];
        let links = resolve_links(&host, "main", &mapping).await.unwrap();

        assert_eq!(links[0].0, "ORDERS");
        assert!(links[0].1.ends_with("/main/orders/v2/swagger.json"));

        let mut out = Vec::new();
        write_links(&mut out, &links).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 6);
        assert!(lines[4].starts_with("##vso[task.setvariable variable=AZURE_CICD_SCRIPT]\"ORDERS="));
    }

    #[tokio::test]
    async fn missing_file_fails_the_command() {
        let host = InMemoryRepoHost::new("main");
        let mapping = vec![("ORDERS".to_owned(), "orders/v2/swagger.json".to_owned())];
        assert!(resolve_links(&host, "main", &mapping).await.is_err());
    }
}
