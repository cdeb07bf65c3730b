use base64::Engine;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use swagger_sync::{
    BranchRef, ChangedFile, FileWrite, HostError, NewPull, PullQuery, PullRequest, RepoFile,
    RepoHost, WriteResult,
};

use crate::http::{HttpClient, HttpError, RetryPolicy};
use crate::links::encode_path;
use crate::wire::{
    ApiErrorBody, CommitResponse, ContentResponse, CreatedPull, PullResponse, PutContentResponse,
    RefResponse,
};

/// Configuration for a GitHub repository client.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub owner: String,
    pub repo: String,
    pub token: String,
    pub api_base_url: Option<String>,
}

/// GitHub REST client bound to one repository.
pub struct GitHubClient {
    config: GitHubConfig,
    http: HttpClient,
}

/// GitHub's `message` field if the body carries one, else the raw body.
fn api_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.message)
        .unwrap_or_else(|_| body.to_owned())
}

fn host_error(e: HttpError) -> HostError {
    match e {
        HttpError::Status { status: 404, url, .. } => HostError::NotFound(url),
        HttpError::Status { status, body, .. } => HostError::Api {
            status,
            message: api_message(&body),
        },
        HttpError::Transport { message, .. } => HostError::Network(message),
    }
}

impl GitHubClient {
    pub fn new(config: GitHubConfig, policy: RetryPolicy) -> Self {
        Self {
            config,
            http: HttpClient::new(policy),
        }
    }

    pub fn owner(&self) -> &str {
        &self.config.owner
    }

    fn api_base(&self) -> &str {
        self.config
            .api_base_url
            .as_deref()
            .unwrap_or(crate::DEFAULT_API_BASE)
    }

    /// `{api}/repos/{owner}/{repo}/{tail}`. Branch names and file paths in
    /// `tail` must already be encoded with [`encode_path`].
    fn repo_url(&self, tail: &str) -> String {
        format!(
            "{}/repos/{}/{}/{tail}",
            self.api_base(),
            urlencoding::encode(&self.config.owner),
            urlencoding::encode(&self.config.repo)
        )
    }

    fn build_request(
        &self,
        client: &reqwest::Client,
        method: Method,
        url: &str,
    ) -> reqwest::RequestBuilder {
        client
            .request(method, url)
            .header("User-Agent", crate::USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.config.token))
    }

    async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<String, HostError> {
        self.http
            .call(url, |client| {
                let req = self.build_request(client, method.clone(), url);
                match body {
                    Some(body) => req.json(body),
                    None => req,
                }
            })
            .await
            .map_err(host_error)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<T, HostError> {
        let text = self.send(method, url, body).await?;
        serde_json::from_str(&text).map_err(|e| HostError::Parse(format!("{url}: {e}")))
    }

    /// GET an arbitrary API URL with this client's credentials and return the
    /// raw body.
    pub async fn get_raw(&self, url: &str) -> Result<String, HostError> {
        self.send(Method::GET, url, None).await
    }

    fn decode_content(response: &ContentResponse) -> Result<String, HostError> {
        let Some(encoded) = response.content.as_deref() else {
            return Ok(String::new());
        };

        // GitHub wraps base64 content at 60 columns
        let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&cleaned)
            .map_err(|e| HostError::Parse(format!("base64 decode failed: {e}")))?;

        String::from_utf8(bytes).map_err(|e| HostError::Parse(format!("invalid UTF-8: {e}")))
    }
}

#[async_trait::async_trait]
impl RepoHost for GitHubClient {
    async fn get_branch_ref(&self, branch: &str) -> Result<BranchRef, HostError> {
        let url = self.repo_url(&format!("git/refs/heads/{}", encode_path(branch)));
        let response: RefResponse = self.send_json(Method::GET, &url, None).await?;
        response
            .object
            .map(|o| BranchRef { sha: o.sha })
            .ok_or_else(|| HostError::Parse(format!("{url}: ref has no object")))
    }

    async fn create_branch(&self, branch: &str, base: &str) -> Result<bool, HostError> {
        let base_ref = self.get_branch_ref(base).await?;
        debug!(%base, sha = %base_ref.sha, "base branch sha retrieved");

        let body = json!({
            "ref": format!("refs/heads/{branch}"),
            "sha": base_ref.sha,
        });

        match self
            .send_json::<RefResponse>(Method::POST, &self.repo_url("git/refs"), Some(&body))
            .await
        {
            Ok(RefResponse { reference: Some(_), .. }) => Ok(true),
            Ok(_) => Ok(false),
            Err(HostError::Api { status: 422, message }) if message.contains("already exists") => {
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn delete_branch(&self, branch: &str) -> Result<(), HostError> {
        let url = self.repo_url(&format!("git/refs/heads/{}", encode_path(branch)));
        self.send(Method::DELETE, &url, None).await?;
        Ok(())
    }

    async fn read_file(&self, branch: &str, path: &str) -> Result<RepoFile, HostError> {
        let url = self.repo_url(&format!(
            "contents/{}?ref={}",
            encode_path(path),
            urlencoding::encode(branch)
        ));
        let response: ContentResponse = self.send_json(Method::GET, &url, None).await?;
        let content = Self::decode_content(&response)?;

        Ok(RepoFile {
            path: response.path,
            branch: branch.to_owned(),
            sha: response.sha,
            content,
            download_url: response.download_url,
        })
    }

    async fn write_file(&self, write: &FileWrite) -> Result<WriteResult, HostError> {
        let url = self.repo_url(&format!("contents/{}", encode_path(&write.path)));

        let mut body = json!({
            "message": write.message,
            "content": base64::engine::general_purpose::STANDARD.encode(&write.content),
            "branch": write.branch,
        });
        if let Some(sha) = &write.sha {
            body["sha"] = Value::String(sha.clone());
        }

        let response: PutContentResponse = self.send_json(Method::PUT, &url, Some(&body)).await?;
        let new_sha = response.content.and_then(|c| c.sha);
        let commit_sha = response.commit.and_then(|c| c.sha);

        let changed = !matches!(
            (&write.sha, &new_sha),
            (Some(old), Some(new)) if old == new
        );

        Ok(WriteResult {
            changed,
            new_sha,
            commit_sha,
        })
    }

    async fn commit_changed_files(&self, commit_sha: &str) -> Result<Vec<ChangedFile>, HostError> {
        let url = self.repo_url(&format!("commits/{}", urlencoding::encode(commit_sha)));
        let response: CommitResponse = self.send_json(Method::GET, &url, None).await?;

        Ok(response
            .files
            .into_iter()
            .map(|f| ChangedFile {
                path: f.filename,
                additions: f.additions,
                deletions: f.deletions,
            })
            .collect())
    }

    async fn merge_branch(&self, from: &str, to: &str, message: &str) -> Result<(), HostError> {
        let body = json!({
            "base": format!("refs/heads/{to}"),
            "head": format!("refs/heads/{from}"),
            "commit_message": message,
        });
        self.send(Method::POST, &self.repo_url("merges"), Some(&body))
            .await?;
        Ok(())
    }

    async fn list_pulls(&self, query: &PullQuery) -> Result<Vec<PullRequest>, HostError> {
        let mut tail = format!("pulls?state={}&per_page=100", query.state);
        if let Some(head) = &query.head_branch {
            let head = format!("{}:{head}", self.config.owner);
            tail.push_str(&format!("&head={}", urlencoding::encode(&head)));
        }

        let pulls: Vec<PullResponse> = self
            .send_json(Method::GET, &self.repo_url(&tail), None)
            .await?;

        Ok(pulls
            .into_iter()
            .map(|p| PullRequest {
                number: p.number,
                title: p.title,
                state: p.state,
                head_branch: p.head.reference,
            })
            .collect())
    }

    async fn create_pull(&self, pull: &NewPull) -> Result<Option<u64>, HostError> {
        let body = json!({
            "head": pull.head,
            "base": pull.base,
            "title": pull.title,
        });
        let created: CreatedPull = self
            .send_json(Method::POST, &self.repo_url("pulls"), Some(&body))
            .await?;
        Ok(created.number)
    }

    async fn close_pull(&self, number: u64) -> Result<(), HostError> {
        let body = json!({ "state": "closed" });
        self.send(
            Method::PATCH,
            &self.repo_url(&format!("pulls/{number}")),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    async fn request_reviewers(&self, number: u64, reviewers: &[String]) -> Result<(), HostError> {
        let body = json!({ "reviewers": reviewers });
        self.send(
            Method::POST,
            &self.repo_url(&format!("pulls/{number}/requested_reviewers")),
            Some(&body),
        )
        .await?;
        Ok(())
    }
}
