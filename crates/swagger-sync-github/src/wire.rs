use serde::Deserialize;

/// `GET/POST /repos/{owner}/{repo}/git/refs...`
#[derive(Debug, Deserialize)]
pub struct RefResponse {
    #[serde(rename = "ref")]
    pub reference: Option<String>,
    pub object: Option<RefObject>,
}

#[derive(Debug, Deserialize)]
pub struct RefObject {
    pub sha: String,
}

/// `GET /repos/{owner}/{repo}/contents/{path}`
#[derive(Debug, Deserialize)]
pub struct ContentResponse {
    pub path: String,
    pub sha: String,
    pub content: Option<String>,
    pub download_url: Option<String>,
}

/// `PUT /repos/{owner}/{repo}/contents/{path}`
#[derive(Debug, Deserialize)]
pub struct PutContentResponse {
    pub content: Option<ShaOnly>,
    pub commit: Option<ShaOnly>,
}

#[derive(Debug, Deserialize)]
pub struct ShaOnly {
    pub sha: Option<String>,
}

/// `GET /repos/{owner}/{repo}/commits/{sha}`
#[derive(Debug, Deserialize)]
pub struct CommitResponse {
    #[serde(default)]
    pub files: Vec<CommitFile>,
}

#[derive(Debug, Deserialize)]
pub struct CommitFile {
    pub filename: String,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
}

/// Element of `GET /repos/{owner}/{repo}/pulls`
#[derive(Debug, Deserialize)]
pub struct PullResponse {
    pub number: u64,
    #[serde(default)]
    pub title: String,
    pub state: String,
    pub head: PullHead,
}

#[derive(Debug, Deserialize)]
pub struct PullHead {
    #[serde(rename = "ref")]
    pub reference: String,
}

/// `POST /repos/{owner}/{repo}/pulls`
#[derive(Debug, Deserialize)]
pub struct CreatedPull {
    pub number: Option<u64>,
}

/// Error body GitHub attaches to failed calls.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub message: String,
}
