/// Errors from fetching a specification document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP {status} fetching {url}")]
    Status { status: u16, url: String },

    #[error("network error: {0}")]
    Network(String),
}

/// Retrieves raw specification documents by URL.
#[async_trait::async_trait]
pub trait SpecFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError>;
}
