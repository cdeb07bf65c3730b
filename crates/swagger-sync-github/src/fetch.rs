use swagger_sync::{FetchError, SpecFetcher};

use crate::http::{HttpClient, HttpError, RetryPolicy};

/// Fetches specification documents over plain HTTP(S), without credentials.
#[derive(Debug, Clone, Default)]
pub struct HttpSpecFetcher {
    http: HttpClient,
}

impl HttpSpecFetcher {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            http: HttpClient::new(policy),
        }
    }
}

#[async_trait::async_trait]
impl SpecFetcher for HttpSpecFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        self.http
            .call(url, |client| {
                client.get(url).header("User-Agent", crate::USER_AGENT)
            })
            .await
            .map_err(|e| match e {
                HttpError::Status { status, url, .. } => FetchError::Status { status, url },
                HttpError::Transport { message, .. } => FetchError::Network(message),
            })
    }
}
