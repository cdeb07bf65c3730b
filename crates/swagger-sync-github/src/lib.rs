pub mod client;
pub mod fetch;
pub mod http;
pub mod links;
mod wire;

pub use client::{GitHubClient, GitHubConfig};
pub use fetch::HttpSpecFetcher;
pub use http::{HttpClient, HttpError, RetryPolicy};
pub use links::{LinkError, RepoPath, contents_api_url};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

pub(crate) const USER_AGENT: &str = "swagger-sync";
