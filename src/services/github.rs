//! Remote content fetcher for the GitHub repository contents API.
//!
//! Retrieves one file's metadata and base64 content per request, retrying
//! transport failures and error statuses with exponential backoff.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, Url};

use crate::models::remote_file::RemoteFileContent;
use crate::models::repository::RepositoryLocator;
use crate::services::retry::{self, RetryPolicy, RetryableError};

const GITHUB_ACCEPT: &str = "application/vnd.github+json";
const GITHUB_API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const GITHUB_API_VERSION: &str = "2022-11-28";

/// Failure to retrieve a file from the remote content API.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("error making request to remote API: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("remote API request failed with status code: {0}")]
    Status(u16),

    #[error("error reading response: {0}")]
    Body(#[source] reqwest::Error),

    #[error("error unmarshalling JSON: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

impl RetryableError for FetchError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Status(_))
    }
}

/// Source of remote file content.
///
/// `base_endpoint` is the value of `contents_endpoint` for the repository;
/// the file URL is `base_endpoint + file_path`.
pub trait ContentFetcher: Send + Sync + 'static {
    fn fetch(
        &self,
        base_endpoint: &str,
        file_path: &str,
    ) -> impl Future<Output = Result<RemoteFileContent, FetchError>> + Send;

    /// Contents endpoint for a repository.
    fn contents_endpoint(&self, repo: &RepositoryLocator) -> String;
}

/// Authenticated client for the GitHub contents API.
#[derive(Clone)]
pub struct GitHubClient {
    http: Client,
    api_base: String,
    token: String,
    retry: RetryPolicy,
}

impl fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitHubClient")
            .field("api_base", &self.api_base)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl GitHubClient {
    /// Build a client. The token is resolved once by the caller and reused
    /// for every request.
    pub fn new(
        api_base: impl Into<String>,
        token: impl Into<String>,
        retry: RetryPolicy,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(concat!("scanledger/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            retry,
        })
    }

    async fn fetch_once(&self, url: &Url) -> Result<RemoteFileContent, FetchError> {
        let response = self
            .http
            .get(url.clone())
            .header(ACCEPT, GITHUB_ACCEPT)
            .header(GITHUB_API_VERSION_HEADER, GITHUB_API_VERSION)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(FetchError::Transport)?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await.map_err(FetchError::Body)?;
        Ok(serde_json::from_slice(&body)?)
    }
}

impl ContentFetcher for GitHubClient {
    async fn fetch(
        &self,
        base_endpoint: &str,
        file_path: &str,
    ) -> Result<RemoteFileContent, FetchError> {
        let raw = format!("{base_endpoint}{file_path}");
        let url = Url::parse(&raw).map_err(|e| FetchError::InvalidUrl(format!("{raw}: {e}")))?;

        retry::retry(&self.retry, url.as_str(), || self.fetch_once(&url)).await
    }

    fn contents_endpoint(&self, repo: &RepositoryLocator) -> String {
        format!("{}/repos/{}/{}/contents/", self.api_base, repo.owner, repo.name)
    }
}
