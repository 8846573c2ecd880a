use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::application::RepositoryDirectory;
use crate::domain::{DomainError, RemoteRepository};

const DEFAULT_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("repograph/", env!("CARGO_PKG_VERSION"));
const PER_PAGE: usize = 100;
const MAX_PAGES: usize = 10;

/// Subset of the GitHub repository object we map.
#[derive(Deserialize)]
struct ApiRepository {
    full_name: String,
    description: Option<String>,
    language: Option<String>,
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    private: bool,
    created_at: Option<String>,
    pushed_at: Option<String>,
}

impl From<ApiRepository> for RemoteRepository {
    fn from(repo: ApiRepository) -> Self {
        Self {
            uri: format!("github.com/{}", repo.full_name),
            description: repo.description.unwrap_or_default(),
            language: repo.language.unwrap_or_default(),
            fork: repo.fork,
            private: repo.private,
            created_at: repo.created_at.unwrap_or_default(),
            pushed_at: repo.pushed_at.unwrap_or_default(),
        }
    }
}

/// A [`RepositoryDirectory`] backed by the GitHub REST API.
///
/// **Token**: read from `GITHUB_TOKEN` by [`from_env`](Self::from_env); the
/// listings are those of the token's user.
/// **Base URL**: `GITHUB_API_URL`, defaulting to `https://api.github.com`
/// (set it for GitHub Enterprise).
pub struct GithubRepositoryDirectory {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl GithubRepositoryDirectory {
    pub fn new(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let base: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            token: token.into(),
            base_url: base.trim_end_matches('/').to_string(),
        }
    }

    /// `None` when `GITHUB_TOKEN` is unset.
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("GITHUB_TOKEN").ok()?;
        let base = std::env::var("GITHUB_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Some(Self::new(token, base))
    }

    async fn list(&self, path: &str) -> Result<Vec<RemoteRepository>, DomainError> {
        let mut out = Vec::new();
        for page in 1..=MAX_PAGES {
            let url = format!(
                "{}{}?per_page={}&page={}",
                self.base_url, path, PER_PAGE, page
            );
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.token)
                .header("User-Agent", USER_AGENT)
                .header("Accept", "application/vnd.github+json")
                .send()
                .await
                .map_err(|e| DomainError::upstream(format!("GET {} failed: {}", path, e)))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(DomainError::upstream(format!(
                    "GET {} returned {}: {}",
                    path, status, body
                )));
            }

            let body = response
                .text()
                .await
                .map_err(|e| DomainError::upstream(format!("GET {} read failed: {}", path, e)))?;
            let batch = Self::parse_page(&body)?;
            let done = batch.len() < PER_PAGE;
            out.extend(batch);
            if done {
                break;
            }
        }
        debug!(path, "discovered {} repositories", out.len());
        Ok(out)
    }

    fn parse_page(body: &str) -> Result<Vec<RemoteRepository>, DomainError> {
        let repos: Vec<ApiRepository> = serde_json::from_str(body)
            .map_err(|e| DomainError::upstream(format!("malformed repository listing: {}", e)))?;
        Ok(repos.into_iter().map(RemoteRepository::from).collect())
    }
}

#[async_trait]
impl RepositoryDirectory for GithubRepositoryDirectory {
    async fn repositories(&self) -> Result<Vec<RemoteRepository>, DomainError> {
        self.list("/user/repos").await
    }

    async fn starred_repositories(&self) -> Result<Vec<RemoteRepository>, DomainError> {
        self.list("/user/starred").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_page_maps_fields() {
        let body = r#"[{"full_name":"acme/widgets","description":null,"language":"Rust",
            "fork":true,"private":false,"created_at":"2020-01-01T00:00:00Z","pushed_at":null}]"#;
        let repos = GithubRepositoryDirectory::parse_page(body).unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].uri, "github.com/acme/widgets");
        assert_eq!(repos[0].description, "");
        assert_eq!(repos[0].language, "Rust");
        assert!(repos[0].fork);
        assert_eq!(repos[0].pushed_at, "");
    }

    #[test]
    fn parse_page_rejects_non_array() {
        let err = GithubRepositoryDirectory::parse_page(r#"{"message":"Bad credentials"}"#)
            .unwrap_err();
        assert_eq!(err.code(), "UPSTREAM_UNAVAILABLE");
    }
}
