use async_trait::async_trait;

use crate::application::RepositoryDirectory;
use crate::domain::{DomainError, RemoteRepository};

/// A [`RepositoryDirectory`] with fixed listings. With no listings it stands
/// in for an unconfigured discovery service.
#[derive(Default)]
pub struct StaticRepositoryDirectory {
    repositories: Vec<RemoteRepository>,
    starred: Vec<RemoteRepository>,
}

impl StaticRepositoryDirectory {
    pub fn new(repositories: Vec<RemoteRepository>, starred: Vec<RemoteRepository>) -> Self {
        Self {
            repositories,
            starred,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RepositoryDirectory for StaticRepositoryDirectory {
    async fn repositories(&self) -> Result<Vec<RemoteRepository>, DomainError> {
        Ok(self.repositories.clone())
    }

    async fn starred_repositories(&self) -> Result<Vec<RemoteRepository>, DomainError> {
        Ok(self.starred.clone())
    }
}
