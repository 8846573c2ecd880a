use async_trait::async_trait;

use crate::domain::{DomainError, RemoteRepository};

/// External repository listing used for discovery.
#[async_trait]
pub trait RepositoryDirectory: Send + Sync {
    /// Repositories owned by or accessible to the configured account.
    async fn repositories(&self) -> Result<Vec<RemoteRepository>, DomainError>;

    /// Repositories the configured account has starred.
    async fn starred_repositories(&self) -> Result<Vec<RemoteRepository>, DomainError>;
}
