use std::sync::Arc;

use crate::application::RepositoryStore;
use crate::domain::{DomainError, Repository};

pub struct ListRepositoriesUseCase {
    store: Arc<RepositoryStore>,
}

impl ListRepositoriesUseCase {
    pub fn new(store: Arc<RepositoryStore>) -> Self {
        Self { store }
    }

    pub async fn execute(&self) -> Result<Vec<Repository>, DomainError> {
        self.store.list_repositories().await
    }

    pub async fn get_by_uri(&self, uri: &str) -> Result<Option<Repository>, DomainError> {
        self.store.repository(uri).await
    }
}
