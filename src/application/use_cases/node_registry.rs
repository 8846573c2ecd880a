use std::sync::Arc;

use tracing::debug;

use crate::application::RepositoryStore;
use crate::domain::{Commit, DomainError, NodeId, NodeKind, Repository};

/// A resolved `Node`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Repository(Repository),
    Commit(Commit),
}

/// Encodes global ids for node-capable entities and resolves them back by
/// dispatching on the encoded kind.
pub struct NodeRegistry {
    store: Arc<RepositoryStore>,
}

impl NodeRegistry {
    pub fn new(store: Arc<RepositoryStore>) -> Self {
        Self { store }
    }

    pub fn repository_id(repo: &Repository) -> String {
        NodeId::repository(repo.uri()).encode()
    }

    pub fn commit_id(commit: &Commit) -> String {
        NodeId::commit(commit.repository_uri(), commit.sha1()).encode()
    }

    /// `Err(InvalidId)` for a malformed id, `Ok(None)` when the entity no
    /// longer exists.
    pub async fn node(&self, id: &str) -> Result<Option<Node>, DomainError> {
        let node_id = NodeId::decode(id)?;
        match node_id.kind() {
            NodeKind::Repository => Ok(self
                .store
                .repository(node_id.key())
                .await?
                .map(Node::Repository)),
            NodeKind::Commit => {
                let (uri, sha) = node_id
                    .commit_parts()
                    .ok_or_else(|| DomainError::invalid_id(id.to_string()))?;
                if self.store.repository(uri).await?.is_none() {
                    debug!(uri, "node lookup for unknown repository");
                    return Ok(None);
                }
                Ok(self.store.commit_by_hash(uri, sha).await?.map(Node::Commit))
            }
        }
    }
}
