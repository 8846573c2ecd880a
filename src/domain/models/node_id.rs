//! Global object identifiers.
//!
//! An id is the standard base64 encoding of `<Kind>:<native key>`. The kind
//! prefix keeps ids of different kinds disjoint even when their native keys
//! coincide.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::domain::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Repository,
    Commit,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Repository => "Repository",
            NodeKind::Commit => "Commit",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "Repository" => Some(NodeKind::Repository),
            "Commit" => Some(NodeKind::Commit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeId {
    kind: NodeKind,
    key: String,
}

impl NodeId {
    pub fn new(kind: NodeKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }

    pub fn repository(uri: &str) -> Self {
        Self::new(NodeKind::Repository, uri)
    }

    pub fn commit(uri: &str, sha1: &str) -> Self {
        Self::new(NodeKind::Commit, format!("{}@{}", uri, sha1))
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Split a commit key back into `(uri, sha1)`.
    pub fn commit_parts(&self) -> Option<(&str, &str)> {
        if self.kind != NodeKind::Commit {
            return None;
        }
        self.key.rsplit_once('@')
    }

    pub fn encode(&self) -> String {
        STANDARD.encode(format!("{}:{}", self.kind.as_str(), self.key))
    }

    pub fn decode(id: &str) -> Result<Self, DomainError> {
        let bytes = STANDARD
            .decode(id)
            .map_err(|_| DomainError::invalid_id(format!("not base64: {}", id)))?;
        let raw = String::from_utf8(bytes)
            .map_err(|_| DomainError::invalid_id(format!("not UTF-8: {}", id)))?;
        let (kind, key) = raw
            .split_once(':')
            .ok_or_else(|| DomainError::invalid_id(format!("missing kind: {}", id)))?;
        let kind = NodeKind::parse(kind)
            .ok_or_else(|| DomainError::invalid_id(format!("unknown kind '{}'", kind)))?;
        if key.is_empty() {
            return Err(DomainError::invalid_id(format!("empty key: {}", id)));
        }
        let node = Self::new(kind, key);
        if kind == NodeKind::Commit {
            match node.commit_parts() {
                Some((uri, sha)) if !uri.is_empty() && !sha.is_empty() => {}
                _ => {
                    return Err(DomainError::invalid_id(format!(
                        "commit id must name a repository and a hash: {}",
                        id
                    )))
                }
            }
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_is_identity() {
        let id = NodeId::repository("github.com/acme/widgets").encode();
        let decoded = NodeId::decode(&id).unwrap();
        assert_eq!(decoded.kind(), NodeKind::Repository);
        assert_eq!(decoded.key(), "github.com/acme/widgets");
        assert_eq!(decoded.encode(), id);
    }

    #[test]
    fn test_kinds_do_not_collide() {
        let a = NodeId::new(NodeKind::Repository, "x@y").encode();
        let b = NodeId::new(NodeKind::Commit, "x@y").encode();
        assert_ne!(a, b);
    }

    #[test]
    fn test_commit_parts() {
        let id = NodeId::commit("github.com/acme/widgets", "abc123");
        assert_eq!(id.commit_parts(), Some(("github.com/acme/widgets", "abc123")));
    }

    #[test]
    fn test_malformed_ids_are_rejected() {
        assert!(NodeId::decode("%%%").is_err());
        assert!(NodeId::decode(&STANDARD.encode("no-kind")).is_err());
        assert!(NodeId::decode(&STANDARD.encode("Blob:abc")).is_err());
        assert!(NodeId::decode(&STANDARD.encode("Commit:missing-sha")).is_err());
        let err = NodeId::decode("%%%").unwrap_err();
        assert_eq!(err.code(), "INVALID_ID");
    }
}
