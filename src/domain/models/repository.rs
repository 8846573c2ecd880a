use serde::{Deserialize, Serialize};

use super::Commit;

/// A versioned repository known to the store, identified by its URI
/// (e.g. `github.com/acme/widgets`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    uri: String,
    description: String,
    default_branch: String,
}

impl Repository {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            description: String::new(),
            default_branch: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    /// Last path segment of the URI, used for display.
    pub fn name(&self) -> &str {
        self.uri.rsplit('/').next().unwrap_or(&self.uri)
    }
}

/// Result of resolving a revision: either a commit, a clone in progress,
/// or neither when the revision does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitState {
    commit: Option<Commit>,
    clone_in_progress: bool,
}

impl CommitState {
    pub fn resolved(commit: Commit) -> Self {
        Self {
            commit: Some(commit),
            clone_in_progress: false,
        }
    }

    pub fn cloning() -> Self {
        Self {
            commit: None,
            clone_in_progress: true,
        }
    }

    pub fn missing() -> Self {
        Self::default()
    }

    pub fn commit(&self) -> Option<&Commit> {
        self.commit.as_ref()
    }

    pub fn clone_in_progress(&self) -> bool {
        self.clone_in_progress
    }
}

/// Repository record returned by an external discovery listing.
/// Not traversable into commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepository {
    pub uri: String,
    pub description: String,
    pub language: String,
    pub fork: bool,
    pub private: bool,
    pub created_at: String,
    pub pushed_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_name_is_last_segment() {
        let repo = Repository::new("github.com/acme/widgets");
        assert_eq!(repo.name(), "widgets");
        assert_eq!(repo.description(), "");
    }

    #[test]
    fn test_commit_state_variants() {
        assert!(CommitState::cloning().clone_in_progress());
        assert!(CommitState::cloning().commit().is_none());

        let missing = CommitState::missing();
        assert!(!missing.clone_in_progress());
        assert!(missing.commit().is_none());

        let commit = Commit::new("github.com/acme/widgets", "a".repeat(40));
        let resolved = CommitState::resolved(commit.clone());
        assert_eq!(resolved.commit(), Some(&commit));
        assert!(!resolved.clone_in_progress());
    }
}
