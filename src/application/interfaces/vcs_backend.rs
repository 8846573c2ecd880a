use async_trait::async_trait;

use crate::domain::{BlameHunk, CommitInfo, DomainError, EntryKind, Repository, TreeEntry};

/// Whether a usable local copy of a repository exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneStatus {
    Cloned,
    NotCloned,
}

/// The versioned-storage boundary. Every operation addressing a commit takes
/// a full hash, never a symbolic revision, so reads are pinned to a snapshot.
///
/// Implementations report an unknown or inaccessible repository as `None`
/// (or an empty listing) rather than an error.
#[async_trait]
pub trait VcsBackend: Send + Sync {
    /// Metadata for a known repository. Never triggers a fetch.
    async fn repository(&self, uri: &str) -> Result<Option<Repository>, DomainError>;

    /// All repositories the backend knows about, ordered by URI.
    async fn list_repositories(&self) -> Result<Vec<Repository>, DomainError>;

    async fn clone_status(&self, uri: &str) -> Result<CloneStatus, DomainError>;

    /// Clone the repository, or update an existing copy. Resolves once the
    /// local copy reflects the remote.
    async fn fetch(&self, uri: &str) -> Result<(), DomainError>;

    /// Resolve a branch, tag or hash to a full commit hash.
    async fn resolve_revision(&self, uri: &str, rev: &str) -> Result<Option<String>, DomainError>;

    async fn branches(&self, uri: &str) -> Result<Vec<String>, DomainError>;

    async fn tags(&self, uri: &str) -> Result<Vec<String>, DomainError>;

    /// Kind of the entry at `path` (`""` is the root directory).
    async fn entry_kind(
        &self,
        uri: &str,
        commit: &str,
        path: &str,
    ) -> Result<Option<EntryKind>, DomainError>;

    /// Entries under the directory at `path`: immediate children, or every
    /// descendant when `recursive`. `None` when `path` is not a directory.
    async fn list_tree(
        &self,
        uri: &str,
        commit: &str,
        path: &str,
        recursive: bool,
    ) -> Result<Option<Vec<TreeEntry>>, DomainError>;

    async fn read_file(
        &self,
        uri: &str,
        commit: &str,
        path: &str,
    ) -> Result<Option<Vec<u8>>, DomainError>;

    /// First-parent history of `path` starting at `commit`, newest first.
    async fn file_history(
        &self,
        uri: &str,
        commit: &str,
        path: &str,
    ) -> Result<Vec<CommitInfo>, DomainError>;

    /// Line attribution for lines `start..=end` (1-based) of `path`.
    async fn blame(
        &self,
        uri: &str,
        commit: &str,
        path: &str,
        start: u32,
        end: u32,
    ) -> Result<Vec<BlameHunk>, DomainError>;
}
