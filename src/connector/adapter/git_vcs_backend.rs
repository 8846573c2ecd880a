use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use git2::{BlameOptions, BranchType, ErrorCode, ObjectType, Oid, Sort, TreeWalkMode, TreeWalkResult};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::application::{CloneStatus, VcsBackend};
use crate::domain::{
    join_path, BlameHunk, CommitInfo, DomainError, EntryKind, Repository, Signature, TreeEntry,
};

const DEFAULT_DESCRIPTION_PREFIX: &str = "Unnamed repository;";
const MAX_SCAN_DEPTH: usize = 6;

/// Versioned storage on local git repositories, read through libgit2.
///
/// Repositories live at `<root>/<uri>` (bare or not). Background fetches
/// clone from `clone_url` with `{uri}` substituted, mirroring branches and
/// tags. Every libgit2 call runs on the blocking pool.
pub struct GitVcsBackend {
    root: PathBuf,
    clone_url: String,
    registered: Arc<BTreeSet<String>>,
}

impl GitVcsBackend {
    pub fn new(root: impl Into<PathBuf>, clone_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            clone_url: clone_url.into(),
            registered: Arc::new(BTreeSet::new()),
        }
    }

    /// Repositories that may be cloned on demand even though no local copy
    /// exists yet.
    pub fn with_repositories(mut self, uris: impl IntoIterator<Item = String>) -> Self {
        self.registered = Arc::new(uris.into_iter().filter(|u| valid_uri(u)).collect());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn clone_url_for(&self, uri: &str) -> String {
        self.clone_url.replace("{uri}", uri)
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, DomainError>
    where
        F: FnOnce() -> Result<T, DomainError> + Send + 'static,
        T: Send + 'static,
    {
        tokio::task::spawn_blocking(f)
            .await
            .map_err(|e| DomainError::internal(format!("git task failed: {}", e)))?
    }

    /// Run `f` on the opened local copy of `uri`; `None` when not cloned.
    async fn with_repo<T, F>(&self, uri: &str, f: F) -> Result<Option<T>, DomainError>
    where
        F: FnOnce(&git2::Repository) -> Result<T, DomainError> + Send + 'static,
        T: Send + 'static,
    {
        let Some(path) = repo_path(&self.root, uri) else {
            return Ok(None);
        };
        self.blocking(move || match open(&path) {
            Some(repo) => f(&repo).map(Some),
            None => Ok(None),
        })
        .await
    }

    /// Run `f` on a commit of `uri`; `None` when not cloned or unknown hash.
    async fn with_commit<T, F>(&self, uri: &str, sha: &str, f: F) -> Result<Option<T>, DomainError>
    where
        F: FnOnce(&git2::Repository, &git2::Commit<'_>) -> Result<Option<T>, DomainError>
            + Send
            + 'static,
        T: Send + 'static,
    {
        let sha = sha.to_string();
        Ok(self
            .with_repo(uri, move |repo| {
                let Ok(oid) = Oid::from_str(&sha) else {
                    return Ok(None);
                };
                match repo.find_commit(oid) {
                    Ok(commit) => f(repo, &commit),
                    Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
                    Err(e) => Err(storage(e, &sha)),
                }
            })
            .await?
            .flatten())
    }
}

fn storage(err: git2::Error, context: &str) -> DomainError {
    DomainError::storage(format!("{}: {}", context, err.message()))
}

fn valid_uri(uri: &str) -> bool {
    !uri.is_empty()
        && !uri.starts_with('/')
        && !uri.contains('\\')
        && uri
            .split('/')
            .all(|part| !part.is_empty() && part != "." && part != "..")
}

fn repo_path(root: &Path, uri: &str) -> Option<PathBuf> {
    valid_uri(uri).then(|| root.join(uri))
}

fn open(path: &Path) -> Option<git2::Repository> {
    if !path.is_dir() {
        return None;
    }
    git2::Repository::open(path).ok()
}

fn looks_like_repo(path: &Path) -> bool {
    path.join(".git").exists() || (path.join("HEAD").is_file() && path.join("objects").is_dir())
}

fn signature(sig: &git2::Signature<'_>) -> Signature {
    Signature::at_epoch(
        sig.name().unwrap_or_default(),
        sig.email().unwrap_or_default(),
        sig.when().seconds(),
    )
}

fn describe(repo: &git2::Repository, uri: &str) -> Repository {
    let description = std::fs::read_to_string(repo.path().join("description"))
        .map(|d| d.trim().to_string())
        .unwrap_or_default();
    let description = if description.starts_with(DEFAULT_DESCRIPTION_PREFIX) {
        String::new()
    } else {
        description
    };
    let default_branch = repo
        .find_reference("HEAD")
        .ok()
        .and_then(|head| head.symbolic_target().map(str::to_string))
        .and_then(|target| target.strip_prefix("refs/heads/").map(str::to_string))
        .unwrap_or_default();
    Repository::new(uri)
        .with_description(description)
        .with_default_branch(default_branch)
}

fn subtree<'r>(
    repo: &'r git2::Repository,
    commit: &git2::Commit<'r>,
    path: &str,
) -> Result<Option<git2::Tree<'r>>, DomainError> {
    let root = commit.tree().map_err(|e| storage(e, "tree"))?;
    if path.is_empty() {
        return Ok(Some(root));
    }
    let entry = match root.get_path(Path::new(path)) {
        Ok(entry) => entry,
        Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
        Err(e) => return Err(storage(e, path)),
    };
    if entry.kind() != Some(ObjectType::Tree) {
        return Ok(None);
    }
    repo.find_tree(entry.id())
        .map(Some)
        .map_err(|e| storage(e, path))
}

fn entry_id(commit: &git2::Commit<'_>, path: &str) -> Option<Oid> {
    let tree = commit.tree().ok()?;
    tree.get_path(Path::new(path)).ok().map(|e| e.id())
}

#[async_trait]
impl VcsBackend for GitVcsBackend {
    async fn repository(&self, uri: &str) -> Result<Option<Repository>, DomainError> {
        let owned = uri.to_string();
        if let Some(repo) = self.with_repo(uri, move |r| Ok(describe(r, &owned))).await? {
            return Ok(Some(repo));
        }
        Ok(self
            .registered
            .contains(uri)
            .then(|| Repository::new(uri)))
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>, DomainError> {
        let root = self.root.clone();
        let registered = Arc::clone(&self.registered);
        self.blocking(move || {
            let mut found = BTreeSet::new();
            if root.is_dir() {
                let mut walker = WalkDir::new(&root)
                    .min_depth(1)
                    .max_depth(MAX_SCAN_DEPTH)
                    .follow_links(false)
                    .into_iter();
                while let Some(entry) = walker.next() {
                    let entry = match entry {
                        Ok(entry) => entry,
                        Err(_) => continue,
                    };
                    if !entry.file_type().is_dir() || !looks_like_repo(entry.path()) {
                        continue;
                    }
                    walker.skip_current_dir();
                    if let Ok(rel) = entry.path().strip_prefix(&root) {
                        let uri = rel.to_string_lossy().replace('\\', "/");
                        found.insert(uri);
                    }
                }
            }
            found.extend(registered.iter().cloned());

            Ok(found
                .into_iter()
                .map(|uri| match repo_path(&root, &uri).as_deref().and_then(open) {
                    Some(repo) => describe(&repo, &uri),
                    None => Repository::new(uri),
                })
                .collect())
        })
        .await
    }

    async fn clone_status(&self, uri: &str) -> Result<CloneStatus, DomainError> {
        Ok(match self.with_repo(uri, |_| Ok(())).await? {
            Some(()) => CloneStatus::Cloned,
            None => CloneStatus::NotCloned,
        })
    }

    async fn fetch(&self, uri: &str) -> Result<(), DomainError> {
        let path = repo_path(&self.root, uri)
            .ok_or_else(|| DomainError::invalid_input(format!("invalid repository uri: {}", uri)))?;
        let url = self.clone_url_for(uri);
        let uri = uri.to_string();

        self.blocking(move || {
            if let Some(repo) = open(&path) {
                let mut remote = repo
                    .find_remote("origin")
                    .or_else(|_| repo.remote_anonymous(&url))
                    .map_err(|e| storage(e, &uri))?;
                remote
                    .fetch(
                        &["+refs/heads/*:refs/heads/*", "+refs/tags/*:refs/tags/*"],
                        None,
                        None,
                    )
                    .map_err(|e| DomainError::upstream(format!("fetch {}: {}", uri, e.message())))?;
                debug!(uri = %uri, "updated local copy");
                return Ok(());
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            info!(uri = %uri, url = %url, "cloning");
            git2::build::RepoBuilder::new()
                .bare(true)
                .remote_create(|repo, name, url| {
                    repo.remote_with_fetch(name, url, "+refs/heads/*:refs/heads/*")
                })
                .clone(&url, &path)
                .map_err(|e| DomainError::upstream(format!("clone {}: {}", uri, e.message())))?;
            Ok(())
        })
        .await
    }

    async fn resolve_revision(&self, uri: &str, rev: &str) -> Result<Option<String>, DomainError> {
        let rev = rev.to_string();
        Ok(self
            .with_repo(uri, move |repo| {
                let object = match repo.revparse_single(&rev) {
                    Ok(object) => object,
                    Err(e) if matches!(e.code(), ErrorCode::NotFound | ErrorCode::Ambiguous) => {
                        return Ok(None)
                    }
                    Err(e) if e.code() == ErrorCode::InvalidSpec => {
                        return Err(DomainError::invalid_revision(format!(
                            "{}: {}",
                            rev,
                            e.message()
                        )))
                    }
                    Err(e) => return Err(storage(e, &rev)),
                };
                match object.peel_to_commit() {
                    Ok(commit) => Ok(Some(commit.id().to_string())),
                    Err(_) => Ok(None),
                }
            })
            .await?
            .flatten())
    }

    async fn branches(&self, uri: &str) -> Result<Vec<String>, DomainError> {
        Ok(self
            .with_repo(uri, |repo| {
                let mut names = Vec::new();
                for branch in repo
                    .branches(Some(BranchType::Local))
                    .map_err(|e| storage(e, "branches"))?
                {
                    let (branch, _) = branch.map_err(|e| storage(e, "branches"))?;
                    if let Ok(Some(name)) = branch.name() {
                        names.push(name.to_string());
                    }
                }
                Ok(names)
            })
            .await?
            .unwrap_or_default())
    }

    async fn tags(&self, uri: &str) -> Result<Vec<String>, DomainError> {
        Ok(self
            .with_repo(uri, |repo| {
                let names = repo.tag_names(None).map_err(|e| storage(e, "tags"))?;
                Ok(names.iter().flatten().map(str::to_string).collect())
            })
            .await?
            .unwrap_or_default())
    }

    async fn entry_kind(
        &self,
        uri: &str,
        commit: &str,
        path: &str,
    ) -> Result<Option<EntryKind>, DomainError> {
        let path = path.to_string();
        self.with_commit(uri, commit, move |_, commit| {
            if path.is_empty() {
                return Ok(Some(EntryKind::Directory));
            }
            let tree = commit.tree().map_err(|e| storage(e, "tree"))?;
            let entry = match tree.get_path(Path::new(&path)) {
                Ok(entry) => entry,
                Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
                Err(e) => return Err(storage(e, &path)),
            };
            Ok(match entry.kind() {
                Some(ObjectType::Tree) => Some(EntryKind::Directory),
                Some(ObjectType::Blob) => Some(EntryKind::File),
                _ => None,
            })
        })
        .await
    }

    async fn list_tree(
        &self,
        uri: &str,
        commit: &str,
        path: &str,
        recursive: bool,
    ) -> Result<Option<Vec<TreeEntry>>, DomainError> {
        let path = path.to_string();
        self.with_commit(uri, commit, move |repo, commit| {
            let Some(tree) = subtree(repo, commit, &path)? else {
                return Ok(None);
            };

            let mut entries = Vec::new();
            if recursive {
                tree.walk(TreeWalkMode::PreOrder, |dir, entry| {
                    if let Some(name) = entry.name() {
                        let full = join_path(&path, &format!("{}{}", dir, name));
                        match entry.kind() {
                            Some(ObjectType::Tree) => entries.push(TreeEntry::directory(full)),
                            Some(ObjectType::Blob) => entries.push(TreeEntry::file(full)),
                            _ => {}
                        }
                    }
                    TreeWalkResult::Ok
                })
                .map_err(|e| storage(e, &path))?;
            } else {
                for entry in tree.iter() {
                    let Some(name) = entry.name() else { continue };
                    let full = join_path(&path, name);
                    match entry.kind() {
                        Some(ObjectType::Tree) => entries.push(TreeEntry::directory(full)),
                        Some(ObjectType::Blob) => entries.push(TreeEntry::file(full)),
                        _ => {}
                    }
                }
            }
            Ok(Some(entries))
        })
        .await
    }

    async fn read_file(
        &self,
        uri: &str,
        commit: &str,
        path: &str,
    ) -> Result<Option<Vec<u8>>, DomainError> {
        let path = path.to_string();
        self.with_commit(uri, commit, move |repo, commit| {
            let tree = commit.tree().map_err(|e| storage(e, "tree"))?;
            let entry = match tree.get_path(Path::new(&path)) {
                Ok(entry) => entry,
                Err(e) if e.code() == ErrorCode::NotFound => return Ok(None),
                Err(e) => return Err(storage(e, &path)),
            };
            if entry.kind() != Some(ObjectType::Blob) {
                return Ok(None);
            }
            let blob = repo.find_blob(entry.id()).map_err(|e| storage(e, &path))?;
            Ok(Some(blob.content().to_vec()))
        })
        .await
    }

    async fn file_history(
        &self,
        uri: &str,
        commit: &str,
        path: &str,
    ) -> Result<Vec<CommitInfo>, DomainError> {
        let path = path.to_string();
        Ok(self
            .with_commit(uri, commit, move |repo, start| {
                let mut walk = repo.revwalk().map_err(|e| storage(e, "revwalk"))?;
                walk.push(start.id()).map_err(|e| storage(e, "revwalk"))?;
                walk.simplify_first_parent()
                    .map_err(|e| storage(e, "revwalk"))?;
                walk.set_sorting(Sort::TOPOLOGICAL)
                    .map_err(|e| storage(e, "revwalk"))?;

                let mut history = Vec::new();
                for oid in walk {
                    let oid = oid.map_err(|e| storage(e, "revwalk"))?;
                    let commit = repo.find_commit(oid).map_err(|e| storage(e, "commit"))?;
                    let before = commit.parent(0).ok().and_then(|p| entry_id(&p, &path));
                    if entry_id(&commit, &path) != before {
                        history.push(CommitInfo {
                            rev: oid.to_string(),
                            author: Some(signature(&commit.author())),
                            committer: Some(signature(&commit.committer())),
                            message: commit.message().unwrap_or_default().to_string(),
                        });
                    }
                }
                Ok(Some(history))
            })
            .await?
            .unwrap_or_default())
    }

    async fn blame(
        &self,
        uri: &str,
        commit: &str,
        path: &str,
        start: u32,
        end: u32,
    ) -> Result<Vec<BlameHunk>, DomainError> {
        let path = path.to_string();
        Ok(self
            .with_commit(uri, commit, move |repo, commit| {
                let mut opts = BlameOptions::new();
                opts.newest_commit(commit.id())
                    .first_parent(true)
                    .min_line(start as usize)
                    .max_line(end as usize);
                let blame = repo
                    .blame_file(Path::new(&path), Some(&mut opts))
                    .map_err(|e| storage(e, &path))?;

                let mut hunks = Vec::new();
                for hunk in blame.iter() {
                    let lines = hunk.lines_in_hunk() as u32;
                    if lines == 0 {
                        continue;
                    }
                    let first = hunk.final_start_line() as u32;
                    let origin = repo.find_commit(hunk.final_commit_id()).ok();
                    hunks.push(BlameHunk {
                        start_line: first,
                        end_line: first + lines - 1,
                        rev: hunk.final_commit_id().to_string(),
                        author: origin.as_ref().map(|c| signature(&c.author())),
                        message: origin
                            .as_ref()
                            .and_then(|c| c.message().map(str::to_string))
                            .unwrap_or_default(),
                    });
                }
                Ok(Some(hunks))
            })
            .await?
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_uri_rejects_traversal() {
        assert!(valid_uri("github.com/acme/widgets"));
        assert!(!valid_uri(""));
        assert!(!valid_uri("/etc/passwd"));
        assert!(!valid_uri("github.com/../secret"));
        assert!(!valid_uri("github.com//widgets"));
        assert!(!valid_uri("github.com/./widgets"));
    }

    #[test]
    fn test_clone_url_template() {
        let backend = GitVcsBackend::new("/tmp/repos", "https://{uri}.git");
        assert_eq!(
            backend.clone_url_for("github.com/acme/widgets"),
            "https://github.com/acme/widgets.git"
        );
    }

    #[tokio::test]
    async fn test_registered_repository_is_known_but_not_cloned() {
        let dir = tempfile::tempdir().unwrap();
        let backend = GitVcsBackend::new(dir.path(), "https://{uri}")
            .with_repositories(vec!["github.com/acme/widgets".to_string()]);

        let repo = backend.repository("github.com/acme/widgets").await.unwrap();
        assert_eq!(repo.map(|r| r.uri().to_string()).as_deref(), Some("github.com/acme/widgets"));
        assert_eq!(
            backend.clone_status("github.com/acme/widgets").await.unwrap(),
            CloneStatus::NotCloned
        );
        assert!(backend.repository("github.com/other/repo").await.unwrap().is_none());
    }
}
