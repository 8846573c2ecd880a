use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::watch;
use tracing::debug;

use crate::application::{CloneStatus, VcsBackend};
use crate::domain::{
    join_path, BlameHunk, CommitInfo, DomainError, EntryKind, Repository, Signature, TreeEntry,
};

/// A commit to be recorded on a branch of an in-memory repository.
#[derive(Debug, Clone)]
pub struct CommitSpec {
    branch: String,
    message: String,
    author_name: String,
    author_email: String,
    time: i64,
    changes: Vec<(String, Option<String>)>,
}

impl CommitSpec {
    pub fn new(branch: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            message: message.into(),
            author_name: "Test Author".to_string(),
            author_email: "author@example.com".to_string(),
            time: 0,
            changes: Vec::new(),
        }
    }

    pub fn author(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.author_name = name.into();
        self.author_email = email.into();
        self
    }

    /// Commit time in seconds since the Unix epoch.
    pub fn at(mut self, time: i64) -> Self {
        self.time = time;
        self
    }

    pub fn write(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.changes.push((path.into(), Some(content.into())));
        self
    }

    pub fn delete(mut self, path: impl Into<String>) -> Self {
        self.changes.push((path.into(), None));
        self
    }
}

#[derive(Debug, Clone)]
struct MemCommit {
    parents: Vec<String>,
    files: BTreeMap<String, String>,
    author: Signature,
    message: String,
}

#[derive(Debug, Clone, Default)]
struct RepoState {
    commits: HashMap<String, MemCommit>,
    branches: BTreeMap<String, String>,
    tags: BTreeMap<String, String>,
}

#[derive(Debug)]
struct MemRepo {
    repository: Repository,
    remote: RepoState,
    /// `None` until the repository has been cloned.
    local: Option<RepoState>,
    /// Whether new commits land in the local copy immediately.
    mirrored: bool,
}

/// Versioned storage held entirely in memory.
///
/// Every repository has a "remote" state that commits are recorded on, and
/// an optional local copy that reads are served from. `fetch` copies the
/// remote over the local state, and can be held back with `pause_fetches`
/// to observe in-flight clones.
pub struct InMemoryVcsBackend {
    repos: RwLock<BTreeMap<String, MemRepo>>,
    paused: watch::Sender<bool>,
    failing: AtomicBool,
    fetch_count: AtomicUsize,
    sequence: AtomicUsize,
}

impl InMemoryVcsBackend {
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            repos: RwLock::new(BTreeMap::new()),
            paused,
            failing: AtomicBool::new(false),
            fetch_count: AtomicUsize::new(0),
            sequence: AtomicUsize::new(0),
        }
    }

    /// Register a cloned repository whose local copy follows every commit.
    pub fn add_repository(&self, repository: Repository) {
        self.insert(repository, Some(RepoState::default()), true);
    }

    /// Register a repository that exists remotely but has not been cloned.
    pub fn add_uncloned_repository(&self, repository: Repository) {
        self.insert(repository, None, false);
    }

    fn insert(&self, repository: Repository, local: Option<RepoState>, mirrored: bool) {
        let uri = repository.uri().to_string();
        self.write_repos().insert(
            uri,
            MemRepo {
                repository,
                remote: RepoState::default(),
                local,
                mirrored,
            },
        );
    }

    /// Stop mirroring commits into the local copy, so later commits are only
    /// visible after a fetch.
    pub fn detach(&self, uri: &str) {
        if let Some(repo) = self.write_repos().get_mut(uri) {
            repo.mirrored = false;
        }
    }

    /// Record a commit on the tip of `spec.branch` and return its hash.
    pub fn commit(&self, uri: &str, spec: CommitSpec) -> Result<String, DomainError> {
        let mut repos = self.write_repos();
        let repo = repos
            .get_mut(uri)
            .ok_or_else(|| DomainError::not_found(format!("repository {}", uri)))?;

        let parent = repo.remote.branches.get(&spec.branch).cloned();
        let mut files = parent
            .as_ref()
            .and_then(|p| repo.remote.commits.get(p))
            .map(|c| c.files.clone())
            .unwrap_or_default();
        for (path, content) in &spec.changes {
            match content {
                Some(content) => files.insert(path.clone(), content.clone()),
                None => files.remove(path),
            };
        }

        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let sha = synthetic_hash(seq, parent.as_deref(), &spec, &files);
        let commit = MemCommit {
            parents: parent.into_iter().collect(),
            files,
            author: Signature::at_epoch(&spec.author_name, &spec.author_email, spec.time),
            message: spec.message.clone(),
        };
        repo.remote.commits.insert(sha.clone(), commit);
        repo.remote.branches.insert(spec.branch.clone(), sha.clone());

        if repo.mirrored && repo.local.is_some() {
            repo.local = Some(repo.remote.clone());
        }
        debug!(uri, branch = %spec.branch, sha = %sha, "recorded commit");
        Ok(sha)
    }

    pub fn tag(&self, uri: &str, name: &str, sha: &str) -> Result<(), DomainError> {
        let mut repos = self.write_repos();
        let repo = repos
            .get_mut(uri)
            .ok_or_else(|| DomainError::not_found(format!("repository {}", uri)))?;
        repo.remote.tags.insert(name.to_string(), sha.to_string());
        if repo.mirrored && repo.local.is_some() {
            repo.local = Some(repo.remote.clone());
        }
        Ok(())
    }

    /// Hold every fetch until `resume_fetches` is called.
    pub fn pause_fetches(&self) {
        self.paused.send_replace(true);
    }

    pub fn resume_fetches(&self) {
        self.paused.send_replace(false);
    }

    /// Make every later fetch fail with `UpstreamUnavailable`.
    pub fn fail_fetches(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of fetches started so far.
    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    fn read_repos(&self) -> RwLockReadGuard<'_, BTreeMap<String, MemRepo>> {
        self.repos.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_repos(&self) -> RwLockWriteGuard<'_, BTreeMap<String, MemRepo>> {
        self.repos.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` against the local copy of `uri`, if it has been cloned.
    fn with_local<T>(&self, uri: &str, f: impl FnOnce(&RepoState) -> T) -> Option<T> {
        let repos = self.read_repos();
        repos.get(uri).and_then(|r| r.local.as_ref()).map(f)
    }

    fn with_commit<T>(
        &self,
        uri: &str,
        commit: &str,
        f: impl FnOnce(&RepoState, &MemCommit) -> T,
    ) -> Option<T> {
        self.with_local(uri, |state| state.commits.get(commit).map(|c| f(state, c)))
            .flatten()
    }
}

impl Default for InMemoryVcsBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn synthetic_hash(
    seq: usize,
    parent: Option<&str>,
    spec: &CommitSpec,
    files: &BTreeMap<String, String>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seq.to_le_bytes());
    hasher.update(parent.unwrap_or_default().as_bytes());
    hasher.update(spec.message.as_bytes());
    hasher.update(spec.time.to_le_bytes());
    for (path, content) in files {
        hasher.update(path.as_bytes());
        hasher.update([0]);
        hasher.update(content.as_bytes());
        hasher.update([0]);
    }
    let hex = format!("{:x}", hasher.finalize());
    hex[..40].to_string()
}

fn is_directory(files: &BTreeMap<String, String>, path: &str) -> bool {
    if path.is_empty() {
        return true;
    }
    let prefix = format!("{}/", path);
    files
        .range(prefix.clone()..)
        .next()
        .map(|(p, _)| p.starts_with(&prefix))
        .unwrap_or(false)
}

fn list_entries(files: &BTreeMap<String, String>, path: &str, recursive: bool) -> Vec<TreeEntry> {
    let prefix = if path.is_empty() {
        String::new()
    } else {
        format!("{}/", path)
    };

    let mut directories = BTreeSet::new();
    let mut entries = Vec::new();
    for file in files.keys().filter(|f| f.starts_with(&prefix)) {
        let rest = &file[prefix.len()..];
        let segments: Vec<&str> = rest.split('/').collect();
        if recursive {
            let mut current = path.to_string();
            for segment in &segments[..segments.len() - 1] {
                current = join_path(&current, segment);
                directories.insert(current.clone());
            }
            entries.push(TreeEntry::file(file.clone()));
        } else if segments.len() > 1 {
            directories.insert(join_path(path, segments[0]));
        } else {
            entries.push(TreeEntry::file(file.clone()));
        }
    }
    entries.extend(directories.into_iter().map(TreeEntry::directory));
    entries
}

fn lines_of(content: Option<&String>) -> Vec<&str> {
    content.map(|c| c.lines().collect()).unwrap_or_default()
}

/// Pairs `(i, j)` of equal lines forming a longest common subsequence.
fn lcs_matches(a: &[&str], b: &[&str]) -> Vec<(usize, usize)> {
    let (n, m) = (a.len(), b.len());
    let mut table = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i][j] = if a[i] == b[j] {
                table[i + 1][j + 1] + 1
            } else {
                table[i + 1][j].max(table[i][j + 1])
            };
        }
    }

    let mut matches = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            matches.push((i, j));
            i += 1;
            j += 1;
        } else if table[i + 1][j] >= table[i][j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    matches
}

/// First-parent line attribution: each line of `path` at `start` is owned by
/// the newest commit along the first-parent chain that introduced it.
fn attribute_lines(state: &RepoState, start: &str, path: &str) -> Vec<String> {
    let Some(head) = state.commits.get(start) else {
        return Vec::new();
    };
    let head_lines = lines_of(head.files.get(path));
    let mut owners: Vec<Option<String>> = vec![None; head_lines.len()];

    // (line in the current commit's version, line index at `start`)
    let mut tracked: Vec<(usize, usize)> = (0..head_lines.len()).map(|i| (i, i)).collect();
    let mut current_sha = start.to_string();
    let mut current_lines = head_lines;

    while !tracked.is_empty() {
        let Some(current) = state.commits.get(&current_sha) else {
            break;
        };
        let parent = current
            .parents
            .first()
            .and_then(|p| state.commits.get(p).map(|c| (p.clone(), c)));

        let Some((parent_sha, parent_commit)) = parent else {
            for (_, origin) in &tracked {
                owners[*origin] = Some(current_sha.clone());
            }
            break;
        };

        let parent_lines = lines_of(parent_commit.files.get(path));
        let matches: HashMap<usize, usize> =
            lcs_matches(&current_lines, &parent_lines).into_iter().collect();

        let mut carried = Vec::new();
        for (line, origin) in tracked {
            match matches.get(&line) {
                Some(parent_line) => carried.push((*parent_line, origin)),
                None => owners[origin] = Some(current_sha.clone()),
            }
        }

        tracked = carried;
        current_sha = parent_sha;
        current_lines = parent_lines;
    }

    owners
        .into_iter()
        .map(|o| o.unwrap_or_else(|| start.to_string()))
        .collect()
}

#[async_trait]
impl VcsBackend for InMemoryVcsBackend {
    async fn repository(&self, uri: &str) -> Result<Option<Repository>, DomainError> {
        Ok(self.read_repos().get(uri).map(|r| r.repository.clone()))
    }

    async fn list_repositories(&self) -> Result<Vec<Repository>, DomainError> {
        Ok(self
            .read_repos()
            .values()
            .map(|r| r.repository.clone())
            .collect())
    }

    async fn clone_status(&self, uri: &str) -> Result<CloneStatus, DomainError> {
        let cloned = self
            .read_repos()
            .get(uri)
            .map(|r| r.local.is_some())
            .unwrap_or(false);
        Ok(if cloned {
            CloneStatus::Cloned
        } else {
            CloneStatus::NotCloned
        })
    }

    async fn fetch(&self, uri: &str) -> Result<(), DomainError> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        let mut paused = self.paused.subscribe();
        let _ = paused.wait_for(|p| !*p).await;
        if self.failing.load(Ordering::SeqCst) {
            return Err(DomainError::upstream(format!("fetch of {} refused", uri)));
        }

        let mut repos = self.write_repos();
        let repo = repos
            .get_mut(uri)
            .ok_or_else(|| DomainError::not_found(format!("repository {}", uri)))?;
        repo.local = Some(repo.remote.clone());
        debug!(uri, "fetched {} commits", repo.remote.commits.len());
        Ok(())
    }

    async fn resolve_revision(&self, uri: &str, rev: &str) -> Result<Option<String>, DomainError> {
        let default_branch = self
            .read_repos()
            .get(uri)
            .map(|r| r.repository.default_branch().to_string())
            .unwrap_or_default();

        Ok(self
            .with_local(uri, |state| {
                if state.commits.contains_key(rev) {
                    return Some(rev.to_string());
                }
                let branch = rev.strip_prefix("refs/heads/").unwrap_or(rev);
                if let Some(sha) = state.branches.get(branch) {
                    return Some(sha.clone());
                }
                let tag = rev.strip_prefix("refs/tags/").unwrap_or(rev);
                if let Some(sha) = state.tags.get(tag) {
                    return Some(sha.clone());
                }
                if rev == "HEAD" {
                    return state.branches.get(&default_branch).cloned();
                }
                if rev.len() >= 4 && rev.chars().all(|c| c.is_ascii_hexdigit()) {
                    let mut candidates = state.commits.keys().filter(|k| k.starts_with(rev));
                    if let (Some(only), None) = (candidates.next(), candidates.next()) {
                        return Some(only.clone());
                    }
                }
                None
            })
            .flatten())
    }

    async fn branches(&self, uri: &str) -> Result<Vec<String>, DomainError> {
        Ok(self
            .with_local(uri, |s| s.branches.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn tags(&self, uri: &str) -> Result<Vec<String>, DomainError> {
        Ok(self
            .with_local(uri, |s| s.tags.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn entry_kind(
        &self,
        uri: &str,
        commit: &str,
        path: &str,
    ) -> Result<Option<EntryKind>, DomainError> {
        Ok(self
            .with_commit(uri, commit, |_, c| {
                if c.files.contains_key(path) {
                    Some(EntryKind::File)
                } else if is_directory(&c.files, path) {
                    Some(EntryKind::Directory)
                } else {
                    None
                }
            })
            .flatten())
    }

    async fn list_tree(
        &self,
        uri: &str,
        commit: &str,
        path: &str,
        recursive: bool,
    ) -> Result<Option<Vec<TreeEntry>>, DomainError> {
        Ok(self
            .with_commit(uri, commit, |_, c| {
                is_directory(&c.files, path).then(|| list_entries(&c.files, path, recursive))
            })
            .flatten())
    }

    async fn read_file(
        &self,
        uri: &str,
        commit: &str,
        path: &str,
    ) -> Result<Option<Vec<u8>>, DomainError> {
        Ok(self
            .with_commit(uri, commit, |_, c| {
                c.files.get(path).map(|content| content.as_bytes().to_vec())
            })
            .flatten())
    }

    async fn file_history(
        &self,
        uri: &str,
        commit: &str,
        path: &str,
    ) -> Result<Vec<CommitInfo>, DomainError> {
        Ok(self
            .with_local(uri, |state| {
                let mut history = Vec::new();
                let mut next = Some(commit.to_string());
                while let Some(sha) = next {
                    let Some(current) = state.commits.get(&sha) else {
                        break;
                    };
                    let parent = current.parents.first();
                    let before = parent
                        .and_then(|p| state.commits.get(p))
                        .and_then(|p| p.files.get(path));
                    if current.files.get(path) != before {
                        history.push(CommitInfo {
                            rev: sha.clone(),
                            author: Some(current.author.clone()),
                            committer: Some(current.author.clone()),
                            message: current.message.clone(),
                        });
                    }
                    next = parent.cloned();
                }
                history
            })
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
        Ok(self
            .with_local(uri, |state| {
                let owners = attribute_lines(state, commit, path);
                let mut hunks: Vec<BlameHunk> = Vec::new();
                for line in start..=end.min(owners.len() as u32) {
                    let rev = &owners[(line - 1) as usize];
                    match hunks.last_mut() {
                        Some(last) if &last.rev == rev => last.end_line = line,
                        _ => {
                            let origin = state.commits.get(rev);
                            hunks.push(BlameHunk {
                                start_line: line,
                                end_line: line,
                                rev: rev.clone(),
                                author: origin.map(|c| c.author.clone()),
                                message: origin.map(|c| c.message.clone()).unwrap_or_default(),
                            });
                        }
                    }
                }
                hunks
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URI: &str = "github.com/acme/widgets";

    fn backend() -> InMemoryVcsBackend {
        let backend = InMemoryVcsBackend::new();
        backend.add_repository(Repository::new(URI).with_default_branch("main"));
        backend
    }

    #[tokio::test]
    async fn test_tree_listing_derives_directories() {
        let backend = backend();
        let sha = backend
            .commit(
                URI,
                CommitSpec::new("main", "init")
                    .write("README.md", "hi\n")
                    .write("src/lib.rs", "fn a() {}\n")
                    .write("src/util/mod.rs", "\n"),
            )
            .unwrap();

        let shallow = backend.list_tree(URI, &sha, "", false).await.unwrap().unwrap();
        assert!(shallow.contains(&TreeEntry::directory("src")));
        assert!(shallow.contains(&TreeEntry::file("README.md")));
        assert_eq!(shallow.len(), 2);

        let deep = backend.list_tree(URI, &sha, "src", true).await.unwrap().unwrap();
        assert!(deep.contains(&TreeEntry::directory("src/util")));
        assert!(deep.contains(&TreeEntry::file("src/util/mod.rs")));

        assert_eq!(
            backend.entry_kind(URI, &sha, "src").await.unwrap(),
            Some(EntryKind::Directory)
        );
        assert_eq!(backend.entry_kind(URI, &sha, "sr").await.unwrap(), None);
        assert!(backend.list_tree(URI, &sha, "README.md", false).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resolve_revision_forms() {
        let backend = backend();
        let sha = backend
            .commit(URI, CommitSpec::new("main", "init").write("a", "1\n"))
            .unwrap();
        backend.tag(URI, "v1", &sha).unwrap();

        for rev in ["main", "refs/heads/main", "v1", "HEAD", sha.as_str(), &sha[..8]] {
            assert_eq!(
                backend.resolve_revision(URI, rev).await.unwrap().as_deref(),
                Some(sha.as_str()),
                "rev {}",
                rev
            );
        }
        assert_eq!(backend.resolve_revision(URI, "nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_blame_follows_first_parent() {
        let backend = backend();
        let first = backend
            .commit(URI, CommitSpec::new("main", "one").write("f", "a\nb\nc\n"))
            .unwrap();
        let second = backend
            .commit(URI, CommitSpec::new("main", "two").write("f", "a\nB\nc\nd\n"))
            .unwrap();

        let hunks = backend.blame(URI, &second, "f", 1, 4).await.unwrap();
        let revs: Vec<(u32, u32, &str)> = hunks
            .iter()
            .map(|h| (h.start_line, h.end_line, h.rev.as_str()))
            .collect();
        assert_eq!(
            revs,
            vec![
                (1, 1, first.as_str()),
                (2, 2, second.as_str()),
                (3, 3, first.as_str()),
                (4, 4, second.as_str()),
            ]
        );
    }

    #[tokio::test]
    async fn test_history_lists_touching_commits() {
        let backend = backend();
        let a = backend
            .commit(URI, CommitSpec::new("main", "add f").write("f", "1\n"))
            .unwrap();
        backend
            .commit(URI, CommitSpec::new("main", "add g").write("g", "1\n"))
            .unwrap();
        let c = backend
            .commit(URI, CommitSpec::new("main", "edit f").write("f", "2\n"))
            .unwrap();

        let history = backend.file_history(URI, &c, "f").await.unwrap();
        let revs: Vec<&str> = history.iter().map(|h| h.rev.as_str()).collect();
        assert_eq!(revs, vec![c.as_str(), a.as_str()]);
    }

    #[tokio::test]
    async fn test_detached_commits_need_fetch() {
        let backend = backend();
        backend
            .commit(URI, CommitSpec::new("main", "one").write("f", "1\n"))
            .unwrap();
        backend.detach(URI);
        let newer = backend
            .commit(URI, CommitSpec::new("main", "two").write("f", "2\n"))
            .unwrap();

        assert_eq!(backend.resolve_revision(URI, &newer).await.unwrap(), None);
        backend.fetch(URI).await.unwrap();
        assert_eq!(
            backend.resolve_revision(URI, &newer).await.unwrap(),
            Some(newer.clone())
        );
        assert_eq!(backend.fetch_count(), 1);
    }
}
