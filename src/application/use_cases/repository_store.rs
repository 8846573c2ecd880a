use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use quick_cache::sync::Cache;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::application::{CloneStatus, VcsBackend};
use crate::domain::{
    detect_languages, is_full_hash, validate_revision, Commit, CommitState, DomainError, EntryKind,
    Repository,
};

const LANGUAGE_CACHE_CAPACITY: usize = 1024;
const ATTEMPT_CACHE_CAPACITY: usize = 4096;

/// Why a repository is being fetched: `None` for an initial clone, `Some`
/// for a commit hash missing from the local copy.
type FetchTarget = Option<String>;

/// The running fetch of one repository and every target waiting on it.
struct InFlight {
    done: watch::Receiver<bool>,
    targets: HashSet<FetchTarget>,
}

struct CachedRevision {
    sha: String,
    resolved_at: Instant,
}

/// Sole boundary between the resolvers and versioned storage.
///
/// Owns the revision cache and coalesces background fetches: at most one
/// fetch per repository runs at a time, and every caller that needs it (a
/// missing clone or any missing hash) joins that fetch and observes
/// `cloneInProgress` until it finishes. Finished targets are remembered for
/// the revision TTL in a bounded cache, so neither a failed clone nor an
/// unknown hash is retried on every query.
pub struct RepositoryStore {
    backend: Arc<dyn VcsBackend>,
    revisions: Arc<Mutex<HashMap<(String, String), CachedRevision>>>,
    fetches: Arc<Mutex<HashMap<String, InFlight>>>,
    attempts: Arc<Cache<(String, FetchTarget), Instant>>,
    languages: Cache<(String, String), Arc<Vec<String>>>,
    revision_ttl: Duration,
}

impl RepositoryStore {
    pub fn new(backend: Arc<dyn VcsBackend>, revision_ttl: Duration) -> Self {
        Self {
            backend,
            revisions: Arc::new(Mutex::new(HashMap::new())),
            fetches: Arc::new(Mutex::new(HashMap::new())),
            attempts: Arc::new(Cache::new(ATTEMPT_CACHE_CAPACITY)),
            languages: Cache::new(LANGUAGE_CACHE_CAPACITY),
            revision_ttl,
        }
    }

    pub fn backend(&self) -> &Arc<dyn VcsBackend> {
        &self.backend
    }

    /// Look up a repository without triggering a fetch.
    pub async fn repository(&self, uri: &str) -> Result<Option<Repository>, DomainError> {
        self.backend.repository(uri).await
    }

    pub async fn list_repositories(&self) -> Result<Vec<Repository>, DomainError> {
        self.backend.list_repositories().await
    }

    /// Resolve `rev` (branch, tag or hash) in `repo`.
    pub async fn commit_state(
        &self,
        repo: &Repository,
        rev: &str,
    ) -> Result<CommitState, DomainError> {
        validate_revision(rev)?;
        self.resolve_state(repo.uri(), rev).await
    }

    /// Resolve the tip of the default branch.
    pub async fn latest(&self, repo: &Repository) -> Result<CommitState, DomainError> {
        let rev = if repo.default_branch().is_empty() {
            "HEAD"
        } else {
            repo.default_branch()
        };
        self.resolve_state(repo.uri(), rev).await
    }

    async fn resolve_state(&self, uri: &str, rev: &str) -> Result<CommitState, DomainError> {
        if self.backend.clone_status(uri).await? == CloneStatus::NotCloned {
            if self.request_fetch(uri, None).await {
                return Ok(CommitState::cloning());
            }
            debug!(uri, "clone failed recently; not retrying yet");
            return Ok(CommitState::missing());
        }

        // A clone that is still being written may already open as a
        // repository; nothing in it is resolvable yet.
        if self.clone_in_flight(uri).await {
            return Ok(CommitState::cloning());
        }

        if let Some(sha) = self.resolve_cached(uri, rev).await? {
            return Ok(CommitState::resolved(Commit::new(uri, sha)));
        }

        // A full hash we do not have yet may simply be newer than our copy.
        if is_full_hash(rev) && self.request_fetch(uri, Some(rev)).await {
            return Ok(CommitState::cloning());
        }

        debug!(uri, rev, "revision not found");
        Ok(CommitState::missing())
    }

    /// Resolve an exact hash without fetching. Used for node lookups, which
    /// must not have side effects.
    pub async fn commit_by_hash(&self, uri: &str, sha: &str) -> Result<Option<Commit>, DomainError> {
        if validate_revision(sha).is_err() {
            return Ok(None);
        }
        if self.backend.clone_status(uri).await? == CloneStatus::NotCloned {
            return Ok(None);
        }
        let resolved = self.backend.resolve_revision(uri, sha).await?;
        Ok(resolved
            .filter(|found| found.eq_ignore_ascii_case(sha))
            .map(|found| Commit::new(uri, found)))
    }

    async fn resolve_cached(&self, uri: &str, rev: &str) -> Result<Option<String>, DomainError> {
        let key = (uri.to_string(), rev.to_string());
        {
            let revisions = self.revisions.lock().await;
            if let Some(cached) = revisions.get(&key) {
                if cached.resolved_at.elapsed() < self.revision_ttl {
                    return Ok(Some(cached.sha.clone()));
                }
            }
        }

        let resolved = self.backend.resolve_revision(uri, rev).await?;
        if let Some(sha) = &resolved {
            let mut revisions = self.revisions.lock().await;
            revisions.insert(
                key,
                CachedRevision {
                    sha: sha.clone(),
                    resolved_at: Instant::now(),
                },
            );
        }
        Ok(resolved)
    }

    async fn clone_in_flight(&self, uri: &str) -> bool {
        let fetches = self.fetches.lock().await;
        fetches
            .get(uri)
            .map(|running| running.targets.contains(&None))
            .unwrap_or(false)
    }

    /// Make sure a fetch of `uri` covers `target`: join the running fetch of
    /// the repository, or start one. Returns `false` without fetching when
    /// `target` was already tried within the revision TTL.
    async fn request_fetch(&self, uri: &str, target: Option<&str>) -> bool {
        let target: FetchTarget = target.map(str::to_string);

        let mut fetches = self.fetches.lock().await;
        if let Some(running) = fetches.get_mut(uri) {
            running.targets.insert(target);
            return true;
        }
        if let Some(at) = self.attempts.get(&(uri.to_string(), target.clone())) {
            if at.elapsed() < self.revision_ttl {
                return false;
            }
        }

        let (done_tx, done_rx) = watch::channel(false);
        fetches.insert(
            uri.to_string(),
            InFlight {
                done: done_rx,
                targets: HashSet::from([target.clone()]),
            },
        );
        drop(fetches);

        let uri = uri.to_string();
        let backend = Arc::clone(&self.backend);
        let fetches = Arc::clone(&self.fetches);
        let attempts = Arc::clone(&self.attempts);
        let revisions = Arc::clone(&self.revisions);

        info!(uri = %uri, rev = ?target, "starting background fetch");
        tokio::spawn(async move {
            match backend.fetch(&uri).await {
                Ok(()) => info!(uri = %uri, "background fetch finished"),
                Err(e) => warn!(uri = %uri, "background fetch failed: {}", e),
            }

            revisions.lock().await.retain(|(u, _), _| u != &uri);
            let finished = fetches.lock().await.remove(&uri);
            if let Some(finished) = finished {
                let now = Instant::now();
                for target in finished.targets {
                    attempts.insert((uri.clone(), target), now);
                }
            }
            let _ = done_tx.send(true);
        });

        true
    }

    /// Wait until the running fetch of `uri`, if any, has finished.
    pub async fn wait_for_fetch(&self, uri: &str) {
        let pending = {
            let fetches = self.fetches.lock().await;
            fetches.get(uri).map(|running| running.done.clone())
        };
        if let Some(mut done) = pending {
            let _ = done.wait_for(|done| *done).await;
        }
    }

    pub async fn branches(&self, repo: &Repository) -> Result<Vec<String>, DomainError> {
        if self.backend.clone_status(repo.uri()).await? == CloneStatus::NotCloned {
            return Ok(Vec::new());
        }
        let mut branches = self.backend.branches(repo.uri()).await?;
        branches.sort();
        Ok(branches)
    }

    pub async fn tags(&self, repo: &Repository) -> Result<Vec<String>, DomainError> {
        if self.backend.clone_status(repo.uri()).await? == CloneStatus::NotCloned {
            return Ok(Vec::new());
        }
        let mut tags = self.backend.tags(repo.uri()).await?;
        tags.sort();
        Ok(tags)
    }

    /// Languages of every file in the commit's tree. Commit-pure, so cached
    /// without invalidation.
    pub async fn languages(&self, commit: &Commit) -> Result<Arc<Vec<String>>, DomainError> {
        let key = (commit.repository_uri().to_string(), commit.sha1().to_string());
        if let Some(cached) = self.languages.get(&key) {
            return Ok(cached);
        }

        let entries = self
            .backend
            .list_tree(commit.repository_uri(), commit.sha1(), "", true)
            .await?
            .unwrap_or_default();
        let languages = Arc::new(detect_languages(
            entries
                .iter()
                .filter(|e| e.kind == EntryKind::File)
                .map(|e| e.path.as_str()),
        ));
        debug!(
            uri = commit.repository_uri(),
            commit = commit.short(),
            "detected {} languages",
            languages.len()
        );
        self.languages.insert(key, Arc::clone(&languages));
        Ok(languages)
    }
}
