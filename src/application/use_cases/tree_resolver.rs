use std::sync::Arc;

use quick_cache::sync::Cache;
use tracing::debug;

use crate::application::VcsBackend;
use crate::domain::{
    normalize_path, relative_path, Commit, Directory, DomainError, EntryKind, File, Tree,
    TreeListing,
};

const LISTING_CACHE_CAPACITY: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ListingKey {
    uri: String,
    commit: String,
    path: String,
    recursive: bool,
}

/// Builds `Tree`/`Directory`/`File` views for a commit.
///
/// A `Tree` is only a `(commit, path, recursive)` handle; listings are fetched
/// when a caller asks for `directories` or `files`, and each listing is kept
/// in a bounded cache keyed by that same triple.
pub struct TreeResolver {
    backend: Arc<dyn VcsBackend>,
    listings: Cache<ListingKey, Arc<TreeListing>>,
}

impl TreeResolver {
    pub fn new(backend: Arc<dyn VcsBackend>) -> Self {
        Self {
            backend,
            listings: Cache::new(LISTING_CACHE_CAPACITY),
        }
    }

    /// The tree at `path`, or `None` if `path` is absent, escapes the root
    /// or is not a directory.
    pub async fn tree(
        &self,
        commit: &Commit,
        path: &str,
        recursive: bool,
    ) -> Result<Option<Tree>, DomainError> {
        let Ok(path) = normalize_path(path) else {
            return Ok(None);
        };
        let kind = self
            .backend
            .entry_kind(commit.repository_uri(), commit.sha1(), &path)
            .await?;
        if kind != Some(EntryKind::Directory) {
            return Ok(None);
        }
        Ok(Some(Tree {
            commit: commit.clone(),
            path,
            recursive,
        }))
    }

    /// The file at `path`, or `None` if absent or a directory.
    pub async fn file(&self, commit: &Commit, path: &str) -> Result<Option<File>, DomainError> {
        // A path escaping the tree names nothing in the commit.
        let path = match normalize_path(path) {
            Ok(path) if !path.is_empty() => path,
            _ => return Ok(None),
        };
        let kind = self
            .backend
            .entry_kind(commit.repository_uri(), commit.sha1(), &path)
            .await?;
        Ok((kind == Some(EntryKind::File)).then(|| File::new(commit.clone(), path)))
    }

    pub async fn directories(&self, tree: &Tree) -> Result<Vec<Directory>, DomainError> {
        let listing = self.listing(tree).await?;
        Ok(listing
            .directories
            .iter()
            .map(|entry| Directory {
                commit: tree.commit.clone(),
                path: entry.path.clone(),
                name: display_name(tree, &entry.path),
            })
            .collect())
    }

    pub async fn files(&self, tree: &Tree) -> Result<Vec<File>, DomainError> {
        let listing = self.listing(tree).await?;
        Ok(listing
            .files
            .iter()
            .map(|entry| File {
                commit: tree.commit.clone(),
                path: entry.path.clone(),
                name: display_name(tree, &entry.path),
            })
            .collect())
    }

    pub async fn content(&self, file: &File) -> Result<String, DomainError> {
        let bytes = self
            .backend
            .read_file(file.commit.repository_uri(), file.commit.sha1(), &file.path)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!("{} at {}", file.path, file.commit.short()))
            })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn listing(&self, tree: &Tree) -> Result<Arc<TreeListing>, DomainError> {
        let key = ListingKey {
            uri: tree.commit.repository_uri().to_string(),
            commit: tree.commit.sha1().to_string(),
            path: tree.path.clone(),
            recursive: tree.recursive,
        };
        if let Some(cached) = self.listings.get(&key) {
            return Ok(cached);
        }

        let entries = self
            .backend
            .list_tree(&key.uri, &key.commit, &key.path, key.recursive)
            .await?
            .ok_or_else(|| {
                DomainError::not_found(format!(
                    "tree {:?} at {}",
                    tree.path,
                    tree.commit.short()
                ))
            })?;
        let listing = Arc::new(TreeListing::from_entries(entries));
        debug!(
            path = %tree.path,
            recursive = tree.recursive,
            "listed {} directories and {} files",
            listing.directories.len(),
            listing.files.len()
        );
        self.listings.insert(key, Arc::clone(&listing));
        Ok(listing)
    }
}

/// Base name for a shallow tree; path relative to the tree for a recursive
/// one, where base names alone would be ambiguous.
fn display_name(tree: &Tree, full: &str) -> String {
    if tree.recursive {
        relative_path(&tree.path, full).to_string()
    } else {
        crate::domain::base_name(full).to_string()
    }
}
