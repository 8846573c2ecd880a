use serde::{Deserialize, Serialize};

use super::Commit;
use crate::domain::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Directory,
    File,
}

/// An entry as reported by a storage backend. `path` is always relative to
/// the repository root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    pub kind: EntryKind,
}

impl TreeEntry {
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Directory,
        }
    }

    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
        }
    }

    pub fn name(&self) -> &str {
        base_name(&self.path)
    }
}

/// Directories and files of one tree, each ordered by path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TreeListing {
    pub directories: Vec<TreeEntry>,
    pub files: Vec<TreeEntry>,
}

impl TreeListing {
    /// Split raw entries by kind and sort each collection, so a listing of
    /// the same commit is identical no matter how the backend enumerated it.
    pub fn from_entries(entries: impl IntoIterator<Item = TreeEntry>) -> Self {
        let (mut directories, mut files): (Vec<_>, Vec<_>) = entries
            .into_iter()
            .partition(|e| e.kind == EntryKind::Directory);
        directories.sort_by(|a, b| a.path.cmp(&b.path));
        directories.dedup_by(|a, b| a.path == b.path);
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files.dedup_by(|a, b| a.path == b.path);
        Self { directories, files }
    }

    pub fn is_empty(&self) -> bool {
        self.directories.is_empty() && self.files.is_empty()
    }
}

/// Lazy handle to the tree at `path` within `commit`. Nothing is listed
/// until one of its collections is requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tree {
    pub commit: Commit,
    pub path: String,
    pub recursive: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Directory {
    pub commit: Commit,
    pub path: String,
    pub name: String,
}

impl Directory {
    /// The directory's own, non-expanded tree.
    pub fn tree(&self) -> Tree {
        Tree {
            commit: self.commit.clone(),
            path: self.path.clone(),
            recursive: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct File {
    pub commit: Commit,
    pub path: String,
    pub name: String,
}

impl File {
    pub fn new(commit: Commit, path: impl Into<String>) -> Self {
        let path = path.into();
        let name = base_name(&path).to_string();
        Self { commit, path, name }
    }
}

/// Normalize a caller-supplied path: strip leading/trailing and duplicate
/// separators. `""` is the root. Parent references are rejected.
pub fn normalize_path(path: &str) -> Result<String, DomainError> {
    let mut parts = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => continue,
            ".." => {
                return Err(DomainError::invalid_input(format!(
                    "path may not contain '..': {}",
                    path
                )))
            }
            p => parts.push(p),
        }
    }
    Ok(parts.join("/"))
}

pub fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", base, name)
    }
}

pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// `full` relative to `base`; `full` must lie under `base`.
pub fn relative_path<'a>(base: &str, full: &'a str) -> &'a str {
    if base.is_empty() {
        full
    } else {
        full.strip_prefix(base)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("").unwrap(), "");
        assert_eq!(normalize_path("/").unwrap(), "");
        assert_eq!(normalize_path("/src//lib/").unwrap(), "src/lib");
        assert_eq!(normalize_path("./src").unwrap(), "src");
        assert!(normalize_path("src/../etc").is_err());
    }

    #[test]
    fn test_listing_is_sorted_and_split() {
        let listing = TreeListing::from_entries(vec![
            TreeEntry::file("b.rs"),
            TreeEntry::directory("src"),
            TreeEntry::file("a.rs"),
            TreeEntry::directory("docs"),
        ]);
        let dirs: Vec<_> = listing.directories.iter().map(|e| e.path.as_str()).collect();
        let files: Vec<_> = listing.files.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(dirs, vec!["docs", "src"]);
        assert_eq!(files, vec!["a.rs", "b.rs"]);
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path("", "src/main.rs"), "src/main.rs");
        assert_eq!(relative_path("src", "src/a/main.rs"), "a/main.rs");
        assert_eq!(join_path("", "src"), "src");
        assert_eq!(join_path("src", "lib.rs"), "src/lib.rs");
    }

    #[test]
    fn test_file_name_is_base_name() {
        let file = File::new(Commit::new("r", "c"), "src/lib.rs");
        assert_eq!(file.name, "lib.rs");
    }
}
