use std::sync::Arc;

use tracing::debug;

use crate::application::{TreeResolver, VcsBackend};
use crate::domain::{
    check_tiling, normalize_hunks, validate_line_range, CommitInfo, DomainError, File, Hunk,
    LineIndex,
};

/// Blame and per-file history.
pub struct HistoryResolver {
    backend: Arc<dyn VcsBackend>,
    trees: Arc<TreeResolver>,
}

impl HistoryResolver {
    pub fn new(backend: Arc<dyn VcsBackend>, trees: Arc<TreeResolver>) -> Self {
        Self { backend, trees }
    }

    /// Attribute lines `start_line..=end_line` (1-based, inclusive). The
    /// returned hunks tile the range exactly.
    pub async fn blame(
        &self,
        file: &File,
        start_line: i64,
        end_line: i64,
    ) -> Result<Vec<Hunk>, DomainError> {
        let content = self.trees.content(file).await?;
        let index = LineIndex::new(&content);
        let (start, end) = validate_line_range(start_line, end_line, index.line_count())?;

        let raw = self
            .backend
            .blame(
                file.commit.repository_uri(),
                file.commit.sha1(),
                &file.path,
                start,
                end,
            )
            .await?;
        let hunks = normalize_hunks(raw, start, end);
        check_tiling(&hunks, start, end)?;
        debug!(path = %file.path, start, end, "blame produced {} hunks", hunks.len());

        Ok(hunks
            .into_iter()
            .map(|h| {
                let (start_byte, end_byte) = index.byte_range(h.start_line, h.end_line);
                Hunk {
                    start_line: h.start_line,
                    end_line: h.end_line,
                    start_byte,
                    end_byte,
                    rev: h.rev,
                    author: h.author,
                    message: h.message,
                }
            })
            .collect())
    }

    /// Commits that touched the file's exact path, newest first.
    pub async fn commits(&self, file: &File) -> Result<Vec<CommitInfo>, DomainError> {
        self.backend
            .file_history(file.commit.repository_uri(), file.commit.sha1(), &file.path)
            .await
    }
}
