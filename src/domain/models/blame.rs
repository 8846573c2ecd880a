use serde::{Deserialize, Serialize};

use super::Signature;
use crate::domain::DomainError;

/// Line attribution as produced by a storage backend (1-based, inclusive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlameHunk {
    pub start_line: u32,
    pub end_line: u32,
    pub rev: String,
    pub author: Option<Signature>,
    pub message: String,
}

/// A blame hunk with byte offsets into the file content.
/// `start_byte` is inclusive, `end_byte` exclusive and includes the
/// terminator of `end_line`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub start_line: u32,
    pub end_line: u32,
    pub start_byte: u32,
    pub end_byte: u32,
    pub rev: String,
    pub author: Option<Signature>,
    pub message: String,
}

/// Byte offsets of line starts within a file.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(content: &str) -> Self {
        let mut starts = Vec::new();
        if !content.is_empty() {
            starts.push(0);
        }
        for (i, b) in content.bytes().enumerate() {
            if b == b'\n' && i + 1 < content.len() {
                starts.push(i + 1);
            }
        }
        Self {
            starts,
            len: content.len(),
        }
    }

    pub fn line_count(&self) -> u32 {
        self.starts.len() as u32
    }

    /// Byte range spanning lines `start..=end` (1-based). The caller
    /// validates the bounds first.
    pub fn byte_range(&self, start: u32, end: u32) -> (u32, u32) {
        let from = self.starts[(start - 1) as usize];
        let to = self
            .starts
            .get(end as usize)
            .copied()
            .unwrap_or(self.len);
        (from as u32, to as u32)
    }
}

pub fn validate_line_range(start: i64, end: i64, line_count: u32) -> Result<(u32, u32), DomainError> {
    if start < 1 || end < 1 {
        return Err(DomainError::range(format!(
            "line numbers are 1-based (got startLine={}, endLine={})",
            start, end
        )));
    }
    if start > end {
        return Err(DomainError::range(format!(
            "startLine {} is after endLine {}",
            start, end
        )));
    }
    if end > line_count as i64 {
        return Err(DomainError::range(format!(
            "endLine {} is beyond the file's {} lines",
            end, line_count
        )));
    }
    Ok((start as u32, end as u32))
}

/// Clip backend hunks to `[start, end]` and merge contiguous runs
/// attributed to the same revision.
pub fn normalize_hunks(mut hunks: Vec<BlameHunk>, start: u32, end: u32) -> Vec<BlameHunk> {
    hunks.sort_by_key(|h| h.start_line);
    let mut out: Vec<BlameHunk> = Vec::with_capacity(hunks.len());
    for mut hunk in hunks {
        if hunk.end_line < start || hunk.start_line > end {
            continue;
        }
        hunk.start_line = hunk.start_line.max(start);
        hunk.end_line = hunk.end_line.min(end);
        match out.last_mut() {
            Some(prev) if prev.rev == hunk.rev && prev.end_line + 1 == hunk.start_line => {
                prev.end_line = hunk.end_line;
            }
            _ => out.push(hunk),
        }
    }
    out
}

/// Hunks must cover `[start, end]` exactly, in order, without overlap.
pub fn check_tiling(hunks: &[BlameHunk], start: u32, end: u32) -> Result<(), DomainError> {
    let mut next = start;
    for hunk in hunks {
        if hunk.start_line != next || hunk.end_line < hunk.start_line {
            return Err(DomainError::internal(format!(
                "blame hunks do not tile lines {}-{}: gap or overlap at line {}",
                start, end, next
            )));
        }
        next = hunk.end_line + 1;
    }
    if next != end + 1 {
        return Err(DomainError::internal(format!(
            "blame hunks do not tile lines {}-{}: stopped at line {}",
            start,
            end,
            next.saturating_sub(1)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hunk(start: u32, end: u32, rev: &str) -> BlameHunk {
        BlameHunk {
            start_line: start,
            end_line: end,
            rev: rev.to_string(),
            author: None,
            message: String::new(),
        }
    }

    #[test]
    fn test_line_index_offsets() {
        let idx = LineIndex::new("ab\ncd\nef\n");
        assert_eq!(idx.line_count(), 3);
        assert_eq!(idx.byte_range(1, 1), (0, 3));
        assert_eq!(idx.byte_range(2, 3), (3, 9));
    }

    #[test]
    fn test_line_index_without_trailing_newline() {
        let idx = LineIndex::new("ab\ncd");
        assert_eq!(idx.line_count(), 2);
        assert_eq!(idx.byte_range(2, 2), (3, 5));
        assert_eq!(LineIndex::new("").line_count(), 0);
    }

    #[test]
    fn test_validate_line_range() {
        assert_eq!(validate_line_range(1, 3, 3).unwrap(), (1, 3));
        assert!(validate_line_range(0, 3, 3).is_err());
        assert!(validate_line_range(3, 2, 3).is_err());
        assert!(validate_line_range(1, 4, 3).is_err());
    }

    #[test]
    fn test_normalize_merges_and_clips() {
        let hunks = vec![hunk(1, 4, "a"), hunk(5, 6, "a"), hunk(7, 10, "b")];
        let out = normalize_hunks(hunks, 2, 8);
        assert_eq!(out, vec![hunk(2, 6, "a"), hunk(7, 8, "b")]);
        assert!(check_tiling(&out, 2, 8).is_ok());
    }

    #[test]
    fn test_tiling_detects_gaps() {
        let out = vec![hunk(1, 2, "a"), hunk(4, 5, "b")];
        assert!(check_tiling(&out, 1, 5).is_err());
        assert!(check_tiling(&[hunk(1, 2, "a")], 1, 3).is_err());
    }
}
