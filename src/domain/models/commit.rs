use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A commit pinned to its repository. Commits are immutable, so every
/// read scoped to a `Commit` sees the same snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commit {
    repository_uri: String,
    sha1: String,
}

impl Commit {
    pub fn new(repository_uri: impl Into<String>, sha1: impl Into<String>) -> Self {
        Self {
            repository_uri: repository_uri.into(),
            sha1: sha1.into(),
        }
    }

    pub fn repository_uri(&self) -> &str {
        &self.repository_uri
    }

    pub fn sha1(&self) -> &str {
        &self.sha1
    }

    /// Abbreviated hash for log lines.
    pub fn short(&self) -> &str {
        &self.sha1[..self.sha1.len().min(7)]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub email: String,
}

impl Person {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Hex SHA-256 of the trimmed, lower-cased email.
    pub fn gravatar_hash(&self) -> String {
        let normalized = self.email.trim().to_lowercase();
        format!("{:x}", Sha256::digest(normalized.as_bytes()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub person: Option<Person>,
    /// RFC 3339, UTC.
    pub date: String,
}

impl Signature {
    pub fn new(person: Person, date: impl Into<String>) -> Self {
        Self {
            person: Some(person),
            date: date.into(),
        }
    }

    /// Build a signature from a Unix timestamp in seconds.
    pub fn at_epoch(name: &str, email: &str, seconds: i64) -> Self {
        let date = DateTime::<Utc>::from_timestamp(seconds, 0)
            .map(|d| d.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_default();
        Self::new(Person::new(name, email), date)
    }
}

/// One entry of a file's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub rev: String,
    pub author: Option<Signature>,
    pub committer: Option<Signature>,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gravatar_hash_normalizes_email() {
        let a = Person::new("A", "  Alice@Example.COM ");
        let b = Person::new("A", "alice@example.com");
        assert_eq!(a.gravatar_hash(), b.gravatar_hash());
        assert_eq!(a.gravatar_hash().len(), 64);
    }

    #[test]
    fn test_signature_at_epoch_is_rfc3339() {
        let sig = Signature::at_epoch("Alice", "alice@example.com", 0);
        assert_eq!(sig.date, "1970-01-01T00:00:00Z");
        assert_eq!(sig.person.as_ref().map(|p| p.name.as_str()), Some("Alice"));
    }

    #[test]
    fn test_short_sha() {
        let commit = Commit::new("r", "0123456789abcdef");
        assert_eq!(commit.short(), "0123456");
    }
}
