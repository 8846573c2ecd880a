use crate::domain::DomainError;

/// Reject revision specs that no backend could interpret. Branch names,
/// tag names, hashes and ancestry suffixes (`~`, `^`) pass through.
pub fn validate_revision(rev: &str) -> Result<(), DomainError> {
    let reject = |why: &str| Err(DomainError::invalid_revision(format!("{:?}: {}", rev, why)));

    if rev.is_empty() {
        return reject("empty revision");
    }
    if rev.starts_with('-') {
        return reject("may not start with '-'");
    }
    if rev.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return reject("contains whitespace or control characters");
    }
    if rev.contains("..") {
        return reject("ranges are not revisions");
    }
    if rev.contains("@{") {
        return reject("reflog selectors are not supported");
    }
    if rev.contains('\\') || rev.contains(':') {
        return reject("contains a forbidden character");
    }
    Ok(())
}

/// True for a full 40-character hexadecimal object id.
pub fn is_full_hash(rev: &str) -> bool {
    rev.len() == 40 && rev.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_common_revisions() {
        for rev in ["master", "feature/x", "v1.2.3", "abc123", "HEAD~2", "main^"] {
            assert!(validate_revision(rev).is_ok(), "{} should be valid", rev);
        }
    }

    #[test]
    fn test_rejects_malformed_revisions() {
        for rev in ["", "-rf", "a b", "a..b", "HEAD@{1}", "a:b", "a\\b"] {
            let err = validate_revision(rev).unwrap_err();
            assert_eq!(err.code(), "INVALID_REVISION", "{:?}", rev);
        }
    }

    #[test]
    fn test_is_full_hash() {
        assert!(is_full_hash(&"a".repeat(40)));
        assert!(!is_full_hash("abc123"));
        assert!(!is_full_hash(&"g".repeat(40)));
    }
}
