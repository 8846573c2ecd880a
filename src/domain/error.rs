use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid ID: {0}")]
    InvalidId(String),

    #[error("Invalid revision: {0}")]
    InvalidRevision(String),

    #[error("Range error: {0}")]
    Range(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invalid_revision(msg: impl Into<String>) -> Self {
        Self::InvalidRevision(msg.into())
    }

    pub fn range(msg: impl Into<String>) -> Self {
        Self::Range(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn upstream(msg: impl Into<String>) -> Self {
        Self::UpstreamUnavailable(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_storage_error(&self) -> bool {
        matches!(self, Self::StorageError(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Stable machine-readable code reported in response error extensions.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::InvalidId(_) => "INVALID_ID",
            Self::InvalidRevision(_) => "INVALID_REVISION",
            Self::Range(_) => "RANGE_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::UpstreamUnavailable(_) | Self::StorageError(_) | Self::IoError(_) => {
                "UPSTREAM_UNAVAILABLE"
            }
            Self::Cancelled(_) => "CANCELLED",
            Self::Internal(_) => "INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_and_io_errors_report_upstream_code() {
        assert_eq!(DomainError::storage("disk").code(), "UPSTREAM_UNAVAILABLE");
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(DomainError::from(io).code(), "UPSTREAM_UNAVAILABLE");
    }

    #[test]
    fn caller_input_errors_have_distinct_codes() {
        assert_eq!(DomainError::invalid_id("x").code(), "INVALID_ID");
        assert_eq!(DomainError::invalid_revision("x").code(), "INVALID_REVISION");
        assert_eq!(DomainError::range("x").code(), "RANGE_ERROR");
    }
}
