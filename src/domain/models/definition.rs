use serde::{Deserialize, Serialize};
use url::Url;

/// 1-based line/column span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefLocation {
    pub start_line_number: u32,
    pub start_column: u32,
    pub end_line_number: u32,
    pub end_column: u32,
}

/// URI split into its parts; absent parts are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Uri {
    pub scheme: String,
    pub host: String,
    pub path: String,
    pub query: String,
    pub fragment: String,
}

impl Uri {
    pub fn parse(raw: &str) -> Option<Self> {
        let url = Url::parse(raw).ok()?;
        Some(Self::from(&url))
    }
}

impl From<&Url> for Uri {
    fn from(url: &Url) -> Self {
        Self {
            scheme: url.scheme().to_string(),
            host: url.host_str().unwrap_or_default().to_string(),
            path: url.path().to_string(),
            query: url.query().unwrap_or_default().to_string(),
            fragment: url.fragment().unwrap_or_default().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefFields {
    pub ref_location: Option<RefLocation>,
    pub uri: Option<Uri>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub global_references: Vec<RefFields>,
}

/// Position handed to the external code-intelligence capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionRequest {
    pub repository: String,
    pub commit: String,
    pub path: String,
    pub line: u32,
    pub column: u32,
    pub language: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_parts() {
        let uri = Uri::parse("git://github.com/acme/widgets?abc123#src/lib.rs").unwrap();
        assert_eq!(uri.scheme, "git");
        assert_eq!(uri.host, "github.com");
        assert_eq!(uri.path, "/acme/widgets");
        assert_eq!(uri.query, "abc123");
        assert_eq!(uri.fragment, "src/lib.rs");
    }

    #[test]
    fn test_uri_missing_parts_are_empty() {
        let uri = Uri::parse("https://example.com").unwrap();
        assert_eq!(uri.query, "");
        assert_eq!(uri.fragment, "");
        assert!(Uri::parse("not a uri").is_none());
    }
}
