use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::CodeIntelligence;
use crate::domain::{DefinitionRequest, DomainError, RefFields, RefLocation, Uri};

const DEFINITION_PATH: &str = "/definition";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest<'a> {
    repository: &'a str,
    commit: &'a str,
    path: &'a str,
    line: u32,
    column: u32,
    language: &'a str,
}

/// Subset of the code-intelligence response we use.
#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    locations: Option<Vec<ApiLocation>>,
}

#[derive(Deserialize)]
struct ApiLocation {
    uri: Option<String>,
    range: Option<ApiRange>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiRange {
    start_line: u32,
    start_column: u32,
    end_line: u32,
    end_column: u32,
}

/// A [`CodeIntelligence`] backed by an HTTP service.
///
/// The definition request is POSTed as JSON to `<base>/definition`; the
/// service answers with `{"locations": [{"uri", "range"}]}` (1-based ranges).
/// An empty or missing `locations` means the position has no definition.
pub struct HttpCodeIntelligence {
    client: reqwest::Client,
    url: String,
}

impl HttpCodeIntelligence {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            url: format!("{}{}", base.trim_end_matches('/'), DEFINITION_PATH),
        }
    }

    /// Reads `REPOGRAPH_CODE_INTEL_URL`; `None` when unset or empty.
    pub fn from_env() -> Option<Self> {
        let base = std::env::var("REPOGRAPH_CODE_INTEL_URL").ok()?;
        if base.trim().is_empty() {
            return None;
        }
        Some(Self::new(base))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn parse_response(body: &str) -> Result<Option<Vec<RefFields>>, DomainError> {
        let response: ApiResponse = serde_json::from_str(body).map_err(|e| {
            DomainError::upstream(format!("malformed code intelligence response: {}", e))
        })?;
        let locations = match response.locations {
            Some(locations) if !locations.is_empty() => locations,
            _ => return Ok(None),
        };
        Ok(Some(
            locations
                .into_iter()
                .map(|loc| RefFields {
                    ref_location: loc.range.map(|r| RefLocation {
                        start_line_number: r.start_line,
                        start_column: r.start_column,
                        end_line_number: r.end_line,
                        end_column: r.end_column,
                    }),
                    uri: loc.uri.as_deref().and_then(Uri::parse),
                })
                .collect(),
        ))
    }
}

#[async_trait]
impl CodeIntelligence for HttpCodeIntelligence {
    async fn resolve_definition(
        &self,
        request: &DefinitionRequest,
    ) -> Result<Option<Vec<RefFields>>, DomainError> {
        let body = ApiRequest {
            repository: &request.repository,
            commit: &request.commit,
            path: &request.path,
            line: request.line,
            column: request.column,
            language: &request.language,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DomainError::upstream(format!("code intelligence request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(DomainError::upstream(format!(
                "code intelligence returned {}: {}",
                status, text
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| DomainError::upstream(format!("code intelligence read failed: {}", e)))?;
        debug!(path = %request.path, "code intelligence raw response: {}", text);
        Self::parse_response(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_response_maps_locations() {
        let body = r#"{"locations":[{"uri":"git://github.com/acme/lib?abc#src/a.rs",
            "range":{"startLine":3,"startColumn":5,"endLine":3,"endColumn":9}}]}"#;
        let refs = HttpCodeIntelligence::parse_response(body).unwrap().unwrap();
        assert_eq!(refs.len(), 1);
        let loc = refs[0].ref_location.unwrap();
        assert_eq!((loc.start_line_number, loc.end_column), (3, 9));
        assert_eq!(refs[0].uri.as_ref().unwrap().fragment, "src/a.rs");
    }

    #[test]
    fn parse_response_without_locations_is_none() {
        assert!(HttpCodeIntelligence::parse_response("{}").unwrap().is_none());
        assert!(HttpCodeIntelligence::parse_response(r#"{"locations":[]}"#)
            .unwrap()
            .is_none());
    }

    #[test]
    fn parse_response_rejects_garbage() {
        let err = HttpCodeIntelligence::parse_response("not json").unwrap_err();
        assert_eq!(err.code(), "UPSTREAM_UNAVAILABLE");
    }

    #[test]
    fn url_joins_base_without_double_slash() {
        let client = HttpCodeIntelligence::new("http://localhost:9000/");
        assert_eq!(client.url(), "http://localhost:9000/definition");
    }
}
