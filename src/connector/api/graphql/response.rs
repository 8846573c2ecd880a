//! Request and response envelopes.

use async_graphql::{Pos, ServerError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use super::{INTERNAL, VALIDATION_ERROR};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub query: String,
    #[serde(default)]
    pub variables: Option<Map<String, Json>>,
    #[serde(default)]
    pub operation_name: Option<String>,
}

impl Request {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn variables(mut self, variables: Map<String, Json>) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl From<Pos> for Location {
    fn from(pos: Pos) -> Self {
        Self {
            line: pos.line,
            column: pos.column,
        }
    }
}

/// One step of a response path: a response key or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorExtensions {
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<PathSegment>,
    pub extensions: ErrorExtensions,
}

impl ResponseError {
    /// Error raised before execution; it has no path.
    pub fn request(message: impl Into<String>, code: &str, pos: Option<Pos>) -> Self {
        Self {
            message: message.into(),
            locations: pos.map(Location::from).into_iter().collect(),
            path: Vec::new(),
            extensions: ErrorExtensions {
                code: code.to_string(),
            },
        }
    }

    /// Convert an engine error. Errors raised without a code are reported
    /// under `fallback_code`.
    pub fn from_server_error(error: ServerError, fallback_code: &str) -> Self {
        let code = error
            .extensions
            .as_ref()
            .and_then(|extensions| serde_json::to_value(extensions).ok())
            .and_then(|extensions| {
                extensions
                    .get("code")
                    .and_then(Json::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| fallback_code.to_string());
        Self {
            message: error.message,
            locations: error.locations.into_iter().map(Location::from).collect(),
            path: error
                .path
                .into_iter()
                .map(|segment| match segment {
                    async_graphql::PathSegment::Field(key) => PathSegment::Key(key),
                    async_graphql::PathSegment::Index(i) => PathSegment::Index(i),
                })
                .collect(),
            extensions: ErrorExtensions { code },
        }
    }

    pub fn code(&self) -> &str {
        &self.extensions.code
    }

    /// The path rendered as `a.b.0.c`.
    pub fn path_string(&self) -> String {
        self.path
            .iter()
            .map(|segment| match segment {
                PathSegment::Key(key) => key.clone(),
                PathSegment::Index(i) => i.to_string(),
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Json>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ResponseError>,
}

impl From<async_graphql::Response> for Response {
    /// A response with no data and only path-less errors failed before
    /// execution and carries no `data` at all.
    fn from(response: async_graphql::Response) -> Self {
        let rejected = response.data == async_graphql::Value::Null
            && !response.errors.is_empty()
            && response.errors.iter().all(|e| e.path.is_empty());
        let fallback_code = if rejected { VALIDATION_ERROR } else { INTERNAL };
        let errors = response
            .errors
            .into_iter()
            .map(|e| ResponseError::from_server_error(e, fallback_code))
            .collect();
        if rejected {
            return Self::from_errors(errors);
        }
        Self {
            data: Some(response.data.into_json().unwrap_or(Json::Null)),
            errors,
        }
    }
}

impl Response {
    pub fn from_errors(errors: Vec<ResponseError>) -> Self {
        Self { data: None, errors }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Look up a value in `data` by a `/`-separated JSON pointer.
    pub fn pointer(&self, pointer: &str) -> Option<&Json> {
        self.data.as_ref().and_then(|data| data.pointer(pointer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::ErrorExtensions as _;
    use serde_json::json;

    #[test]
    fn test_error_serialization_omits_empty_parts() {
        let error = ResponseError::request("bad", "VALIDATION_ERROR", None);
        let value = serde_json::to_value(&error).unwrap();
        assert_eq!(
            value,
            json!({"message": "bad", "extensions": {"code": "VALIDATION_ERROR"}})
        );
    }

    #[test]
    fn test_field_error_path_mixes_keys_and_indices() {
        let mut error = ServerError::new("boom", Some(Pos { line: 3, column: 5 }));
        error.path = vec![
            async_graphql::PathSegment::Field("files".into()),
            async_graphql::PathSegment::Index(2),
            async_graphql::PathSegment::Field("name".into()),
        ];
        let error = ResponseError::from_server_error(error, "INTERNAL");
        let value = serde_json::to_value(&error).unwrap();
        assert_eq!(value["path"], json!(["files", 2, "name"]));
        assert_eq!(value["locations"], json!([{"line": 3, "column": 5}]));
        assert_eq!(error.path_string(), "files.2.name");
        assert_eq!(error.code(), "INTERNAL");
    }

    #[test]
    fn test_error_code_comes_from_extensions() {
        let error = async_graphql::Error::new("gone")
            .extend_with(|_, e| e.set("code", "UPSTREAM_UNAVAILABLE"))
            .into_server_error(Pos { line: 1, column: 3 });
        let error = ResponseError::from_server_error(error, "INTERNAL");
        assert_eq!(error.code(), "UPSTREAM_UNAVAILABLE");
        assert_eq!(error.message, "gone");
    }

    #[test]
    fn test_rejected_response_has_no_data() {
        let rejected = async_graphql::Response::from_errors(vec![ServerError::new(
            "Unknown field \"nope\"",
            Some(Pos { line: 1, column: 10 }),
        )]);
        let response = Response::from(rejected);
        assert!(response.data.is_none());
        assert_eq!(response.errors[0].code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_request_deserializes_camel_case() {
        let request: Request = serde_json::from_value(json!({
            "query": "{ root { remoteRepositories { uri } } }",
            "operationName": "Q"
        }))
        .unwrap();
        assert_eq!(request.operation_name.as_deref(), Some("Q"));
        assert!(request.variables.is_none());
    }
}
