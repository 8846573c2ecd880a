//! # Query engine
//!
//! The repository graph served through `async-graphql`. Sibling fields run
//! concurrently; backend-bound fields are memoized per query and abandoned
//! when the query is cancelled or runs past its deadline.
//!
//! ```graphql
//! { root { repository(uri: "github.com/acme/widgets") {
//!     latest { commit { sha1 tree { files { name } } } }
//! } } }
//! ```

mod context;
mod query;
mod response;
mod schema;

use std::time::Duration;

use async_graphql::parser::{parse_query, types::OperationType};
use async_graphql::{EmptyMutation, EmptySubscription, Schema, Variables};
use serde_json::Value as Json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

pub use context::{GraphServices, QueryScope, CANCELLED, NULL_ON_NON_NULL_FIELD};
pub use query::{Query, Root};
pub use response::{ErrorExtensions, Location, PathSegment, Request, Response, ResponseError};
pub use schema::Node;

pub const SYNTAX_ERROR: &str = "SYNTAX_ERROR";
pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
pub const INTERNAL: &str = "INTERNAL";

/// Deepest selection the schema accepts.
pub const MAX_QUERY_DEPTH: usize = 32;
/// Deepest bracket nesting accepted in a document, checked before parsing.
pub const MAX_NESTING: usize = 64;
const MAX_COMPLEXITY: usize = 2048;

pub type RepositoryGraph = Schema<Query, EmptyMutation, EmptySubscription>;

/// Build the schema over `services`.
pub fn build_schema(services: GraphServices) -> RepositoryGraph {
    Schema::build(Query, EmptyMutation, EmptySubscription)
        .data(services)
        .limit_depth(MAX_QUERY_DEPTH)
        .limit_recursive_depth(MAX_NESTING)
        .limit_complexity(MAX_COMPLEXITY)
        .finish()
}

pub struct QueryEngine {
    schema: RepositoryGraph,
    timeout: Option<Duration>,
}

impl QueryEngine {
    pub fn new(services: GraphServices) -> Self {
        Self {
            schema: build_schema(services),
            timeout: None,
        }
    }

    /// Per-query deadline; on expiry in-flight fields resolve to
    /// `CANCELLED` errors.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn schema(&self) -> &RepositoryGraph {
        &self.schema
    }

    pub fn sdl(&self) -> String {
        self.schema.sdl()
    }

    pub async fn execute(&self, request: Request) -> Response {
        self.execute_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Execute `request`; cancelling `cancel` abandons every pending field.
    pub async fn execute_with_cancellation(
        &self,
        request: Request,
        cancel: CancellationToken,
    ) -> Response {
        let span = info_span!("query", request_id = %Uuid::new_v4());
        self.run(request, cancel).instrument(span).await
    }

    async fn run(&self, request: Request, cancel: CancellationToken) -> Response {
        if let Err(rejection) = check_document(&request.query) {
            debug!("rejected query: {}", rejection.message);
            return Response::from_errors(vec![rejection]);
        }

        let token = cancel.child_token();
        let deadline = self.timeout.map(|timeout| {
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                warn!(timeout_ms = timeout.as_millis() as u64, "query deadline exceeded");
                token.cancel();
            })
        });

        let operation = request.operation_name.clone().unwrap_or_default();
        let mut graph_request =
            async_graphql::Request::new(request.query).data(QueryScope::new(token));
        if let Some(variables) = request.variables {
            graph_request = graph_request.variables(Variables::from_json(Json::Object(variables)));
        }
        if let Some(name) = request.operation_name {
            graph_request = graph_request.operation_name(name);
        }

        let response = Response::from(self.schema.execute(graph_request).await);
        if let Some(deadline) = deadline {
            deadline.abort();
        }

        info!(
            operation = operation.as_str(),
            errors = response.errors.len(),
            "query executed"
        );
        response
    }
}

/// Reject documents the engine will not run: anything nested past
/// [`MAX_NESTING`], anything that does not parse, and mutations or
/// subscriptions.
fn check_document(query: &str) -> Result<(), ResponseError> {
    let depth = nesting_depth(query);
    if depth > MAX_NESTING {
        return Err(ResponseError::request(
            format!("document nests {} levels deep; the limit is {}", depth, MAX_NESTING),
            VALIDATION_ERROR,
            None,
        ));
    }

    let document = parse_query(query).map_err(|e| {
        ResponseError::request(e.to_string(), SYNTAX_ERROR, e.positions().next())
    })?;

    for (_, operation) in document.operations.iter() {
        if operation.node.ty != OperationType::Query {
            return Err(ResponseError::request(
                format!("{} operations are not supported", operation.node.ty),
                VALIDATION_ERROR,
                Some(operation.pos),
            ));
        }
    }
    Ok(())
}

/// Deepest nesting of `{`, `(` and `[` outside strings and comments. The
/// parser recurses once per level, so this runs first.
fn nesting_depth(query: &str) -> usize {
    let bytes = query.as_bytes();
    let (mut i, mut depth, mut deepest) = (0, 0usize, 0usize);
    while i < bytes.len() {
        match bytes[i] {
            b'#' => {
                while i < bytes.len() && bytes[i] != b'\n' && bytes[i] != b'\r' {
                    i += 1;
                }
            }
            b'"' if bytes[i..].starts_with(b"\"\"\"") => {
                i += 3;
                while i < bytes.len() && !bytes[i..].starts_with(b"\"\"\"") {
                    i += if bytes[i..].starts_with(b"\\\"\"\"") { 4 } else { 1 };
                }
                i += 2;
            }
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' && bytes[i] != b'\n' {
                    i += if bytes[i] == b'\\' { 2 } else { 1 };
                }
            }
            b'{' | b'(' | b'[' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            b'}' | b')' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
        i += 1;
    }
    deepest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nesting_depth_counts_brackets() {
        assert_eq!(nesting_depth("{ root { repository(uri: \"x\") { uri } } }"), 3);
        assert_eq!(nesting_depth("query($ids: [ID!]) { a }"), 2);
        assert_eq!(nesting_depth(""), 0);
    }

    #[test]
    fn test_nesting_depth_skips_strings_and_comments() {
        assert_eq!(nesting_depth("{ a(x: \"{{{{ \\\" [[[\") }"), 2);
        assert_eq!(nesting_depth("# {{{{{{\n{ a }"), 1);
        assert_eq!(nesting_depth("{ a(x: \"\"\" {{{ \\\"\"\" ((( \"\"\") }"), 2);
    }

    #[test]
    fn test_check_document_rejects_deep_nesting_before_parsing() {
        let depth = 10_000;
        let query = "{ a ".repeat(depth) + &"}".repeat(depth);
        let error = check_document(&query).unwrap_err();
        assert_eq!(error.code(), VALIDATION_ERROR);
        assert!(error.message.contains("10000"));
    }

    #[test]
    fn test_check_document_reports_syntax_errors_with_location() {
        let error = check_document("{ root { ").unwrap_err();
        assert_eq!(error.code(), SYNTAX_ERROR);
        assert!(!error.locations.is_empty());
    }

    #[test]
    fn test_check_document_rejects_mutations() {
        let error = check_document("mutation { root }").unwrap_err();
        assert_eq!(error.code(), VALIDATION_ERROR);
        assert_eq!(error.locations[0].line, 1);
    }
}
