use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::application::CodeIntelligence;
use crate::domain::{Definition, DefinitionRequest, DomainError, File};

/// Resolves definitions through the external code-intelligence capability.
///
/// The capability is optional and never allowed to fail a query: errors and
/// slow answers become `None` with a warning.
pub struct CrossReferenceResolver {
    capability: Option<Arc<dyn CodeIntelligence>>,
    timeout: Duration,
}

impl CrossReferenceResolver {
    pub fn new(capability: Option<Arc<dyn CodeIntelligence>>, timeout: Duration) -> Self {
        Self {
            capability,
            timeout,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None, Duration::ZERO)
    }

    pub async fn definition(
        &self,
        file: &File,
        line: i64,
        column: i64,
        language: &str,
    ) -> Result<Option<Definition>, DomainError> {
        if line < 1 || column < 1 || line > u32::MAX as i64 || column > u32::MAX as i64 {
            return Err(DomainError::range(format!(
                "line and column are 1-based (got line={}, column={})",
                line, column
            )));
        }

        let Some(capability) = &self.capability else {
            return Ok(None);
        };

        let request = DefinitionRequest {
            repository: file.commit.repository_uri().to_string(),
            commit: file.commit.sha1().to_string(),
            path: file.path.clone(),
            line: line as u32,
            column: column as u32,
            language: language.to_string(),
        };

        match tokio::time::timeout(self.timeout, capability.resolve_definition(&request)).await {
            Ok(Ok(Some(references))) => Ok(Some(Definition {
                global_references: references,
            })),
            Ok(Ok(None)) => Ok(None),
            Ok(Err(e)) => {
                warn!(
                    path = %request.path,
                    line = request.line,
                    column = request.column,
                    "code intelligence failed: {}",
                    e
                );
                Ok(None)
            }
            Err(_) => {
                warn!(
                    path = %request.path,
                    line = request.line,
                    column = request.column,
                    "code intelligence timed out after {:?}",
                    self.timeout
                );
                Ok(None)
            }
        }
    }
}
