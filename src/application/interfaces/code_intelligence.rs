use async_trait::async_trait;

use crate::domain::{DefinitionRequest, DomainError, RefFields};

/// External capability answering "where is the symbol at this position
/// defined?".
#[async_trait]
pub trait CodeIntelligence: Send + Sync {
    /// Returns `None` when the position has no resolvable symbol.
    async fn resolve_definition(
        &self,
        request: &DefinitionRequest,
    ) -> Result<Option<Vec<RefFields>>, DomainError>;
}
