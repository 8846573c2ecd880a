use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::application::CodeIntelligence;
use crate::domain::{DefinitionRequest, DomainError, RefFields};

/// A [`CodeIntelligence`] returning a fixed answer, optionally after a delay.
pub struct MockCodeIntelligence {
    answer: Option<Vec<RefFields>>,
    fail: bool,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockCodeIntelligence {
    pub fn new(answer: Option<Vec<RefFields>>) -> Self {
        Self {
            answer,
            fail: false,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// A capability whose every call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(None)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CodeIntelligence for MockCodeIntelligence {
    async fn resolve_definition(
        &self,
        _request: &DefinitionRequest,
    ) -> Result<Option<Vec<RefFields>>, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(DomainError::upstream("mock code intelligence failure"));
        }
        Ok(self.answer.clone())
    }
}
