use std::sync::Arc;

use crate::domain::{JobError, ResultRecord, TaskEnvelope};
use crate::typed::TypedRegistry;

/// Runtime executes a `TaskEnvelope` by dispatching on its job kind.
pub struct Runtime {
    registry: Arc<TypedRegistry>,
}

impl Runtime {
    pub fn new(registry: Arc<TypedRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &TypedRegistry {
        &self.registry
    }

    /// Execute one envelope. A kind without a handler is a permanent error.
    pub async fn execute(&self, envelope: &TaskEnvelope) -> Result<ResultRecord, JobError> {
        let kind = envelope.kind();
        let handler = self.registry.get(kind).ok_or_else(|| {
            JobError::permanent(format!("no handler registered for job kind '{kind}'"))
        })?;

        handler.handle_dyn(envelope.payload().clone()).await
    }
}
