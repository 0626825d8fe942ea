//! TypedRegistry - handler registration by job kind

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::{DynHandler, Handler, TypedHandler};
use super::job::Job;
use crate::domain::JobKind;

/// Handlers keyed by [`JobKind`], at most one per kind.
///
/// ```ignore
/// let mut registry = TypedRegistry::new();
/// registry.register::<DataPrepJob, _>(prep_executor)?;
/// let handler = registry.get(JobKind::Prep);
/// ```
#[derive(Default)]
pub struct TypedRegistry {
    handlers: HashMap<JobKind, Arc<dyn DynHandler>>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Handler for job kind '{0}' is already registered")]
    AlreadyRegistered(JobKind),
}

impl TypedRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register<J: Job, H: Handler<J> + 'static>(
        &mut self,
        handler: H,
    ) -> Result<(), RegistryError> {
        if self.handlers.contains_key(&J::KIND) {
            return Err(RegistryError::AlreadyRegistered(J::KIND));
        }
        self.handlers
            .insert(J::KIND, Arc::new(TypedHandler::new(handler)));
        Ok(())
    }

    pub fn get(&self, kind: JobKind) -> Option<Arc<dyn DynHandler>> {
        self.handlers.get(&kind).cloned()
    }

    pub fn registered_kinds(&self) -> Vec<JobKind> {
        let mut kinds: Vec<_> = self.handlers.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}
