//! Handler trait - executes one typed job
//!
//! - `Handler<J>`: typed surface, one implementation per job payload
//! - `DynHandler`: object-safe form stored in the registry
//! - `TypedHandler<J, H>`: type erasure from the former to the latter

use std::marker::PhantomData;

use async_trait::async_trait;

use super::job::Job;
use crate::domain::{JobError, JobKind, ResultRecord};

/// Executes one decoded job.
///
/// Business failures come back as `Ok` failure records. `Err` is reserved for
/// faults the queue should retry or abort on.
#[async_trait]
pub trait Handler<J: Job>: Send + Sync {
    async fn handle(&self, job: J) -> Result<ResultRecord, JobError>;
}

#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(&self, payload: serde_json::Value) -> Result<ResultRecord, JobError>;

    fn kind(&self) -> JobKind;
}

pub struct TypedHandler<J: Job, H: Handler<J>> {
    handler: H,
    _marker: PhantomData<J>,
}

impl<J: Job, H: Handler<J>> TypedHandler<J, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<J: Job, H: Handler<J>> DynHandler for TypedHandler<J, H> {
    async fn handle_dyn(&self, payload: serde_json::Value) -> Result<ResultRecord, JobError> {
        // a broken payload stays broken on retry
        let job: J = serde_json::from_value(payload)
            .map_err(|e| JobError::permanent(format!("json decode: {e}")))?;
        self.handler.handle(job).await
    }

    fn kind(&self) -> JobKind {
        J::KIND
    }
}

// `Arc<H>` lets the same executor instance back a handler and stay reachable
// from elsewhere.
#[async_trait]
impl<J: Job, H: Handler<J> + ?Sized> Handler<J> for std::sync::Arc<H> {
    async fn handle(&self, job: J) -> Result<ResultRecord, JobError> {
        (**self).handle(job).await
    }
}
