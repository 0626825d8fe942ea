//! datanalytics-core
//!
//! Asynchronous job orchestration for data-analysis projects: jobs are
//! enqueued without blocking, run by background workers around an external
//! runner, and polled through a uniform status document.
//!
//! # Modules
//! - **domain**: ids, job kinds, projects, result records, status documents, errors, decisions
//! - **ports**: boundaries to the outside (ProcessRunner, ProjectStore, DatasetReader, Clock, IdGenerator)
//! - **impls**: port implementations (ShellRunner, InMemoryProjectStore, CsvDatasetReader)
//! - **queue**: Broker / ResultBackend and the in-memory implementation (retry, TTL)
//! - **typed**: typed job API (Job, Handler, TypedRegistry)
//! - **executors**: the prep, train+eval and report work itself
//! - **app**: Dispatcher, StatusReconciler, SessionResolver, WorkerGroup, OrchestratorBuilder
//! - **config**: OrchestratorConfig, read from environment variables

pub mod app;
pub mod config;
pub mod domain;
pub mod executors;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod queue;
pub mod typed;

pub use app::{
    BuildError, DispatchError, Dispatcher, Orchestrator, OrchestratorBuilder, StatusReconciler,
    TaskSessions, WorkerGroup,
};
pub use config::{ArtifactCheck, ConfigError, OrchestratorConfig, SameProjectPolicy};
pub use domain::{JobKind, PollStatus, ResultRecord, StatusDocument, TaskHandle};
