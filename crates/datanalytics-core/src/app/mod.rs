//! App layer
//!
//! Orchestration built from the ports and the queue.
//!
//! # Components
//! - **OrchestratorBuilder**: wiring with fail-fast checks
//! - **Dispatcher**: enqueues jobs and returns the handle at once
//! - **StatusReconciler**: handle → StatusDocument
//! - **SessionResolver**: finds TRAIN/EVAL session directories
//! - **TaskSessions**: per-client handle memory
//! - **Runtime / WorkerGroup**: run leased tasks, with an optional result GC loop

pub mod builder;
pub mod client_sessions;
pub mod dispatcher;
mod gc_loop;
pub mod reconciler;
pub mod runtime;
pub mod sessions;
pub mod worker_loop;

pub use self::builder::{BuildError, Orchestrator, OrchestratorBuilder};
pub use self::client_sessions::{RunningOverview, TaskSessions};
pub use self::dispatcher::{DispatchError, Dispatcher};
pub use self::reconciler::StatusReconciler;
pub use self::runtime::Runtime;
pub use self::sessions::{latest_session, Session, SessionKind, SessionResolver, LATEST};
pub use self::worker_loop::WorkerGroup;
