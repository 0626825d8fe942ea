//! Typed job API
//!
//! Job kinds come from the payload type, so a handler can only be registered
//! for the kind its payload belongs to.

pub mod handler;
pub mod job;
pub mod registry;

pub use self::handler::{DynHandler, Handler, TypedHandler};
pub use self::job::{DataPrepJob, Job, ReportJob, TrainAndEvalJob};
pub use self::registry::{RegistryError, TypedRegistry};
