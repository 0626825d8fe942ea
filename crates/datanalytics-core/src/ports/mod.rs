//! Ports - traits at the seams to the outside world.
//!
//! Every collaborator the orchestration layer talks to (subprocesses, the
//! project database, datasets on disk, time, id generation) sits behind one of
//! these traits so tests can swap in stubs.

pub mod clock;
pub mod dataset;
pub mod id_generator;
pub mod process_runner;
pub mod project_store;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::dataset::{DatasetError, DatasetReader, Table};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::process_runner::{ProcessRunner, RunnerError};
pub use self::project_store::{ProjectStore, StoreError};
