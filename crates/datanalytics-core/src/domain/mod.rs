//! Domain model (IDs, job kinds, envelopes, records, status documents, errors).

pub mod attempt;
pub mod decision;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod job_kind;
pub mod project;
pub mod record;
pub mod status;

pub use attempt::{AttemptOutcome, AttemptRecord};
pub use decision::{Decider, Decision, DefaultDecider};
pub use envelope::{JobMessage, TaskEnvelope};
pub use errors::{ErrorKind, JobError};
pub use ids::{AttemptId, IdParseError, TaskHandle};
pub use job_kind::JobKind;
pub use project::{InvalidProjectName, Project, ProjectRef, ProjectUpdate};
pub use record::{JobDetail, ProcessOutput, RecordStatus, ResultRecord};
pub use status::{PollStatus, StatusDocument};
