//! JobKind - the categories of background work.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A category of background work with its own executor and result shape.
///
/// The serialized names (`prep`, `train_and_eval`, `sweetviz`) are what clients
/// see as `task_type` in status documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Prep,
    TrainAndEval,
    #[serde(rename = "sweetviz")]
    Report,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::Prep, JobKind::TrainAndEval, JobKind::Report];

    pub fn as_str(self) -> &'static str {
        match self {
            JobKind::Prep => "prep",
            JobKind::TrainAndEval => "train_and_eval",
            JobKind::Report => "sweetviz",
        }
    }

    /// Prefix of the per-client session key under which a handle is remembered
    /// (`{prefix}_{project_name}`).
    pub fn session_key_prefix(self) -> &'static str {
        match self {
            JobKind::Prep => "prep_task",
            JobKind::TrainAndEval => "train_eval_task",
            JobKind::Report => "sweetviz_task",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job kind: {0}")]
pub struct UnknownJobKind(pub String);

impl FromStr for JobKind {
    type Err = UnknownJobKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prep" => Ok(JobKind::Prep),
            "train_and_eval" | "train_eval" => Ok(JobKind::TrainAndEval),
            "sweetviz" | "report" => Ok(JobKind::Report),
            other => Err(UnknownJobKind(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::prep(JobKind::Prep, "\"prep\"")]
    #[case::train(JobKind::TrainAndEval, "\"train_and_eval\"")]
    #[case::report(JobKind::Report, "\"sweetviz\"")]
    fn serializes_as_task_type(#[case] kind: JobKind, #[case] expected: &str) {
        assert_eq!(serde_json::to_string(&kind).unwrap(), expected);
        assert_eq!(kind.to_string(), expected.trim_matches('"'));
    }

    #[test]
    fn parses_aliases() {
        assert_eq!("report".parse::<JobKind>().unwrap(), JobKind::Report);
        assert_eq!("train_eval".parse::<JobKind>().unwrap(), JobKind::TrainAndEval);
        assert!("deploy".parse::<JobKind>().is_err());
    }
}
