//! Project references and the minimal project entity the orchestration layer
//! reads and writes.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Owner + project name. The "full" name `{owner}_{name}` is what the external
/// runner and the filesystem layout are keyed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectRef {
    pub owner: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid full project name: {0:?} (expected owner_project)")]
pub struct InvalidProjectName(pub String);

impl ProjectRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{}_{}", self.owner, self.name)
    }

    /// Split a full name at the first underscore. Owners never contain `_`,
    /// project names may.
    pub fn parse_full_name(full: &str) -> Result<Self, InvalidProjectName> {
        match full.split_once('_') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() => {
                Ok(Self::new(owner, name))
            }
            _ => Err(InvalidProjectName(full.to_string())),
        }
    }
}

impl fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.owner, self.name)
    }
}

/// Project record as seen by the orchestration layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub owner: String,
    pub name: String,

    /// Uploaded CSV dataset.
    #[serde(default)]
    pub input_dataset: Option<PathBuf>,

    #[serde(default)]
    pub prep_output: Option<PathBuf>,

    #[serde(default)]
    pub train_eval_output: Option<PathBuf>,

    /// Generated exploratory report.
    #[serde(default)]
    pub report: Option<PathBuf>,
}

impl Project {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            input_dataset: None,
            prep_output: None,
            train_eval_output: None,
            report: None,
        }
    }

    pub fn with_dataset(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_dataset = Some(path.into());
        self
    }

    pub fn reference(&self) -> ProjectRef {
        ProjectRef::new(&self.owner, &self.name)
    }

    pub fn apply(&mut self, update: ProjectUpdate) {
        match update {
            ProjectUpdate::PrepOutput(path) => self.prep_output = Some(path),
            ProjectUpdate::TrainEvalOutput(path) => self.train_eval_output = Some(path),
            ProjectUpdate::Report(path) => self.report = Some(path),
        }
    }
}

/// Field write that associates an artifact location with its project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectUpdate {
    PrepOutput(PathBuf),
    TrainEvalOutput(PathBuf),
    Report(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::simple("alice_proj1", "alice", "proj1")]
    #[case::underscore_in_project("alice_churn_q3", "alice", "churn_q3")]
    fn parse_splits_at_first_underscore(
        #[case] full: &str,
        #[case] owner: &str,
        #[case] name: &str,
    ) {
        let project = ProjectRef::parse_full_name(full).unwrap();
        assert_eq!(project, ProjectRef::new(owner, name));
        assert_eq!(project.full_name(), full);
    }

    #[rstest]
    #[case::no_separator("alice")]
    #[case::empty_owner("_proj")]
    #[case::empty_name("alice_")]
    fn parse_rejects_malformed(#[case] full: &str) {
        assert!(ProjectRef::parse_full_name(full).is_err());
    }

    #[test]
    fn apply_sets_matching_field() {
        let mut project = Project::new("alice", "proj1");
        project.apply(ProjectUpdate::Report("/r.html".into()));
        project.apply(ProjectUpdate::PrepOutput("/out".into()));

        assert_eq!(project.report, Some(PathBuf::from("/r.html")));
        assert_eq!(project.prep_output, Some(PathBuf::from("/out")));
        assert_eq!(project.train_eval_output, None);
    }
}
