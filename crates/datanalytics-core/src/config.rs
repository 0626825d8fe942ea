//! Orchestrator configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::queue::RetryPolicy;

pub const DEFAULT_RUNNER: &str = "conda run -n gizmo python main.py";

/// What the status reconciler does when a finished job's artifact is not on
/// disk yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArtifactCheck {
    /// Report `done` anyway and log a warning.
    #[default]
    Warn,
    /// Keep reporting `running` until the artifact shows up.
    Strict,
}

/// Whether the dispatcher accepts a job while the previous one of the same
/// kind for the same project is still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameProjectPolicy {
    #[default]
    Allow,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid value {value:?} for {key}: {reason}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
    pub reason: String,
}

impl ConfigError {
    fn new(key: &'static str, value: &str, reason: impl fmt::Display) -> Self {
        Self {
            key,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl FromStr for ArtifactCheck {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(ArtifactCheck::Warn),
            "strict" => Ok(ArtifactCheck::Strict),
            other => Err(format!("expected warn or strict, got {other:?}")),
        }
    }
}

impl FromStr for SameProjectPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(SameProjectPolicy::Allow),
            "reject" => Ok(SameProjectPolicy::Reject),
            other => Err(format!("expected allow or reject, got {other:?}")),
        }
    }
}

/// Everything the orchestration layer needs to know about its surroundings.
///
/// Paths are taken as given; relative paths resolve against the process
/// working directory at use time.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Command prefix of the external runner.
    pub runner_command: String,
    /// Working directory of runner invocations. Session directories live in
    /// `runner_dir/sessions`.
    pub runner_dir: PathBuf,
    /// Prep outputs go to `output_root/{owner}_{project}`.
    pub output_root: PathBuf,
    /// Reports go to `report_root/{user}/{user}_{project}.html`.
    pub report_root: PathBuf,
    pub workers: usize,
    pub retry: RetryPolicy,
    /// `None` keeps results forever.
    pub result_ttl: Option<Duration>,
    /// How often workers sweep expired results out of the broker.
    pub gc_interval: Duration,
    pub artifact_check: ArtifactCheck,
    pub same_project: SameProjectPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        let media_root = PathBuf::from("media");
        Self {
            runner_command: DEFAULT_RUNNER.to_string(),
            runner_dir: PathBuf::from("gizmo"),
            output_root: media_root.join("output_data"),
            report_root: media_root.join("reports"),
            workers: 2,
            retry: RetryPolicy::default(),
            result_ttl: Some(Duration::from_secs(86_400)),
            gc_interval: Duration::from_secs(300),
            artifact_check: ArtifactCheck::Warn,
            same_project: SameProjectPolicy::Allow,
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                              |
    /// |---------------------------|--------------------------------------|
    /// | `GIZMO_RUNNER`            | `conda run -n gizmo python main.py`  |
    /// | `GIZMO_DIR`               | `gizmo`                              |
    /// | `MEDIA_ROOT`              | `media`                              |
    /// | `OUTPUT_ROOT`             | `$MEDIA_ROOT/output_data`            |
    /// | `REPORT_ROOT`             | `$MEDIA_ROOT/reports`                |
    /// | `WORKER_CONCURRENCY`      | `2`                                  |
    /// | `TASK_MAX_ATTEMPTS`       | `3`                                  |
    /// | `TASK_RETRY_DELAY_SECS`   | `5`                                  |
    /// | `RESULT_TTL_SECS`         | `86400` (`0` disables expiry)        |
    /// | `RESULT_GC_INTERVAL_SECS` | `300`                                |
    /// | `ARTIFACT_CHECK`          | `warn`                               |
    /// | `SAME_PROJECT_POLICY`     | `allow`                              |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let media_root = get("MEDIA_ROOT").map(PathBuf::from);
        let output_root = match (get("OUTPUT_ROOT"), &media_root) {
            (Some(path), _) => PathBuf::from(path),
            (None, Some(media)) => media.join("output_data"),
            (None, None) => defaults.output_root,
        };
        let report_root = match (get("REPORT_ROOT"), &media_root) {
            (Some(path), _) => PathBuf::from(path),
            (None, Some(media)) => media.join("reports"),
            (None, None) => defaults.report_root,
        };

        let workers: usize = parse_or(&get, "WORKER_CONCURRENCY", defaults.workers)?;
        if workers == 0 {
            return Err(ConfigError::new("WORKER_CONCURRENCY", "0", "must be at least 1"));
        }

        let max_attempts: u32 =
            parse_or(&get, "TASK_MAX_ATTEMPTS", defaults.retry.max_attempts)?;
        if max_attempts == 0 {
            return Err(ConfigError::new("TASK_MAX_ATTEMPTS", "0", "must be at least 1"));
        }
        let delay_secs: u64 = parse_or(
            &get,
            "TASK_RETRY_DELAY_SECS",
            defaults.retry.base_delay.as_secs(),
        )?;

        let ttl_secs: u64 = parse_or(&get, "RESULT_TTL_SECS", 86_400)?;
        let result_ttl = (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs));

        let gc_secs: u64 = parse_or(
            &get,
            "RESULT_GC_INTERVAL_SECS",
            defaults.gc_interval.as_secs(),
        )?;
        if gc_secs == 0 {
            return Err(ConfigError::new("RESULT_GC_INTERVAL_SECS", "0", "must be at least 1"));
        }

        let artifact_check = parse_or(&get, "ARTIFACT_CHECK", defaults.artifact_check)?;
        let same_project = parse_or(&get, "SAME_PROJECT_POLICY", defaults.same_project)?;

        Ok(Self {
            runner_command: get("GIZMO_RUNNER").unwrap_or(defaults.runner_command),
            runner_dir: get("GIZMO_DIR").map(PathBuf::from).unwrap_or(defaults.runner_dir),
            output_root,
            report_root,
            workers,
            retry: RetryPolicy::fixed(max_attempts, Duration::from_secs(delay_secs)),
            result_ttl,
            gc_interval: Duration::from_secs(gc_secs),
            artifact_check,
            same_project,
        })
    }

    /// Root handed to the session resolver.
    pub fn sessions_root(&self) -> &std::path::Path {
        &self.runner_dir
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::new(key, &raw, e)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = OrchestratorConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.runner_command, DEFAULT_RUNNER);
        assert_eq!(config.runner_dir, PathBuf::from("gizmo"));
        assert_eq!(config.output_root, PathBuf::from("media/output_data"));
        assert_eq!(config.report_root, PathBuf::from("media/reports"));
        assert_eq!(config.workers, 2);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.next_delay(1), Duration::from_secs(5));
        assert_eq!(config.result_ttl, Some(Duration::from_secs(86_400)));
        assert_eq!(config.gc_interval, Duration::from_secs(300));
        assert_eq!(config.artifact_check, ArtifactCheck::Warn);
        assert_eq!(config.same_project, SameProjectPolicy::Allow);
    }

    #[test]
    fn media_root_moves_both_derived_roots() {
        let config = OrchestratorConfig::from_lookup(lookup(&[
            ("MEDIA_ROOT", "/srv/media"),
            ("REPORT_ROOT", "/srv/reports"),
        ]))
        .unwrap();

        assert_eq!(config.output_root, PathBuf::from("/srv/media/output_data"));
        assert_eq!(config.report_root, PathBuf::from("/srv/reports"));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = OrchestratorConfig::from_lookup(lookup(&[
            ("GIZMO_RUNNER", "python main.py"),
            ("WORKER_CONCURRENCY", "8"),
            ("TASK_MAX_ATTEMPTS", "5"),
            ("TASK_RETRY_DELAY_SECS", "1"),
            ("RESULT_TTL_SECS", "0"),
            ("RESULT_GC_INTERVAL_SECS", "30"),
            ("ARTIFACT_CHECK", "Strict"),
            ("SAME_PROJECT_POLICY", "reject"),
        ]))
        .unwrap();

        assert_eq!(config.runner_command, "python main.py");
        assert_eq!(config.workers, 8);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.next_delay(2), Duration::from_secs(1));
        assert_eq!(config.result_ttl, None);
        assert_eq!(config.gc_interval, Duration::from_secs(30));
        assert_eq!(config.artifact_check, ArtifactCheck::Strict);
        assert_eq!(config.same_project, SameProjectPolicy::Reject);
    }

    #[rstest]
    #[case::workers_not_a_number("WORKER_CONCURRENCY", "many")]
    #[case::zero_workers("WORKER_CONCURRENCY", "0")]
    #[case::zero_attempts("TASK_MAX_ATTEMPTS", "0")]
    #[case::negative_delay("TASK_RETRY_DELAY_SECS", "-5")]
    #[case::zero_gc_interval("RESULT_GC_INTERVAL_SECS", "0")]
    #[case::unknown_check("ARTIFACT_CHECK", "sometimes")]
    #[case::unknown_policy("SAME_PROJECT_POLICY", "queue")]
    fn invalid_values_are_rejected(#[case] key: &str, #[case] value: &str) {
        let err = OrchestratorConfig::from_lookup(lookup(&[(key, value)])).unwrap_err();
        assert_eq!(err.key, key);
    }
}
