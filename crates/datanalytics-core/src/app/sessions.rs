//! Session resolver: finds the newest TRAIN/EVAL session directory of a
//! project under `{root}/sessions`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Sentinel returned when no session exists yet.
pub const LATEST: &str = "latest";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Train,
    Eval,
}

impl SessionKind {
    pub fn prefix(self) -> &'static str {
        match self {
            SessionKind::Train => "TRAIN",
            SessionKind::Eval => "EVAL",
        }
    }
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Result of a lookup. `Latest` means "not available yet", never a real
/// directory name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Named(String),
    Latest,
}

impl Session {
    pub fn as_str(&self) -> &str {
        match self {
            Session::Named(name) => name,
            Session::Latest => LATEST,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Session::Named(_))
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Newest directory in `root/sessions` whose name starts with
/// `{KIND}_{project_name}`.
///
/// Newest means latest creation time, or modification time where the
/// filesystem does not record creation. Equal times go to the greatest name.
pub fn latest_session(kind: SessionKind, project_name: &str, root: &Path) -> Session {
    let sessions_dir = root.join("sessions");
    let entries = match std::fs::read_dir(&sessions_dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %sessions_dir.display(), error = %e, "no sessions directory");
            return Session::Latest;
        }
    };

    let prefix = format!("{}_{}", kind.prefix(), project_name);
    let candidates = entries.filter_map(Result::ok).filter_map(|entry| {
        let name = entry.file_name().into_string().ok()?;
        if !name.starts_with(&prefix) {
            return None;
        }
        let metadata = entry.metadata().ok()?;
        if !metadata.is_dir() {
            return None;
        }
        let created = metadata.created().or_else(|_| metadata.modified()).ok()?;
        Some((created, name))
    });

    match pick_latest(candidates) {
        Some(name) => Session::Named(name),
        None => Session::Latest,
    }
}

fn pick_latest(candidates: impl Iterator<Item = (SystemTime, String)>) -> Option<String> {
    candidates.max().map(|(_, name)| name)
}

/// [`latest_session`] bound to one root.
#[derive(Debug, Clone)]
pub struct SessionResolver {
    root: PathBuf,
}

impl SessionResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// [`latest_session`] on the blocking pool, so directory scans never
    /// stall a runtime worker.
    pub async fn latest(&self, kind: SessionKind, project_name: &str) -> Session {
        let root = self.root.clone();
        let project = project_name.to_string();
        match tokio::task::spawn_blocking(move || latest_session(kind, &project, &root)).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(error = %e, kind = %kind, project = project_name, "session scan aborted");
                Session::Latest
            }
        }
    }

    /// `root/sessions/<name>`. For [`Session::Latest`] this points at a
    /// directory named `latest`, which normally does not exist.
    pub fn session_path(&self, session: &Session) -> PathBuf {
        self.root.join("sessions").join(session.as_str())
    }
}
