//! DatasetReader port - tabular read of a project's uploaded dataset.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

/// Header row plus string cells. Rows may be shorter than the header; missing
/// trailing cells count as empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Cells of one column, top to bottom.
    pub fn column(&self, index: usize) -> impl Iterator<Item = &str> + '_ {
        self.rows
            .iter()
            .map(move |row| row.get(index).map(String::as_str).unwrap_or(""))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("dataset not found: {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to read dataset {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },
}

#[async_trait]
pub trait DatasetReader: Send + Sync {
    async fn read(&self, path: &Path) -> Result<Table, DatasetError>;
}
