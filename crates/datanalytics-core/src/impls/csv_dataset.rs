//! CSV dataset reader.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::ports::{DatasetError, DatasetReader, Table};

/// Reads a headed CSV file into a [`Table`]. Ragged rows are accepted.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvDatasetReader;

impl CsvDatasetReader {
    fn read_blocking(path: &Path) -> Result<Table, DatasetError> {
        if !path.exists() {
            return Err(DatasetError::Missing(path.to_path_buf()));
        }
        let read_err = |e: csv::Error| DatasetError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(read_err)?;
        let columns = reader
            .headers()
            .map_err(read_err)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(read_err)?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(Table::new(columns, rows))
    }
}

#[async_trait]
impl DatasetReader for CsvDatasetReader {
    async fn read(&self, path: &Path) -> Result<Table, DatasetError> {
        let owned: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::read_blocking(&owned))
            .await
            .map_err(|e| DatasetError::Read {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?
    }
}
