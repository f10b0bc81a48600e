//! File snapshots of the training relation (CSV or Parquet)

use super::{DataSource, RawDataset};
use crate::error::{Result, TrainerError};
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads a dataset exported from the store to a local file
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    infer_schema_length: usize,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            infer_schema_length: 10_000,
        }
    }

    /// Number of CSV rows scanned when inferring column dtypes
    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_csv(&self) -> Result<DataFrame> {
        let file = File::open(&self.path).map_err(|e| {
            TrainerError::Connectivity(format!("cannot open {}: {}", self.path.display(), e))
        })?;

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| TrainerError::Connectivity(e.to_string()))
    }

    fn load_parquet(&self) -> Result<DataFrame> {
        let file = File::open(&self.path).map_err(|e| {
            TrainerError::Connectivity(format!("cannot open {}: {}", self.path.display(), e))
        })?;

        ParquetReader::new(file)
            .finish()
            .map_err(|e| TrainerError::Connectivity(e.to_string()))
    }
}

impl DataSource for FileSource {
    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }

    fn fetch(&self) -> Result<RawDataset> {
        let extension = self
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .unwrap_or_default();

        let frame = match extension.as_str() {
            "csv" => self.load_csv()?,
            "parquet" | "pq" => self.load_parquet()?,
            other => {
                return Err(TrainerError::Configuration(format!(
                    "unsupported dataset file extension '{}' (expected csv or parquet)",
                    other
                )))
            }
        };

        debug!(
            path = %self.path.display(),
            rows = frame.height(),
            cols = frame.width(),
            "Loaded dataset file"
        );
        RawDataset::new(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn create_test_csv() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "id,score,flag,y").unwrap();
        writeln!(file, "1,0.5,true,0").unwrap();
        writeln!(file, "2,1.5,false,1").unwrap();
        writeln!(file, "3,2.5,true,1").unwrap();
        file
    }

    #[test]
    fn test_load_csv() {
        let file = create_test_csv();
        let raw = FileSource::new(file.path()).fetch().unwrap();

        assert_eq!(raw.n_rows(), 3);
        assert_eq!(raw.n_columns(), 4);
        assert_eq!(raw.frame().column("score").unwrap().dtype(), &DataType::Float64);
        assert_eq!(raw.frame().column("flag").unwrap().dtype(), &DataType::Boolean);
    }

    #[test]
    fn test_unknown_extension() {
        let file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        let err = FileSource::new(file.path()).fetch().unwrap_err();
        assert!(matches!(err, TrainerError::Configuration(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = FileSource::new("/nonexistent/dataset.csv").fetch().unwrap_err();
        assert!(matches!(err, TrainerError::Connectivity(_)));
    }
}
