//! Persistence layer for Retrace
//!
//! Provides the on-disk candle cache (CSV) and the output artifacts written
//! after analysis (signals JSON, enriched CSV, text reports).

pub mod repository;
pub mod schema;

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing column {0} in candle file")]
    MissingColumn(&'static str),

    #[error("Invalid {column} value {value:?}")]
    InvalidValue { column: &'static str, value: String },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// File-backed data store rooted at a data and an output directory
#[derive(Debug, Clone)]
pub struct DataStore {
    data_dir: PathBuf,
    output_dir: PathBuf,
}

impl DataStore {
    /// Open the store, creating both directories if needed
    pub fn open(data_dir: impl AsRef<Path>, output_dir: impl AsRef<Path>) -> StoreResult<Self> {
        let store = Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            output_dir: output_dir.as_ref().to_path_buf(),
        };
        ensure_dir(&store.data_dir)?;
        ensure_dir(&store.output_dir)?;
        debug!(
            data_dir = %store.data_dir.display(),
            output_dir = %store.output_dir.display(),
            "Data store opened"
        );
        Ok(store)
    }

    /// Directory holding cached candle files
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding analysis outputs
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

pub(crate) fn ensure_dir(path: &Path) -> StoreResult<()> {
    std::fs::create_dir_all(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}
