// ❗ Pipeline error taxonomy
// Row-level rejections never show up here: they are absorbed into the CleaningReport.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Input file missing, unreadable, or without a usable sheet/header. Fatal.
    #[error("source unreadable: {path}: {reason}")]
    SourceUnreadable { path: PathBuf, reason: String },

    /// Cleaning removed every row. Fatal at startup.
    #[error("no valid transactions left after cleaning ({initial_rows} rows read)")]
    EmptyResultSet { initial_rows: usize },

    /// Snapshot could not be written. The orchestrator logs it and keeps going.
    #[error("failed to write snapshot {path}: {reason}")]
    PersistenceFailure { path: PathBuf, reason: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn source_unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PipelineError::SourceUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        PipelineError::PersistenceFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Fatal errors abort startup; everything else is reported and survived.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PipelineError::PersistenceFailure { .. })
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
