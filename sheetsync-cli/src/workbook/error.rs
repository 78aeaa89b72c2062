//! Errors raised by the workbook core

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkbookError>;

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("The workbook path does not exist: {}", .0.display())]
    InvalidPath(PathBuf),

    #[error("Failed to read workbook {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("A sheet with the name '{0}' already exists in the workbook")]
    DuplicateSheet(String),

    #[error("The sheet '{0}' does not exist in the workbook")]
    UnknownSheet(String),

    #[error(
        "Row {row} or column {col} is out of bounds for sheet '{sheet}' ({rows} rows x {cols} columns)"
    )]
    OutOfBounds {
        sheet: String,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Invalid column names in conditions for sheet '{sheet}': {}", columns.join(", "))]
    InvalidColumn { sheet: String, columns: Vec<String> },

    #[error("Change log {} is corrupt: {source}", path.display())]
    CorruptLog {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Error occurred while saving workbook data to {}: {source}", path.display())]
    SaveFailed {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl WorkbookError {
    pub(crate) fn save_failed(
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        WorkbookError::SaveFailed {
            path: path.into(),
            source: source.into(),
        }
    }
}
