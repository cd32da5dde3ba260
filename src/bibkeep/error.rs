use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BibError {
    #[error("No file selected")]
    NoFileSelected,

    #[error("Failed to read {}: {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No entries found in {}", .0.display())]
    NoEntriesFound(PathBuf),

    #[error("No valid BibTeX entry found")]
    InvalidRecord,

    #[error("Entry not found: {0}")]
    KeywordNotFound(String),

    #[error("Nothing left to undo")]
    NoUndoAvailable,

    #[error("Nothing left to redo")]
    NoRedoAvailable,

    #[error("Directory scan cancelled")]
    DirectoryScanCancelled,

    #[error("Not in the directory list: {0}")]
    NotInDirectoryList(String),

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Worker(String),
}

impl BibError {
    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BibError::FileRead {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BibError::FileWrite {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BibError>;
