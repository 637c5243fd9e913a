use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the study tracker.
///
/// Aggregation itself never fails; these cover loading, persisting and
/// configuration.
#[derive(Error, Debug)]
pub enum StudyError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// The configured session path does not exist.
    #[error("Session path not found: {0}")]
    SessionsNotFound(PathBuf),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the study crates.
pub type Result<T> = std::result::Result<T, StudyError>;
