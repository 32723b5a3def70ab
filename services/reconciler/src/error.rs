//! Error types for the reconciliation engine

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A required remote file could not be retrieved
    #[error("Fetch error: {0}")]
    Fetch(#[from] collector::FetchError),

    /// A daily file does not carry the column set declared for its schema version
    #[error("Schema mismatch in version {version} ({file}): expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        version: String,
        file: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reconciliation tables are internally inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// A cell that must be present could not be interpreted
    #[error("Parse error in {file} line {line}: {message}")]
    Parse {
        file: String,
        line: usize,
        message: String,
    },
}
