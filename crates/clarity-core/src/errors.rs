//! Error types for the Clarity core library.

/// Top-level error enum for the Clarity core library.
///
/// These are infrastructure errors. A failed import session is reported
/// through [`crate::importer::ImportFailure`] instead, so that one bad file
/// never surfaces as an error from the importer itself.
#[derive(Debug, thiserror::Error)]
pub enum ClarityError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Another model import is already in progress")]
    Busy,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ClarityResult<T> = Result<T, ClarityError>;
