use llm::LlmError;
use std::path::PathBuf;
use thiserror::Error;

/// Record store failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("No table contains column '{0}'")]
    NoLabelTable(String),

    #[error("Table '{table}' has no column '{column}'")]
    MissingColumn { table: String, column: String },

    #[error("Invalid SQL identifier: '{0}'")]
    InvalidIdentifier(String),

    /// A label write touched no row; the batch is rolled back
    #[error("No record with identifier '{0}'")]
    MissingIdentifier(String),
}

/// Rejection of a model response for a whole batch
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Output mismatch: expected {expected} lines, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Identifier mismatch on line {position}: expected '{expected}', got '{actual}'")]
    IdentifierMismatch {
        position: usize,
        expected: String,
        actual: String,
    },

    #[error("Invalid probability '{0}'")]
    InvalidProbability(String),
}

/// Failures while reading the phrase/definition file
#[derive(Error, Debug)]
pub enum TaskFileError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("No phrase/definition rows found in {}", .0.display())]
    Empty(PathBuf),
}

/// Anything that makes a single batch fail; caught at the batch boundary
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Annotator error: {0}")]
    Annotator(#[from] LlmError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Missing API key: set GEMINI_API_KEY or GOOGLE_API_KEY")]
    MissingApiKey,

    #[error("Failed to build annotator: {0}")]
    Annotator(#[from] LlmError),
}
