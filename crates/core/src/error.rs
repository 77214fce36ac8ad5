//! Error types for the Le Mans results dashboard.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the dashboard core.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data error (invalid or missing data).
    #[error("Data error: {0}")]
    Data(String),

    /// Insufficient data for computation.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// A required column is absent from the source header.
    #[error("Missing required column: {0}")]
    MissingColumn(String),

    /// A row whose field count does not match the header.
    #[error("Malformed row at line {line}: expected {expected} fields, found {found}")]
    MalformedRow {
        line: u64,
        expected: usize,
        found: usize,
    },

    /// CSV decoding error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create an insufficient data error.
    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Error::InsufficientData(msg.into())
    }

    /// Create a missing column error.
    pub fn missing_column(name: impl Into<String>) -> Self {
        Error::MissingColumn(name.into())
    }

    /// Whether this error aborts a load (as opposed to a caller mistake).
    pub fn is_load_error(&self) -> bool {
        matches!(
            self,
            Error::MissingColumn(_)
                | Error::MalformedRow { .. }
                | Error::InsufficientData(_)
                | Error::Csv(_)
                | Error::Io(_)
        )
    }
}
