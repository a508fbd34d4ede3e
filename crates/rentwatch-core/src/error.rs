//! Core error types.

use thiserror::Error;

/// Errors surfaced by the listings store.
#[derive(Debug, Error)]
pub enum Error {
    /// A single-record create collided with an existing unique-key value.
    #[error("record with {column}={value} already exists")]
    DuplicateKey {
        /// Name of the unique-key column.
        column: String,
        /// The colliding key value, rendered as text.
        value: String,
    },

    /// A batch create found duplicates and skipping was not requested.
    #[error("found {count} duplicate records with keys: {sample:?}")]
    DuplicateBatch {
        /// Total number of duplicates in the batch.
        count: usize,
        /// The first few duplicate keys.
        sample: Vec<String>,
    },

    /// A single-record update targeted a key that is not in the store.
    #[error("record with {column}={value} not found")]
    NotFound {
        /// Name of the unique-key column.
        column: String,
        /// The missing key value, rendered as text.
        value: String,
    },

    /// A filter expression could not be parsed.
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// Snapshot content could not be interpreted.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Filesystem error while loading or saving a snapshot.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Parquet encoding or decoding error.
    #[error("parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow array construction error.
    #[error("arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// CSV encoding or decoding error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, Error>;
