//! Error types for store-client operations
//!
//! All store errors are represented by the StoreError enum. Filter grammar
//! errors have their own type because they are raised before any store call.

use std::path::PathBuf;

use thiserror::Error;

/// Store-client error types with detailed context
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// I/O operation failed
    #[error("I/O error: {message} ({kind})")]
    Io {
        /// The underlying I/O error kind
        kind: std::io::ErrorKind,
        /// Human-readable description
        message: String,
    },

    /// A configuration resource could not be read or parsed
    #[error("configuration resource {}: {reason}", path.display())]
    Resource {
        /// Resource file location
        path: PathBuf,
        /// Why loading failed
        reason: String,
    },

    /// A configuration value is missing or malformed
    #[error("invalid configuration value for `{key}`: {reason}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Why the value was rejected
        reason: String,
    },

    /// No cluster answered at the configured coordinates
    #[error("cluster unreachable at quorum `{quorum}` port {port} parent `{parent}`")]
    Unreachable {
        quorum: String,
        port: u16,
        parent: String,
    },

    /// The connection was closed before the call
    #[error("connection is closed")]
    ConnectionClosed,

    #[error("table `{0}` does not exist")]
    TableNotFound(String),

    #[error("table `{0}` already exists")]
    TableExists(String),

    /// A write or scan named a family the table does not declare
    #[error("column family `{family}` does not exist in table `{table}`")]
    NoSuchColumnFamily {
        table: String,
        family: String,
    },

    /// A cell field exceeds what the cell layout can encode
    #[error("cell {field} too large: {size} bytes exceeds limit of {max} bytes")]
    OversizedField {
        field: &'static str,
        size: usize,
        max: usize,
    },

    /// Every attempt allowed by the retry setting failed
    #[error("operation failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<StoreError>,
    },
}

/// Convert std::io::Error to StoreError::Io
impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for store-client operations
pub type StoreResult<T> = Result<T, StoreError>;

/// A filter expression could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("filter syntax error at byte {position}: {message}")]
pub struct FilterParseError {
    /// Byte offset into the expression where parsing failed
    pub position: usize,
    pub message: String,
}

impl FilterParseError {
    pub(crate) fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}
