//! Error types for client-service operations
//!
//! Every public entry point returns `ClientResult`. Store failures are kept
//! as the `source` of the variant naming the step that failed.

use thiserror::Error;
use widecol_core::{FilterParseError, StoreError};

/// Error a result handler may return to abort a scan
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Client-service error types with detailed context
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration rejected before any connection attempt
    #[error("invalid client configuration: {0}")]
    ConfigValidation(String),

    /// Enable could not build a configuration, connect, or confirm liveness
    #[error("could not establish store connection: {source}")]
    Connection {
        #[source]
        source: StoreError,
    },

    /// Lifecycle call made from the wrong state
    #[error("cannot {operation} while service is {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// Data call made without a live connection
    #[error("service is not enabled")]
    NotEnabled,

    /// Filter expression rejected; no scan was issued
    #[error("malformed filter expression {expression:?}: {source}")]
    FilterParse {
        expression: String,
        #[source]
        source: FilterParseError,
    },

    /// Batch submission failed; no row of the batch is reported as applied
    #[error("write of {rows} row(s) to table {table} failed: {source}")]
    Write {
        table: String,
        rows: usize,
        #[source]
        source: StoreError,
    },

    /// Opening the scanner or fetching a row failed
    #[error("scan of table {table} failed: {source}")]
    ScanIteration {
        table: String,
        #[source]
        source: StoreError,
    },

    /// The result handler aborted the scan
    #[error("result handler aborted scan of table {table}: {source}")]
    Handler {
        table: String,
        #[source]
        source: HandlerError,
    },
}

/// Result type alias for client-service operations
pub type ClientResult<T> = Result<T, ClientError>;
