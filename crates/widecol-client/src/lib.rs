//! Widecol Client: pipeline-facing service over a wide-column store
//!
//! Lets a caller write batched records into, and incrementally scan, a
//! column-family store without managing the connection, merging row writes,
//! or decoding cells.
//!
//! # Architecture
//!
//! - **Connection Manager** (`ClientService::enable/disable`): one shared
//!   connection per enable cycle, checked live before use
//! - **Put Batcher** (`put`): one mutation per row, last write wins per column
//! - **Scan Executor** (`scan`): `[min_time, ∞)` scans with optional column
//!   restriction and filter, streamed row by row to a `ResultHandler`
//! - **Cell Adapter** (`CellRecord`): borrowed views into store buffers
//!
//! Re-scanning from the largest timestamp seen returns boundary rows again;
//! `IncrementalScanState` suppresses them on the caller side.

pub mod cell;
pub mod config;
pub mod error;
pub mod incremental;
mod observability;
pub mod put;
pub mod scan;
pub mod service;

// Re-export key types for convenience
pub use cell::{ByteView, CellRecord, OwnedCell};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult, HandlerError};
pub use incremental::{CellId, DedupHandler, IncrementalScanState, ScanProgress};
pub use put::{group_writes, WriteRequest};
pub use scan::{build_scan, handler_fn, ColumnSelector, ResultHandler, ScanSummary};
pub use service::{ClientService, ColumnStoreClient, ServiceState};
