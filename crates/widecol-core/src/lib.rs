//! Widecol Core — Wide-Column Store Client Model
//!
//! The data model and handle traits a wide-column store client works
//! against: cells, row mutations, scans with filters, and the
//! connection/table/admin handles that carry them to a cluster.
//!
//! # Architecture
//!
//! - **Cells**: `KeyValue` packs row, family, qualifier, value and tags into
//!   one contiguous buffer addressed by offset and length
//! - **Handles**: `Connection` is shared and heavyweight; `Table`, `Admin`
//!   and `ResultScanner` are per-call and released on drop
//! - **Backend**: `MemoryCluster` implements every handle in RAM
//!
//! # No Network Dependencies
//!
//! Nothing here speaks a wire protocol. A remote backend plugs in through
//! `ConnectionFactory`; the in-memory cluster ships with the crate.

pub mod cell;
pub mod config;
pub mod connection;
pub mod error;
pub mod filter;
pub mod memory;
pub mod mutation;
pub mod scan;

// Re-export key types for convenience
pub use cell::{CellType, KeyValue};
pub use config::Configuration;
pub use connection::{Admin, Connection, ConnectionFactory, FamilyDescriptor, Table, TableDescriptor};
pub use error::{FilterParseError, StoreError, StoreResult};
pub use filter::{CompareOp, Comparator, Filter, FilterParser, ParseFilter};
pub use memory::{BatchRecord, MemoryCluster, MemoryConnectionFactory};
pub use mutation::{ColumnValue, Put};
pub use scan::{FamilySelection, ResultScanner, RowResult, Scan, TimeRange};
