//! Connection, table and admin handles.
//!
//! A `Connection` is heavyweight and shared; `Table` and `Admin` handles are
//! lightweight, created per call and released by dropping them.

use std::sync::Arc;

use crate::config::Configuration;
use crate::error::StoreResult;
use crate::mutation::Put;
use crate::scan::{ResultScanner, Scan};

/// A live session to a cluster. Safe to share across threads.
pub trait Connection: Send + Sync {
    /// Handle for data operations on one table.
    fn table(&self, name: &str) -> StoreResult<Box<dyn Table>>;

    /// Handle for metadata operations.
    fn admin(&self) -> StoreResult<Box<dyn Admin>>;

    /// Close the session. Handles obtained earlier start failing.
    fn close(&self) -> StoreResult<()>;

    fn is_closed(&self) -> bool;
}

/// Data operations on one table.
pub trait Table: Send {
    fn name(&self) -> &str;

    /// Apply every Put as one batch.
    fn put(&self, puts: Vec<Put>) -> StoreResult<()>;

    /// Open a scanner; it stays valid after this handle is dropped.
    fn scanner(&self, scan: &Scan) -> StoreResult<Box<dyn ResultScanner>>;
}

/// Metadata operations.
pub trait Admin: Send {
    fn list_table_names(&self) -> StoreResult<Vec<String>>;

    fn table_exists(&self, name: &str) -> StoreResult<bool>;

    fn create_table(&self, descriptor: TableDescriptor) -> StoreResult<()>;
}

/// Opens connections from a resolved configuration.
pub trait ConnectionFactory: Send + Sync {
    fn connect(&self, conf: &Configuration) -> StoreResult<Arc<dyn Connection>>;
}

/// Column family settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyDescriptor {
    pub name: Vec<u8>,
    /// Versions retained per column; older ones are discarded on write
    pub max_versions: usize,
}

impl FamilyDescriptor {
    pub fn new(name: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            max_versions: 1,
        }
    }

    pub fn with_max_versions(mut self, max_versions: usize) -> Self {
        self.max_versions = max_versions.max(1);
        self
    }
}

/// Table name plus its column families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    pub name: String,
    pub families: Vec<FamilyDescriptor>,
}

impl TableDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            families: Vec::new(),
        }
    }

    pub fn with_family(mut self, family: FamilyDescriptor) -> Self {
        self.families.push(family);
        self
    }

    pub fn family(&self, name: &[u8]) -> Option<&FamilyDescriptor> {
        self.families.iter().find(|f| f.name == name)
    }
}
