//! Row mutations.

/// One column write inside a `Put`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnValue {
    pub family: Vec<u8>,
    pub qualifier: Vec<u8>,
    /// Explicit cell timestamp; the store assigns one when `None`
    pub timestamp: Option<i64>,
    pub value: Vec<u8>,
    pub tags: Vec<u8>,
}

/// Writes to any number of columns of a single row.
///
/// Columns are kept in the order they were added. Two writes to the same
/// column in one `Put` are both submitted; the store keeps the later one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Put {
    row: Vec<u8>,
    columns: Vec<ColumnValue>,
}

impl Put {
    pub fn new(row: impl Into<Vec<u8>>) -> Self {
        Self {
            row: row.into(),
            columns: Vec::new(),
        }
    }

    /// Add a column write stamped by the store.
    pub fn add_column(
        &mut self,
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> &mut Self {
        self.push(family.into(), qualifier.into(), None, value.into(), Vec::new())
    }

    /// Add a column write with an explicit timestamp.
    pub fn add_column_at(
        &mut self,
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        timestamp: i64,
        value: impl Into<Vec<u8>>,
    ) -> &mut Self {
        self.push(family.into(), qualifier.into(), Some(timestamp), value.into(), Vec::new())
    }

    /// Add a column write carrying an encoded tags block.
    pub fn add_tagged_column(
        &mut self,
        family: impl Into<Vec<u8>>,
        qualifier: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
        tags: impl Into<Vec<u8>>,
    ) -> &mut Self {
        self.push(family.into(), qualifier.into(), None, value.into(), tags.into())
    }

    fn push(
        &mut self,
        family: Vec<u8>,
        qualifier: Vec<u8>,
        timestamp: Option<i64>,
        value: Vec<u8>,
        tags: Vec<u8>,
    ) -> &mut Self {
        self.columns.push(ColumnValue { family, qualifier, timestamp, value, tags });
        self
    }

    pub fn row(&self) -> &[u8] {
        &self.row
    }

    pub fn columns(&self) -> &[ColumnValue] {
        &self.columns
    }

    /// Mutable access to the column list, for callers merging writes in place.
    pub fn columns_mut(&mut self) -> &mut Vec<ColumnValue> {
        &mut self.columns
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }
}
