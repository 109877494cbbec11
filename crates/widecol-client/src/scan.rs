//! Scan Executor: builds time-bounded scans and streams rows to a handler.
//!
//! Every execution opens its own table handle and scanner and releases both
//! on every exit path. Rows are fetched one at a time; a row is handed to the
//! handler before the next one is requested.

use widecol_core::{Connection, Filter, ResultScanner, RowResult, Scan, StoreResult, TimeRange};

use crate::cell::CellRecord;
use crate::error::{ClientError, ClientResult, HandlerError};

/// A family, or one column of a family, to restrict a scan to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSelector {
    pub family: String,
    /// `None` selects every qualifier of the family
    pub qualifier: Option<String>,
}

impl ColumnSelector {
    /// Select a whole family.
    pub fn family(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            qualifier: None,
        }
    }

    /// Select a single column.
    pub fn column(family: impl Into<String>, qualifier: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            qualifier: Some(qualifier.into()),
        }
    }
}

/// Receives scanned rows, one call per non-empty row, in scan order.
///
/// The cell records borrow store buffers and are only valid during the call.
pub trait ResultHandler {
    fn handle(&mut self, row: &[u8], cells: &[CellRecord<'_>]) -> Result<(), HandlerError>;
}

impl<F> ResultHandler for F
where
    F: FnMut(&[u8], &[CellRecord<'_>]) -> Result<(), HandlerError>,
{
    fn handle(&mut self, row: &[u8], cells: &[CellRecord<'_>]) -> Result<(), HandlerError> {
        self(row, cells)
    }
}

/// Pins a closure to the handler signature so its argument lifetimes infer.
pub fn handler_fn<F>(f: F) -> F
where
    F: FnMut(&[u8], &[CellRecord<'_>]) -> Result<(), HandlerError>,
{
    f
}

/// Scan over `[min_time, i64::MAX)` restricted to `columns`.
pub fn build_scan(columns: Option<&[ColumnSelector]>, filter: Option<Filter>, min_time: i64) -> Scan {
    let mut scan = Scan::new();
    scan.set_time_range(TimeRange::starting_at(min_time));
    for selector in columns.unwrap_or_default() {
        match &selector.qualifier {
            Some(qualifier) => scan.add_column(selector.family.as_str(), qualifier.as_str()),
            None => scan.add_family(selector.family.as_str()),
        };
    }
    if let Some(filter) = filter {
        scan.set_filter(filter);
    }
    scan
}

/// Counts reported once a scan completes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Rows handed to the handler
    pub rows: usize,
    pub cells: usize,
    /// Rows the store returned without any cell
    pub skipped: usize,
}

/// Closes the scanner when dropped.
struct ScannerGuard {
    scanner: Box<dyn ResultScanner>,
}

impl ScannerGuard {
    fn next_row(&mut self) -> StoreResult<Option<RowResult>> {
        self.scanner.next_row()
    }
}

impl Drop for ScannerGuard {
    fn drop(&mut self) {
        self.scanner.close();
    }
}

/// Run `scan` against `table` and feed each non-empty row to `handler`.
pub(crate) fn execute(
    connection: &dyn Connection,
    table: &str,
    scan: &Scan,
    handler: &mut dyn ResultHandler,
) -> ClientResult<ScanSummary> {
    let iteration_error = |source| ClientError::ScanIteration {
        table: table.to_string(),
        source,
    };

    let handle = connection.table(table).map_err(iteration_error)?;
    let mut scanner = ScannerGuard {
        scanner: handle.scanner(scan).map_err(iteration_error)?,
    };

    let mut summary = ScanSummary::default();
    while let Some(row) = scanner.next_row().map_err(iteration_error)? {
        if row.is_empty() {
            summary.skipped += 1;
            continue;
        }
        let records: Vec<CellRecord<'_>> = row.raw_cells().iter().map(CellRecord::from_cell).collect();
        handler
            .handle(row.row(), &records)
            .map_err(|source| ClientError::Handler {
                table: table.to_string(),
                source,
            })?;
        summary.rows += 1;
        summary.cells += records.len();
    }
    Ok(summary)
}
