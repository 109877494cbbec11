//! Caller-side bookkeeping for incremental scans.
//!
//! A scan's lower bound is inclusive, so starting the next scan at the
//! largest timestamp seen so far returns the cells carrying that timestamp a
//! second time. `IncrementalScanState` remembers those boundary cells by
//! (row, timestamp, sequence id) and `DedupHandler` drops them before they
//! reach the wrapped handler.
//!
//! ```ignore
//! let mut state = IncrementalScanState::new(0);
//! loop {
//!     let mut dedup = state.handler(&mut sink);
//!     client.scan("events", None, None, state.min_time(), &mut dedup)?;
//!     let progress = dedup.into_progress();
//!     state.commit(progress);
//! }
//! ```

use hashbrown::HashSet;

use crate::cell::CellRecord;
use crate::error::HandlerError;
use crate::scan::ResultHandler;

/// Identity of one cell version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellId {
    pub row: Vec<u8>,
    pub timestamp: i64,
    pub sequence_id: u64,
}

impl CellId {
    pub fn of(cell: &CellRecord<'_>) -> Self {
        Self {
            row: cell.row.to_vec(),
            timestamp: cell.timestamp,
            sequence_id: cell.sequence_id,
        }
    }
}

/// Where the next incremental scan starts and which cells it has seen there.
#[derive(Debug, Clone, Default)]
pub struct IncrementalScanState {
    min_time: i64,
    /// Cells already delivered whose timestamp equals `min_time`
    boundary: HashSet<CellId>,
}

impl IncrementalScanState {
    pub fn new(min_time: i64) -> Self {
        Self {
            min_time,
            boundary: HashSet::new(),
        }
    }

    /// Lower bound for the next scan.
    pub fn min_time(&self) -> i64 {
        self.min_time
    }

    pub fn has_seen(&self, id: &CellId) -> bool {
        self.boundary.contains(id)
    }

    pub fn boundary_len(&self) -> usize {
        self.boundary.len()
    }

    /// Wrap `inner` so that boundary cells from earlier scans are dropped.
    pub fn handler<'s, 'h>(&'s self, inner: &'h mut dyn ResultHandler) -> DedupHandler<'s, 'h> {
        DedupHandler {
            state: self,
            inner,
            progress: ScanProgress::default(),
        }
    }

    /// Advance past a completed scan.
    ///
    /// A newer maximum timestamp replaces the boundary; the same maximum
    /// adds to it. A scan that delivered nothing leaves the state unchanged.
    pub fn commit(&mut self, progress: ScanProgress) {
        let Some(max) = progress.max_timestamp else {
            return;
        };
        if max > self.min_time {
            self.min_time = max;
            self.boundary = progress.at_max;
        } else if max == self.min_time {
            self.boundary.extend(progress.at_max);
        }
    }
}

/// What one scan through a `DedupHandler` delivered.
#[derive(Debug, Clone, Default)]
pub struct ScanProgress {
    max_timestamp: Option<i64>,
    at_max: HashSet<CellId>,
    rows: usize,
    suppressed: usize,
}

impl ScanProgress {
    /// Largest timestamp among delivered cells
    pub fn max_timestamp(&self) -> Option<i64> {
        self.max_timestamp
    }

    /// Rows passed on to the wrapped handler
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Boundary cells dropped as already seen
    pub fn suppressed(&self) -> usize {
        self.suppressed
    }

    fn record(&mut self, cell: &CellRecord<'_>) {
        match self.max_timestamp {
            Some(max) if cell.timestamp < max => {}
            Some(max) if cell.timestamp == max => {
                self.at_max.insert(CellId::of(cell));
            }
            _ => {
                self.max_timestamp = Some(cell.timestamp);
                self.at_max.clear();
                self.at_max.insert(CellId::of(cell));
            }
        }
    }
}

/// Handler that filters already-seen boundary cells, then delegates.
pub struct DedupHandler<'s, 'h> {
    state: &'s IncrementalScanState,
    inner: &'h mut dyn ResultHandler,
    progress: ScanProgress,
}

impl DedupHandler<'_, '_> {
    pub fn progress(&self) -> &ScanProgress {
        &self.progress
    }

    pub fn into_progress(self) -> ScanProgress {
        self.progress
    }
}

impl ResultHandler for DedupHandler<'_, '_> {
    fn handle(&mut self, row: &[u8], cells: &[CellRecord<'_>]) -> Result<(), HandlerError> {
        let fresh: Vec<CellRecord<'_>> = if self.state.boundary.is_empty() {
            cells.to_vec()
        } else {
            cells
                .iter()
                .filter(|cell| cell.timestamp != self.state.min_time || !self.state.has_seen(&CellId::of(cell)))
                .copied()
                .collect()
        };
        self.progress.suppressed += cells.len() - fresh.len();
        if fresh.is_empty() {
            return Ok(());
        }

        self.inner.handle(row, &fresh)?;
        for cell in &fresh {
            self.progress.record(cell);
        }
        self.progress.rows += 1;
        Ok(())
    }
}
