//! Scan descriptions, row results and the scanner trait.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::cell::KeyValue;
use crate::error::StoreResult;
use crate::filter::Filter;

/// Half-open timestamp interval `[min, max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    min: i64,
    max: i64,
}

impl TimeRange {
    /// Every timestamp below `i64::MAX`, negative ones included.
    pub fn all() -> Self {
        Self { min: i64::MIN, max: i64::MAX }
    }

    /// `[min, i64::MAX)`; `min` is inclusive.
    pub fn starting_at(min: i64) -> Self {
        Self { min, max: i64::MAX }
    }

    /// `[min, max)`. Returns `None` when `max < min`.
    pub fn between(min: i64, max: i64) -> Option<Self> {
        (min <= max).then_some(Self { min, max })
    }

    pub fn min(&self) -> i64 {
        self.min
    }

    pub fn max(&self) -> i64 {
        self.max
    }

    pub fn contains(&self, timestamp: i64) -> bool {
        timestamp >= self.min && timestamp < self.max
    }
}

impl Default for TimeRange {
    fn default() -> Self { Self::all() }
}

/// Which columns of a family a scan returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FamilySelection {
    /// Every qualifier in the family
    All,
    /// Only the listed qualifiers
    Columns(BTreeSet<Vec<u8>>),
}

/// A scan over a whole table.
///
/// Without any family restriction every family is returned. The store
/// returns the newest version of each column inside the time range.
#[derive(Debug, Clone, Default)]
pub struct Scan {
    time_range: TimeRange,
    families: BTreeMap<Vec<u8>, FamilySelection>,
    filter: Option<Filter>,
}

impl Scan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_time_range(&mut self, range: TimeRange) -> &mut Self {
        self.time_range = range;
        self
    }

    /// Select a whole family. Overrides earlier column picks in that family.
    pub fn add_family(&mut self, family: impl Into<Vec<u8>>) -> &mut Self {
        self.families.insert(family.into(), FamilySelection::All);
        self
    }

    /// Select one column. A whole-family selection of the same family is
    /// narrowed to this column.
    pub fn add_column(&mut self, family: impl Into<Vec<u8>>, qualifier: impl Into<Vec<u8>>) -> &mut Self {
        let selection = self
            .families
            .entry(family.into())
            .or_insert_with(|| FamilySelection::Columns(BTreeSet::new()));
        match selection {
            FamilySelection::Columns(qualifiers) => {
                qualifiers.insert(qualifier.into());
            }
            FamilySelection::All => {
                *selection = FamilySelection::Columns(BTreeSet::from([qualifier.into()]));
            }
        }
        self
    }

    pub fn set_filter(&mut self, filter: Filter) -> &mut Self {
        self.filter = Some(filter);
        self
    }

    pub fn time_range(&self) -> TimeRange {
        self.time_range
    }

    pub fn families(&self) -> &BTreeMap<Vec<u8>, FamilySelection> {
        &self.families
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// Whether the family/column restriction admits this column.
    pub fn selects(&self, family: &[u8], qualifier: &[u8]) -> bool {
        if self.families.is_empty() {
            return true;
        }
        match self.families.get(family) {
            Some(FamilySelection::All) => true,
            Some(FamilySelection::Columns(qualifiers)) => qualifiers.contains(qualifier),
            None => false,
        }
    }
}

/// One row returned by a scanner: its key and cells ordered by family,
/// then qualifier.
#[derive(Debug, Clone)]
pub struct RowResult {
    row: Vec<u8>,
    cells: Vec<KeyValue>,
}

impl RowResult {
    pub fn new(row: Vec<u8>, cells: Vec<KeyValue>) -> Self {
        Self { row, cells }
    }

    pub fn row(&self) -> &[u8] {
        &self.row
    }

    pub fn raw_cells(&self) -> &[KeyValue] {
        &self.cells
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Row-at-a-time cursor over scan results.
///
/// Dropping a scanner releases it; `close` does the same earlier.
pub trait ResultScanner: Send {
    /// Fetch the next row, or `None` once the scan is exhausted.
    fn next_row(&mut self) -> StoreResult<Option<RowResult>>;

    /// Release server-side resources. Further `next_row` calls return `None`.
    fn close(&mut self);
}
