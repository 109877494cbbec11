//! Cell Adapter: borrowed views over store cells.
//!
//! A `CellRecord` points into the buffer of the cell it was built from:
//! every variable-length field is a `ByteView` (backing array, offset,
//! length) and nothing is copied. Records handed to a result handler are
//! valid only for that handler call; use `to_owned_cell` to keep one.

use widecol_core::KeyValue;

/// A window of `length` bytes at `offset` inside `array`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ByteView<'a> {
    array: &'a [u8],
    offset: usize,
    length: usize,
}

impl<'a> ByteView<'a> {
    /// Returns `None` when the window falls outside `array`.
    pub fn new(array: &'a [u8], offset: usize, length: usize) -> Option<Self> {
        let end = offset.checked_add(length)?;
        (end <= array.len()).then_some(Self { array, offset, length })
    }

    /// The whole backing array, not just this view.
    pub fn array(&self) -> &'a [u8] {
        self.array
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn as_slice(&self) -> &'a [u8] {
        &self.array[self.offset..self.offset + self.length]
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

impl std::fmt::Debug for ByteView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}@{}+{}", String::from_utf8_lossy(self.as_slice()), self.offset, self.length)
    }
}

/// One cell of a scanned row, as handed to a result handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRecord<'a> {
    pub row: ByteView<'a>,
    pub family: ByteView<'a>,
    pub qualifier: ByteView<'a>,
    pub value: ByteView<'a>,
    pub tags: ByteView<'a>,
    pub timestamp: i64,
    pub type_byte: u8,
    pub sequence_id: u64,
}

impl<'a> CellRecord<'a> {
    /// View a store cell without copying any of its bytes.
    pub fn from_cell(cell: &'a KeyValue) -> Self {
        let array = cell.buffer();
        // offsets come from the cell's own header, so they are in bounds
        let view = |offset: usize, length: usize| ByteView { array, offset, length };
        Self {
            row: view(cell.row_offset(), cell.row_length()),
            family: view(cell.family_offset(), cell.family_length()),
            qualifier: view(cell.qualifier_offset(), cell.qualifier_length()),
            value: view(cell.value_offset(), cell.value_length()),
            tags: view(cell.tags_offset(), cell.tags_length()),
            timestamp: cell.timestamp(),
            type_byte: cell.type_byte(),
            sequence_id: cell.sequence_id(),
        }
    }

    /// Copy every field out of the store buffer.
    pub fn to_owned_cell(&self) -> OwnedCell {
        OwnedCell {
            row: self.row.to_vec(),
            family: self.family.to_vec(),
            qualifier: self.qualifier.to_vec(),
            value: self.value.to_vec(),
            tags: self.tags.to_vec(),
            timestamp: self.timestamp,
            type_byte: self.type_byte,
            sequence_id: self.sequence_id,
        }
    }
}

/// A `CellRecord` copied out of the store buffer, free to outlive the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedCell {
    pub row: Vec<u8>,
    pub family: Vec<u8>,
    pub qualifier: Vec<u8>,
    pub value: Vec<u8>,
    pub tags: Vec<u8>,
    pub timestamp: i64,
    pub type_byte: u8,
    pub sequence_id: u64,
}
