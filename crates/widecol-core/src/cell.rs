//! Native cell layout
//!
//! Every cell is one contiguous buffer. Readers address each field by
//! (buffer, offset, length) instead of copying it out:
//!
//! ```text
//!   [0..4]   key_length:   u32 BE - bytes from row_length through type
//!   [4..8]   value_length: u32 BE
//!   key:
//!     row_length:   u16 BE
//!     row:          [u8; row_length]
//!     family_len:   u8
//!     family:       [u8; family_len]
//!     qualifier:    [u8; key_length - fixed - row_length - family_len]
//!     timestamp:    i64 BE
//!     type:         u8
//!   value:          [u8; value_length]
//!   tags_length:    u16 BE
//!   tags:           [u8; tags_length]
//! ```
//!
//! The sequence id is assigned by the store when the cell is applied and
//! travels beside the buffer, not inside it.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{StoreError, StoreResult};

/// Largest encodable row key
pub const MAX_ROW_LENGTH: usize = u16::MAX as usize;
/// Largest encodable family name
pub const MAX_FAMILY_LENGTH: usize = u8::MAX as usize;
/// Largest encodable tags block
pub const MAX_TAGS_LENGTH: usize = u16::MAX as usize;

/// key_length + value_length prefix
const LENGTHS_SIZE: usize = 8;
const ROW_LENGTH_SIZE: usize = 2;
const FAMILY_LENGTH_SIZE: usize = 1;
const TIMESTAMP_SIZE: usize = 8;
const TYPE_SIZE: usize = 1;
const TAGS_LENGTH_SIZE: usize = 2;
/// Key bytes present regardless of field contents
const KEY_FIXED_SIZE: usize = ROW_LENGTH_SIZE + FAMILY_LENGTH_SIZE + TIMESTAMP_SIZE + TYPE_SIZE;

/// Cell type markers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CellType {
    /// Value written for one column version
    Put = 4,
    /// Marks one version of a column deleted
    Delete = 8,
    /// Marks all versions of a column deleted
    DeleteColumn = 12,
    /// Marks all columns of a family deleted
    DeleteFamily = 14,
}

impl CellType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            4 => Some(CellType::Put),
            8 => Some(CellType::Delete),
            12 => Some(CellType::DeleteColumn),
            14 => Some(CellType::DeleteFamily),
            _ => None,
        }
    }
}

/// One timestamped column value in the store's native layout.
///
/// Cloning is cheap: clones share the underlying buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyValue {
    buffer: Bytes,
    sequence_id: u64,
}

impl KeyValue {
    /// Encode a cell into a fresh buffer.
    ///
    /// Sizes are validated before anything is allocated.
    pub fn new(
        row: &[u8],
        family: &[u8],
        qualifier: &[u8],
        timestamp: i64,
        cell_type: CellType,
        value: &[u8],
        tags: &[u8],
    ) -> StoreResult<Self> {
        check_size("row", row.len(), MAX_ROW_LENGTH)?;
        check_size("family", family.len(), MAX_FAMILY_LENGTH)?;
        check_size("tags", tags.len(), MAX_TAGS_LENGTH)?;
        let key_length = KEY_FIXED_SIZE + row.len() + family.len() + qualifier.len();
        check_size("key", key_length, u32::MAX as usize)?;
        check_size("value", value.len(), u32::MAX as usize)?;

        let total = LENGTHS_SIZE + key_length + value.len() + TAGS_LENGTH_SIZE + tags.len();
        let mut buf = BytesMut::with_capacity(total);
        buf.put_u32(key_length as u32);
        buf.put_u32(value.len() as u32);
        buf.put_u16(row.len() as u16);
        buf.put_slice(row);
        buf.put_u8(family.len() as u8);
        buf.put_slice(family);
        buf.put_slice(qualifier);
        buf.put_i64(timestamp);
        buf.put_u8(cell_type as u8);
        buf.put_slice(value);
        buf.put_u16(tags.len() as u16);
        buf.put_slice(tags);

        Ok(Self {
            buffer: buf.freeze(),
            sequence_id: 0,
        })
    }

    /// Same cell, stamped with the sequence id the store applied it under.
    pub fn with_sequence_id(mut self, sequence_id: u64) -> Self {
        self.sequence_id = sequence_id;
        self
    }

    /// Copy of this cell with an empty value.
    pub fn without_value(&self) -> Self {
        let stripped = KeyValue::new(
            self.row(),
            self.family(),
            self.qualifier(),
            self.timestamp(),
            self.cell_type().unwrap_or(CellType::Put),
            &[],
            self.tags(),
        );
        match stripped {
            Ok(kv) => kv.with_sequence_id(self.sequence_id),
            // Every field already fit in this cell's own layout.
            Err(_) => self.clone(),
        }
    }

    /// The whole backing buffer every offset below indexes into.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    fn key_length(&self) -> usize {
        read_u32(&self.buffer, 0) as usize
    }

    pub fn row_offset(&self) -> usize {
        LENGTHS_SIZE + ROW_LENGTH_SIZE
    }

    pub fn row_length(&self) -> usize {
        read_u16(&self.buffer, LENGTHS_SIZE) as usize
    }

    pub fn family_offset(&self) -> usize {
        self.row_offset() + self.row_length() + FAMILY_LENGTH_SIZE
    }

    pub fn family_length(&self) -> usize {
        self.buffer[self.row_offset() + self.row_length()] as usize
    }

    pub fn qualifier_offset(&self) -> usize {
        self.family_offset() + self.family_length()
    }

    pub fn qualifier_length(&self) -> usize {
        self.key_length() - KEY_FIXED_SIZE - self.row_length() - self.family_length()
    }

    pub fn timestamp(&self) -> i64 {
        let at = LENGTHS_SIZE + self.key_length() - TYPE_SIZE - TIMESTAMP_SIZE;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.buffer[at..at + TIMESTAMP_SIZE]);
        i64::from_be_bytes(raw)
    }

    pub fn type_byte(&self) -> u8 {
        self.buffer[LENGTHS_SIZE + self.key_length() - TYPE_SIZE]
    }

    pub fn cell_type(&self) -> Option<CellType> {
        CellType::from_byte(self.type_byte())
    }

    pub fn sequence_id(&self) -> u64 {
        self.sequence_id
    }

    pub fn value_offset(&self) -> usize {
        LENGTHS_SIZE + self.key_length()
    }

    pub fn value_length(&self) -> usize {
        read_u32(&self.buffer, 4) as usize
    }

    pub fn tags_offset(&self) -> usize {
        self.value_offset() + self.value_length() + TAGS_LENGTH_SIZE
    }

    pub fn tags_length(&self) -> usize {
        read_u16(&self.buffer, self.value_offset() + self.value_length()) as usize
    }

    pub fn row(&self) -> &[u8] {
        self.slice(self.row_offset(), self.row_length())
    }

    pub fn family(&self) -> &[u8] {
        self.slice(self.family_offset(), self.family_length())
    }

    pub fn qualifier(&self) -> &[u8] {
        self.slice(self.qualifier_offset(), self.qualifier_length())
    }

    pub fn value(&self) -> &[u8] {
        self.slice(self.value_offset(), self.value_length())
    }

    pub fn tags(&self) -> &[u8] {
        self.slice(self.tags_offset(), self.tags_length())
    }

    fn slice(&self, offset: usize, length: usize) -> &[u8] {
        &self.buffer[offset..offset + length]
    }
}

impl fmt::Debug for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyValue")
            .field("row", &String::from_utf8_lossy(self.row()))
            .field("family", &String::from_utf8_lossy(self.family()))
            .field("qualifier", &String::from_utf8_lossy(self.qualifier()))
            .field("timestamp", &self.timestamp())
            .field("type", &self.type_byte())
            .field("sequence_id", &self.sequence_id)
            .field("value_length", &self.value_length())
            .finish()
    }
}

fn check_size(field: &'static str, size: usize, max: usize) -> StoreResult<()> {
    if size > max {
        return Err(StoreError::OversizedField { field, size, max });
    }
    Ok(())
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([buf[at], buf[at + 1]])
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}
