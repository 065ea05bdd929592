//! Tables of encoded rows
//!
//! A table is the unit the archive layer hands out: a named, ordered list of
//! bincode-encoded rows with random access by row index.

use crate::archive::error::{ArchiveError, ArchiveResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A named table of encoded rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    key: String,
    rows: Vec<Vec<u8>>,
}

impl Table {
    /// Create an empty table
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            rows: Vec::new(),
        }
    }

    /// Build a table from already encoded rows
    pub fn from_rows(key: impl Into<String>, rows: Vec<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            rows,
        }
    }

    /// Encode and append a row
    pub fn push_row<T: Serialize>(&mut self, row: &T) -> ArchiveResult<u64> {
        self.rows.push(bincode::serialize(row)?);
        Ok(self.rows.len() as u64 - 1)
    }

    /// Builder variant of [`Table::push_row`]
    pub fn with_row<T: Serialize>(mut self, row: &T) -> ArchiveResult<Self> {
        self.push_row(row)?;
        Ok(self)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn len(&self) -> u64 {
        self.rows.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Encoded bytes of one row
    pub fn row(&self, index: u64) -> ArchiveResult<&[u8]> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.rows.get(i))
            .map(Vec::as_slice)
            .ok_or_else(|| ArchiveError::RowOutOfRange {
                table: self.key.clone(),
                row: index,
                len: self.len(),
            })
    }

    /// Decode one row
    pub fn decode<T: DeserializeOwned>(&self, index: u64) -> ArchiveResult<T> {
        let bytes = self.row(index)?;
        bincode::deserialize(bytes).map_err(|e| {
            ArchiveError::Serialization(format!(
                "table '{}' row {}: {}",
                self.key, index, e
            ))
        })
    }

    #[cfg(test)]
    pub(crate) fn rows(&self) -> &[Vec<u8>] {
        &self.rows
    }
}
