//! Archive access error types
//!
//! Defines all errors that can occur while opening archive segments and
//! reading their tables.

use thiserror::Error;

/// Errors that can occur in the archive-access layer
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Compression or decompression failed
    #[error("Compression error: {0}")]
    Compression(String),

    /// Data corruption detected (checksum mismatch, truncated block, etc.)
    #[error("Corrupt data: {0}")]
    Corruption(String),

    /// Container format error (bad magic, unsupported version)
    #[error("Invalid archive format: {0}")]
    InvalidFormat(String),

    /// No container is registered under the requested location
    #[error("Archive not found: {0}")]
    NotFound(String),

    /// Row index past the end of a table
    #[error("Row {row} out of range for table '{table}' ({len} rows)")]
    RowOutOfRange { table: String, row: u64, len: u64 },
}

impl From<bincode::Error> for ArchiveError {
    fn from(err: bincode::Error) -> Self {
        ArchiveError::Serialization(err.to_string())
    }
}

/// Result type alias for archive operations
pub type ArchiveResult<T> = Result<T, ArchiveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ArchiveError::NotFound("run1.dqm".to_string());
        assert_eq!(err.to_string(), "Archive not found: run1.dqm");

        let err = ArchiveError::RowOutOfRange {
            table: "Ints".to_string(),
            row: 7,
            len: 3,
        };
        assert_eq!(
            err.to_string(),
            "Row 7 out of range for table 'Ints' (3 rows)"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let archive_err: ArchiveError = io_err.into();
        assert!(matches!(archive_err, ArchiveError::Io(_)));
    }
}
