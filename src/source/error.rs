//! Replay engine error types

use crate::archive::ArchiveError;
use thiserror::Error;

/// Errors that abort the current archive-reading operation
#[derive(Error, Debug)]
pub enum SourceError {
    /// Table access failed inside an open segment
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// The segment itself could not be opened
    #[error("Failed to open archive segment '{location}': {source}")]
    Open {
        location: String,
        #[source]
        source: ArchiveError,
    },

    #[error("Archive segment '{0}' has no index table")]
    MissingIndexTable(String),

    /// A type referenced by the index has no data table
    #[error("Archive segment '{location}' has no '{table}' table")]
    MissingDataTable { location: String, table: String },

    #[error("Index row {row} has unknown element type {type_index}")]
    UnknownType { row: u64, type_index: u32 },

    #[error("Index row {row} has an inverted row range {first}..={last}")]
    InvalidRange { row: u64, first: u64, last: u64 },

    /// A histogram row whose shape or cell vectors do not fit its kind
    #[error("Row {row} of table '{table}' holds a malformed histogram '{name}'")]
    MalformedHistogram { table: String, row: u64, name: String },

    #[error("No archive segment with index {0}")]
    NoSuchSegment(usize),

    /// The driver called an operation the current state does not allow
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Result type alias for replay operations
pub type SourceResult<T> = Result<T, SourceError>;
