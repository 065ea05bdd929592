//! Archive access layer
//!
//! An archive segment is one container holding an index table and a set of
//! typed data tables. This module provides:
//!
//! - **table**: named tables of encoded rows with random access by index
//! - **file**: the on-disk container format (header, compressed tables, footer)
//! - **memory**: in-memory containers for embedding and tests
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! SegmentOpener::open(location) → Box<dyn Container>
//!        ↓
//! Container::table("Indices") → Table → decode rows
//! Container::table("TH1Fs")   → Table → decode rows on demand
//! ```

pub mod error;
pub mod file;
pub mod memory;
pub mod table;

pub use error::{ArchiveError, ArchiveResult};
pub use file::{ArchiveFile, ArchiveHeader, FileOpener, TableMeta};
pub use memory::{MemoryContainer, MemoryOpener};
pub use table::Table;

/// Key of the index table present in every archive segment
pub const INDICES_TABLE: &str = "Indices";

/// An opened archive segment
pub trait Container {
    /// Where this container was opened from (path or registry key)
    fn location(&self) -> &str;

    /// Locate a table by key
    ///
    /// Returns `Ok(None)` when the container has no such table; an error
    /// means the table exists but could not be read.
    fn table(&mut self, key: &str) -> ArchiveResult<Option<Table>>;
}

/// Opens archive segments by location
pub trait SegmentOpener {
    fn open(&self, location: &str) -> ArchiveResult<Box<dyn Container>>;
}
