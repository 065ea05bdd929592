//! Archive replay
//!
//! - **index**: index records and their group-contiguous traversal order
//! - **reader**: per-kind row decoding and application to the store
//! - **engine**: the segment/run/lumi state machine and data materialization
//! - **types**: item, run and lumi identities exchanged with the driver
//! - **error**: Error types

pub mod engine;
pub mod error;
pub mod index;
pub mod reader;
pub mod types;

pub use engine::DqmArchiveSource;
pub use error::{SourceError, SourceResult};
pub use index::{IndexRecord, IndexRow, Position, TraversalOrder};
pub use reader::{Applied, ApplyOutcome, ElementRow, RecordReader};
pub use types::{ItemType, LumiId, RunId, SegmentInfo, SourceStats};
