//! # DQM Archive
//!
//! Replay engine for monitoring-data archives. An archive segment holds
//! histograms, profiles and scalar monitor elements for one or more runs and
//! luminosity blocks ("lumis"), possibly produced by merging several inputs
//! so that the same element occurs more than once. Replaying walks the
//! segments in order, announces every run and lumi boundary to a driver and
//! folds element contributions into a store when their run or lumi ends.
//!
//! ## Modules
//!
//! - [`archive`]: segment containers, tables and the on-disk file format
//! - [`element`]: monitor elements, histograms, merge rules and the store
//! - [`source`]: index normalization and the boundary state machine
//! - [`driver`]: a framework-style driver recording every transition
//! - [`config`]: file and environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dqm_archive::archive::FileOpener;
//! use dqm_archive::driver::Replay;
//! use dqm_archive::element::{DqmStore, ElementStore};
//! use dqm_archive::source::DqmArchiveSource;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let files = vec!["run1_part1.dqm".to_string(), "run1_part2.dqm".to_string()];
//!     let mut source = DqmArchiveSource::new(files, FileOpener);
//!     let mut store = DqmStore::new();
//!
//!     let mut replay = Replay::new();
//!     replay.run(&mut source, &mut store)?;
//!
//!     if let Some(events) = store.get("Tracker/EventInfo/processedEvents") {
//!         println!("processed events: {:?}", events.int_value());
//!     }
//!     println!("{}", source.stats());
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod config;
pub mod driver;
pub mod element;
pub mod source;

// Re-export top-level types for convenience
pub use archive::{ArchiveError, ArchiveResult, Container, FileOpener, MemoryOpener, SegmentOpener, Table};

pub use element::{
    DqmStore, ElementStore, Histogram, MergeError, MergeOutcome, MonitorElement, Payload, TypeTag,
};

pub use source::{
    DqmArchiveSource, IndexRecord, ItemType, LumiId, RunId, SegmentInfo, SourceError, SourceResult,
    SourceStats, TraversalOrder,
};

pub use driver::{Replay, Transition};

pub use config::{Config, ConfigError, LoggingConfig, SourceConfig};
