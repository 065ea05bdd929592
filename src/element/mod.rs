//! Monitor elements
//!
//! - **kind**: element type tags and their table keys
//! - **histogram**: binned payloads (histograms and profiles)
//! - **types**: `Payload` and `MonitorElement`
//! - **merge**: how duplicate contributions combine
//! - **store**: the element store interface and an in-memory store

pub mod histogram;
pub mod kind;
pub mod merge;
pub mod store;
pub mod types;

pub use histogram::{Axis, Histogram};
pub use kind::{BinStorage, TypeTag};
pub use merge::{merge_into, MergeError, MergeOutcome};
pub use store::{DqmStore, ElementStore};
pub use types::{normalize_name, split_name, MonitorElement, Payload};
