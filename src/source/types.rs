//! Value types exchanged with the driver

use serde::Serialize;

/// What the driver should process next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// Close the current segment (if any) and open the next one
    SegmentBoundary,
    Run,
    Lumi,
    /// No further segments
    Stop,
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemType::SegmentBoundary => write!(f, "segment"),
            ItemType::Run => write!(f, "run"),
            ItemType::Lumi => write!(f, "lumi"),
            ItemType::Stop => write!(f, "stop"),
        }
    }
}

/// Run identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RunId(pub u32);

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run {}", self.0)
    }
}

/// Luminosity block identity within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct LumiId {
    pub run: u32,
    pub lumi: u32,
}

impl LumiId {
    pub fn new(run: u32, lumi: u32) -> Self {
        Self { run, lumi }
    }

    pub fn run_id(&self) -> RunId {
        RunId(self.run)
    }
}

impl std::fmt::Display for LumiId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run {} lumi {}", self.run, self.lumi)
    }
}

/// Summary of a freshly opened archive segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentInfo {
    pub index: usize,
    pub location: String,
    /// Index table rows
    pub records: usize,
    /// Distinct (run, lumi) pairs
    pub groups: usize,
}

/// Counters accumulated across all segments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub segments_opened: u64,
    pub records_drained: u64,
    pub rows_read: u64,
    pub elements_created: u64,
    pub elements_merged: u64,
    /// Contributions dropped by a first-value-wins rule
    pub contributions_ignored: u64,
    /// Contributions dropped because they could not be merged
    pub merge_failures: u64,
}

impl std::fmt::Display for SourceStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} segments, {} records, {} rows ({} created, {} merged, {} ignored, {} merge failures)",
            self.segments_opened,
            self.records_drained,
            self.rows_read,
            self.elements_created,
            self.elements_merged,
            self.contributions_ignored,
            self.merge_failures
        )
    }
}
