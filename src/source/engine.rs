//! Archive replay source
//!
//! [`DqmArchiveSource`] walks an ordered list of archive segments and tells
//! its driver what comes next: a segment boundary, a run, a lumi, or stop.
//! Element data is not read when a run or lumi is announced but when the
//! driver confirms that run or lumi has ended, so that everything belonging
//! to it has been seen.
//!
//! # Cursors
//!
//! Two cursors walk the traversal order of the open segment:
//!
//! - the **lookahead** cursor points at the record behind the next announced
//!   item and runs ahead, skipping records that continue the current group
//! - the **materialization** cursor points at the first record whose data has
//!   not been drained into the store yet
//!
//! ```text
//! order:  (1,0) (1,0) (1,1) (1,2)
//!           ^                 ^
//!        materialize       lookahead
//! ```

use crate::archive::SegmentOpener;
use crate::element::{ElementStore, TypeTag};
use crate::source::error::{SourceError, SourceResult};
use crate::source::index::{load_index, IndexRecord, Position, TraversalOrder};
use crate::source::reader::{ApplyOutcome, RecordReader};
use crate::source::types::{ItemType, LumiId, RunId, SegmentInfo, SourceStats};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, error, info, warn};

/// State of the currently open segment
struct OpenSegment {
    index: usize,
    location: String,
    records: Vec<IndexRecord>,
    order: TraversalOrder,
    readers: HashMap<TypeTag, RecordReader>,
    /// Record behind the next announced item
    lookahead: Option<Position>,
    /// First record not yet drained
    materialize: Option<Position>,
}

impl OpenSegment {
    fn record(&self, pos: Position) -> IndexRecord {
        self.records[self.order.record_index(pos)]
    }

    fn pending(&self) -> Option<IndexRecord> {
        self.lookahead.map(|pos| self.record(pos))
    }
}

/// Replays DQM archive segments into an element store
pub struct DqmArchiveSource<O: SegmentOpener> {
    file_names: Vec<String>,
    opener: O,
    next_segment: usize,
    next_item: ItemType,
    segment: Option<OpenSegment>,
    /// Run announced most recently in the open segment
    last_seen_run: Option<u32>,
    /// Names of elements booked from lumi-scoped rows
    lumi_elements: BTreeSet<String>,
    stats: SourceStats,
}

impl<O: SegmentOpener> DqmArchiveSource<O> {
    pub fn new(file_names: Vec<String>, opener: O) -> Self {
        let next_item = if file_names.is_empty() {
            ItemType::Stop
        } else {
            ItemType::SegmentBoundary
        };
        info!(segments = file_names.len(), "Created archive source");
        Self {
            file_names,
            opener,
            next_segment: 0,
            next_item,
            segment: None,
            last_seen_run: None,
            lumi_elements: BTreeSet::new(),
            stats: SourceStats::default(),
        }
    }

    pub fn next_item(&self) -> ItemType {
        self.next_item
    }

    pub fn file_names(&self) -> &[String] {
        &self.file_names
    }

    pub fn stats(&self) -> &SourceStats {
        &self.stats
    }

    /// Index of the open segment, if any
    pub fn current_segment(&self) -> Option<usize> {
        self.segment.as_ref().map(|s| s.index)
    }

    /// Names of lumi-scoped elements booked since the last lumi reset
    pub fn lumi_elements(&self) -> impl Iterator<Item = &str> {
        self.lumi_elements.iter().map(String::as_str)
    }

    /// Open the next segment in list order
    pub fn open_next_segment(&mut self) -> SourceResult<SegmentInfo> {
        self.open_segment(self.next_segment)
    }

    /// Open segment `index`, replacing any open one
    ///
    /// Replacing does not drain the old segment; call
    /// [`DqmArchiveSource::close_segment`] first for that.
    pub fn open_segment(&mut self, index: usize) -> SourceResult<SegmentInfo> {
        let location = self
            .file_names
            .get(index)
            .cloned()
            .ok_or(SourceError::NoSuchSegment(index))?;

        if let Some(previous) = self.segment.take() {
            warn!(
                segment = %previous.location,
                "Opening a segment while another is still open"
            );
        }

        let mut container = self
            .opener
            .open(&location)
            .map_err(|source| SourceError::Open {
                location: location.clone(),
                source,
            })?;
        let records = load_index(container.as_mut())?;
        let order = TraversalOrder::build(&records);

        // only kinds the index refers to need a table
        let kinds: BTreeSet<TypeTag> = records.iter().map(|r| r.type_tag).collect();
        let mut readers = HashMap::with_capacity(kinds.len());
        for kind in kinds {
            let table = container.table(kind.table_key())?.ok_or_else(|| {
                SourceError::MissingDataTable {
                    location: location.clone(),
                    table: kind.table_key().to_string(),
                }
            })?;
            readers.insert(kind, RecordReader::new(kind, table));
        }

        let groups = records
            .iter()
            .map(IndexRecord::run_lumi)
            .collect::<BTreeSet<_>>()
            .len();
        let info = SegmentInfo {
            index,
            location: location.clone(),
            records: records.len(),
            groups,
        };

        let first = order.first();
        self.segment = Some(OpenSegment {
            index,
            location,
            records,
            order,
            readers,
            lookahead: first,
            materialize: first,
        });
        self.next_segment = index + 1;
        self.last_seen_run = None;
        self.stats.segments_opened += 1;
        self.advance(true);

        info!(
            segment = %info.location,
            records = info.records,
            groups = info.groups,
            next = %self.next_item,
            "Opened archive segment"
        );
        Ok(info)
    }

    /// Identity of the run about to be read, without consuming it
    pub fn peek_run(&self) -> SourceResult<RunId> {
        self.require_next(ItemType::Run)?;
        self.pending_record().map(|r| RunId(r.run))
    }

    /// Identity of the lumi about to be read, without consuming it
    pub fn peek_lumi(&self) -> SourceResult<LumiId> {
        self.require_next(ItemType::Lumi)?;
        self.pending_record().map(|r| LumiId::new(r.run, r.lumi))
    }

    /// Consume the announced run
    ///
    /// When the pending record is lumi-scoped the run is synthetic and the
    /// same record is announced again as a lumi.
    pub fn read_run(&mut self) -> SourceResult<RunId> {
        let run = self.peek_run()?;
        self.last_seen_run = Some(run.0);
        self.advance(false);
        debug!(run = run.0, next = %self.next_item, "Read run");
        Ok(run)
    }

    /// Consume the announced lumi
    ///
    /// Every lumi-scoped element is reset to its empty state first.
    pub fn read_lumi(&mut self, store: &mut dyn ElementStore) -> SourceResult<LumiId> {
        let lumi = self.peek_lumi()?;

        for name in std::mem::take(&mut self.lumi_elements) {
            if let Some(element) = store.get_mut(&name) {
                element.reset();
            }
        }

        self.advance(false);
        debug!(run = lumi.run, lumi = lumi.lumi, next = %self.next_item, "Read lumi");
        Ok(lumi)
    }

    /// The driver finished `run`; drain its run-scoped data if it is next
    ///
    /// Returns whether anything was drained.
    pub fn confirm_run_end(
        &mut self,
        store: &mut dyn ElementStore,
        run: RunId,
    ) -> SourceResult<bool> {
        match self.undrained() {
            Some(record) if record.run == run.0 && record.lumi == 0 => {
                self.read_elements(store)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// The driver finished `lumi`; drain its data if it is next
    pub fn confirm_lumi_end(
        &mut self,
        store: &mut dyn ElementStore,
        lumi: LumiId,
    ) -> SourceResult<bool> {
        match self.undrained() {
            Some(record) if record.run_lumi() == (lumi.run, lumi.lumi) => {
                self.read_elements(store)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Close the open segment
    ///
    /// Unless the process is terminating, all data not yet drained is first
    /// materialized so nothing merged into the archive is lost.
    pub fn close_segment(
        &mut self,
        store: &mut dyn ElementStore,
        terminating: bool,
    ) -> SourceResult<()> {
        if self.segment.is_none() {
            return Ok(());
        }
        if !terminating {
            while self.undrained().is_some() {
                self.read_elements(store)?;
            }
        }
        if let Some(segment) = self.segment.take() {
            info!(segment = %segment.location, terminating, "Closed archive segment");
        }
        Ok(())
    }

    fn require_next(&self, item: ItemType) -> SourceResult<()> {
        if self.next_item == item {
            Ok(())
        } else {
            Err(SourceError::Protocol(format!(
                "cannot read a {} while the next item is a {}",
                item, self.next_item
            )))
        }
    }

    fn pending_record(&self) -> SourceResult<IndexRecord> {
        self.segment
            .as_ref()
            .and_then(OpenSegment::pending)
            .ok_or_else(|| SourceError::Protocol("no pending index record".to_string()))
    }

    fn undrained(&self) -> Option<IndexRecord> {
        let segment = self.segment.as_ref()?;
        segment.materialize.map(|pos| segment.record(pos))
    }

    /// Move the lookahead cursor past the current group and decide the next
    /// item
    ///
    /// `fresh` means the cursor already sits on the first record of a newly
    /// opened segment and nothing has been consumed yet.
    fn advance(&mut self, fresh: bool) {
        let end = if self.next_segment < self.file_names.len() {
            ItemType::SegmentBoundary
        } else {
            ItemType::Stop
        };
        let Some(segment) = self.segment.as_mut() else {
            self.next_item = end;
            return;
        };

        let mut previous = None;
        if !fresh {
            let Some(pos) = segment.lookahead else {
                self.next_item = end;
                return;
            };
            let record = segment.record(pos);
            if record.is_lumi() && self.next_item == ItemType::Run {
                // synthetic run; the same record is still owed as a lumi
                self.next_item = ItemType::Lumi;
                return;
            }
            previous = Some(record.run_lumi());
            segment.lookahead = segment.order.next(pos);
        }

        // run-scoped records of the same run never open a new item
        while let (Some(pos), Some((run, lumi))) = (segment.lookahead, previous) {
            let record = segment.record(pos);
            if record.run != run || (record.lumi != lumi && record.lumi != 0) {
                break;
            }
            previous = Some(record.run_lumi());
            segment.lookahead = segment.order.next(pos);
        }

        self.next_item = match segment.pending() {
            None => end,
            Some(record) if self.last_seen_run != Some(record.run) => ItemType::Run,
            Some(_) => ItemType::Lumi,
        };
    }

    /// Drain every record of the group at the materialization cursor
    fn read_elements(&mut self, store: &mut dyn ElementStore) -> SourceResult<()> {
        let segment = self
            .segment
            .as_mut()
            .ok_or_else(|| SourceError::Protocol("no open segment".to_string()))?;
        let Some(mut pos) = segment.materialize else {
            return Ok(());
        };
        let group = segment.record(pos).run_lumi();

        loop {
            let record = segment.record(pos);
            let reader = segment.readers.get(&record.type_tag).ok_or_else(|| {
                SourceError::MissingDataTable {
                    location: segment.location.clone(),
                    table: record.type_tag.table_key().to_string(),
                }
            })?;

            for row in record.rows() {
                let applied = reader.decode_and_apply(row, store, record.is_lumi())?;
                self.stats.rows_read += 1;
                match applied.outcome {
                    ApplyOutcome::Created => self.stats.elements_created += 1,
                    ApplyOutcome::Merged => self.stats.elements_merged += 1,
                    ApplyOutcome::Ignored => self.stats.contributions_ignored += 1,
                    ApplyOutcome::Failed(e) => {
                        self.stats.merge_failures += 1;
                        error!(
                            target: "merge_failure",
                            element = %applied.name,
                            run = record.run,
                            lumi = record.lumi,
                            error = %e,
                            "Dropped contribution that could not be merged"
                        );
                    }
                }
                if record.is_lumi() {
                    self.lumi_elements.insert(applied.name);
                }
            }
            self.stats.records_drained += 1;

            segment.materialize = segment.order.next(pos);
            match segment.materialize {
                Some(next) if segment.record(next).run_lumi() == group => pos = next,
                _ => break,
            }
        }

        debug!(run = group.0, lumi = group.1, "Drained records");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{Container, MemoryContainer, MemoryOpener, Table};
    use crate::element::{DqmStore, Histogram};
    use crate::source::index::index_table;
    use crate::source::reader::ElementRow;

    const PROCESSED: &str = "Det/EventInfo/processedEvents";

    /// Archive with one int row per index record, each record covering its
    /// own row, named and valued as given
    fn int_archive(location: &str, entries: &[(u32, u32, &str, i64)]) -> MemoryContainer {
        let mut ints = Table::new(TypeTag::Int.table_key());
        let mut records = Vec::new();
        for (i, (run, lumi, name, value)) in entries.iter().enumerate() {
            ints.push_row(&ElementRow::new(*name, *value)).unwrap();
            records.push(IndexRecord::new(*run, *lumi, TypeTag::Int, i as u64, i as u64));
        }
        MemoryContainer::new(location)
            .with_table(index_table(&records).unwrap())
            .with_table(ints)
    }

    fn source(containers: Vec<MemoryContainer>) -> DqmArchiveSource<MemoryOpener> {
        let names = containers.iter().map(|c| c.location().to_string()).collect();
        let mut opener = MemoryOpener::new();
        for container in containers {
            opener.register(container);
        }
        DqmArchiveSource::new(names, opener)
    }

    #[test]
    fn test_empty_list_stops() {
        let src = source(vec![]);
        assert_eq!(src.next_item(), ItemType::Stop);
    }

    #[test]
    fn test_spliced_duplicate_sums_run_data() {
        let archive = int_archive(
            "a",
            &[(1, 0, PROCESSED, 10), (1, 1, "Det/lumiInt", 1), (1, 0, PROCESSED, 5)],
        );
        let mut src = source(vec![archive]);
        let mut store = DqmStore::new();

        assert_eq!(src.next_item(), ItemType::SegmentBoundary);
        let info = src.open_next_segment().unwrap();
        assert_eq!(info.records, 3);
        assert_eq!(info.groups, 2);

        assert_eq!(src.next_item(), ItemType::Run);
        assert_eq!(src.read_run().unwrap(), RunId(1));
        assert_eq!(src.next_item(), ItemType::Lumi);
        assert_eq!(src.read_lumi(&mut store).unwrap(), LumiId::new(1, 1));
        assert_eq!(src.next_item(), ItemType::Stop);

        // the run group is first in traversal order, so the lumi is not next
        assert!(!src.confirm_lumi_end(&mut store, LumiId::new(1, 1)).unwrap());
        assert!(src.confirm_run_end(&mut store, RunId(1)).unwrap());
        assert_eq!(store.get(PROCESSED).unwrap().int_value(), Some(15));
        assert!(store.get("Det/lumiInt").is_none());

        src.close_segment(&mut store, true).unwrap();
        assert!(store.get("Det/lumiInt").is_none());
        assert_eq!(src.stats().records_drained, 2);
    }

    #[test]
    fn test_synthetic_run_before_lumi() {
        let archive = int_archive("a", &[(7, 3, "Det/x", 1), (7, 0, "Det/y", 2)]);
        let mut src = source(vec![archive]);
        let mut store = DqmStore::new();
        src.open_next_segment().unwrap();

        assert_eq!(src.next_item(), ItemType::Run);
        assert_eq!(src.peek_run().unwrap(), RunId(7));
        assert_eq!(src.read_run().unwrap(), RunId(7));
        assert_eq!(src.next_item(), ItemType::Lumi);
        assert_eq!(src.read_lumi(&mut store).unwrap(), LumiId::new(7, 3));
        // trailing run record of the same run is folded into the lumi group
        assert_eq!(src.next_item(), ItemType::Stop);

        assert!(src.confirm_lumi_end(&mut store, LumiId::new(7, 3)).unwrap());
        assert!(src.confirm_run_end(&mut store, RunId(7)).unwrap());
        assert!(store.get("Det/x").unwrap().is_lumi());
        assert!(!store.get("Det/y").unwrap().is_lumi());
    }

    #[test]
    fn test_item_sequence_over_runs() {
        let archive = int_archive(
            "a",
            &[
                (1, 1, "a", 0),
                (1, 2, "b", 0),
                (1, 0, "c", 0),
                (2, 0, "d", 0),
                (2, 1, "e", 0),
            ],
        );
        let mut src = source(vec![archive]);
        let mut store = DqmStore::new();
        src.open_next_segment().unwrap();

        let mut items = Vec::new();
        loop {
            match src.next_item() {
                ItemType::Run => items.push(format!("{}", src.read_run().unwrap())),
                ItemType::Lumi => items.push(format!("{}", src.read_lumi(&mut store).unwrap())),
                ItemType::SegmentBoundary | ItemType::Stop => break,
            }
        }
        assert_eq!(
            items,
            vec!["run 1", "run 1 lumi 1", "run 1 lumi 2", "run 2", "run 2 lumi 1"]
        );
    }

    #[test]
    fn test_max_rule_across_rows() {
        let archive = int_archive(
            "a",
            &[
                (1, 0, "Det/EventInfo/iLumiSection", 5),
                (1, 0, "Det/EventInfo/iLumiSection", 3),
                (1, 0, "Det/EventInfo/iEvent", 8),
                (1, 0, "Det/EventInfo/iEvent", 11),
            ],
        );
        let mut src = source(vec![archive]);
        let mut store = DqmStore::new();
        src.open_next_segment().unwrap();
        src.read_run().unwrap();
        src.confirm_run_end(&mut store, RunId(1)).unwrap();

        assert_eq!(
            store.get("Det/EventInfo/iLumiSection").unwrap().int_value(),
            Some(5)
        );
        assert_eq!(store.get("Det/EventInfo/iEvent").unwrap().int_value(), Some(11));
        assert_eq!(src.stats().elements_created, 2);
        assert_eq!(src.stats().elements_merged, 2);
    }

    #[test]
    fn test_lumi_elements_reset_at_next_lumi() {
        let archive = int_archive(
            "a",
            &[(1, 1, PROCESSED, 4), (1, 2, PROCESSED, 6)],
        );
        let mut src = source(vec![archive]);
        let mut store = DqmStore::new();
        src.open_next_segment().unwrap();
        src.read_run().unwrap();
        src.read_lumi(&mut store).unwrap();
        assert!(src.confirm_lumi_end(&mut store, LumiId::new(1, 1)).unwrap());
        assert_eq!(store.get(PROCESSED).unwrap().int_value(), Some(4));
        assert_eq!(src.lumi_elements().collect::<Vec<_>>(), vec![PROCESSED]);

        src.read_lumi(&mut store).unwrap();
        assert_eq!(store.get(PROCESSED).unwrap().int_value(), Some(0));
        assert_eq!(src.lumi_elements().count(), 0);

        assert!(src.confirm_lumi_end(&mut store, LumiId::new(1, 2)).unwrap());
        assert_eq!(store.get(PROCESSED).unwrap().int_value(), Some(6));
    }

    #[test]
    fn test_lumi_histogram_reset_at_next_lumi() {
        let mut ints = Table::new(TypeTag::Int.table_key());
        ints.push_row(&ElementRow::new(PROCESSED, 4i64)).unwrap();
        ints.push_row(&ElementRow::new(PROCESSED, 6i64)).unwrap();
        let mut hists = Table::new(TypeTag::TH1F.table_key());
        for value in [0.5, 2.5] {
            let mut h = Histogram::new_1d(4, 0.0, 4.0);
            h.fill(&[value], 1.0);
            hists.push_row(&ElementRow::new("Det/occupancy", h)).unwrap();
        }
        let records = vec![
            IndexRecord::new(1, 1, TypeTag::Int, 0, 0),
            IndexRecord::new(1, 1, TypeTag::TH1F, 0, 0),
            IndexRecord::new(1, 2, TypeTag::Int, 1, 1),
            IndexRecord::new(1, 2, TypeTag::TH1F, 1, 1),
        ];
        let archive = MemoryContainer::new("a")
            .with_table(index_table(&records).unwrap())
            .with_table(ints)
            .with_table(hists);

        let mut src = source(vec![archive]);
        let mut store = DqmStore::new();
        src.open_next_segment().unwrap();
        src.read_run().unwrap();
        src.read_lumi(&mut store).unwrap();
        assert!(src.confirm_lumi_end(&mut store, LumiId::new(1, 1)).unwrap());
        let occupancy = store.get("Det/occupancy").unwrap();
        assert!(occupancy.is_lumi());
        assert_eq!(occupancy.histogram().unwrap().bin_content(1, 0, 0), 1.0);

        src.read_lumi(&mut store).unwrap();
        let occupancy = store.get("Det/occupancy").unwrap().histogram().unwrap();
        assert_eq!(occupancy.sum(), 0.0);
        assert_eq!(occupancy.entries, 0.0);
        assert_eq!(occupancy.x.bins, 4);
        assert_eq!(store.get(PROCESSED).unwrap().int_value(), Some(0));

        assert!(src.confirm_lumi_end(&mut store, LumiId::new(1, 2)).unwrap());
        let occupancy = store.get("Det/occupancy").unwrap().histogram().unwrap();
        assert_eq!(occupancy.bin_content(1, 0, 0), 0.0);
        assert_eq!(occupancy.bin_content(3, 0, 0), 1.0);
        assert_eq!(store.get(PROCESSED).unwrap().int_value(), Some(6));
    }

    #[test]
    fn test_far_apart_extendable_ranges_fail_merge() {
        let far = 4_294_967_296.0;
        let mut hists = Table::new(TypeTag::TH1D.table_key());
        for min in [0.0, far] {
            let h = Histogram::new_1d(10, min, min + 10.0).extendable(true);
            hists.push_row(&ElementRow::new("H/wide", h)).unwrap();
        }
        let records = vec![IndexRecord::new(1, 0, TypeTag::TH1D, 0, 1)];
        let archive = MemoryContainer::new("a")
            .with_table(index_table(&records).unwrap())
            .with_table(hists);

        let mut src = source(vec![archive]);
        let mut store = DqmStore::new();
        src.open_next_segment().unwrap();
        src.read_run().unwrap();
        assert!(src.confirm_run_end(&mut store, RunId(1)).unwrap());

        assert_eq!(src.stats().merge_failures, 1);
        let wide = store.get("H/wide").unwrap().histogram().unwrap();
        assert_eq!(wide.x.bins, 10);
        assert_eq!(wide.x.min, 0.0);
    }

    #[test]
    fn test_merge_failure_per_mismatched_row() {
        let mut hists = Table::new(TypeTag::TH1F.table_key());
        for bins in [10u32, 20, 10, 30] {
            hists
                .push_row(&ElementRow::new("H/h", Histogram::new_1d(bins, 0.0, 10.0)))
                .unwrap();
        }
        let records = vec![IndexRecord::new(1, 0, TypeTag::TH1F, 0, 3)];
        let archive = MemoryContainer::new("a")
            .with_table(index_table(&records).unwrap())
            .with_table(hists);

        let mut src = source(vec![archive]);
        let mut store = DqmStore::new();
        src.open_next_segment().unwrap();
        src.read_run().unwrap();
        src.confirm_run_end(&mut store, RunId(1)).unwrap();

        let stats = src.stats();
        assert_eq!(stats.rows_read, 4);
        assert_eq!(stats.merge_failures, 2);
        assert_eq!(stats.elements_merged, 1);
        assert_eq!(store.get("H/h").unwrap().histogram().unwrap().x.bins, 10);
    }

    #[test]
    fn test_close_drains_remaining_unless_terminating() {
        let entries = [(1, 1, "Det/a", 1), (1, 2, "Det/b", 2), (1, 0, "Det/c", 3)];

        let mut src = source(vec![int_archive("a", &entries)]);
        let mut store = DqmStore::new();
        src.open_next_segment().unwrap();
        src.close_segment(&mut store, false).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(src.current_segment(), None);

        let mut src = source(vec![int_archive("a", &entries)]);
        let mut store = DqmStore::new();
        src.open_next_segment().unwrap();
        src.close_segment(&mut store, true).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_segments_in_list_order() {
        let first = int_archive("first", &[(1, 0, PROCESSED, 2)]);
        let second = int_archive("second", &[(1, 0, PROCESSED, 3)]);
        let mut src = source(vec![first, second]);
        let mut store = DqmStore::new();

        let info = src.open_next_segment().unwrap();
        assert_eq!(info.location, "first");
        src.read_run().unwrap();
        assert_eq!(src.next_item(), ItemType::SegmentBoundary);
        src.close_segment(&mut store, false).unwrap();

        let info = src.open_next_segment().unwrap();
        assert_eq!(info.index, 1);
        // run bookkeeping restarts with each segment
        assert_eq!(src.next_item(), ItemType::Run);
        src.read_run().unwrap();
        assert_eq!(src.next_item(), ItemType::Stop);
        src.close_segment(&mut store, false).unwrap();

        assert_eq!(store.get(PROCESSED).unwrap().int_value(), Some(5));
        assert_eq!(src.stats().segments_opened, 2);
    }

    #[test]
    fn test_protocol_errors() {
        let mut src = source(vec![int_archive("a", &[(1, 1, "x", 0)])]);
        let mut store = DqmStore::new();
        assert!(matches!(src.read_run(), Err(SourceError::Protocol(_))));

        src.open_next_segment().unwrap();
        assert!(matches!(
            src.read_lumi(&mut store),
            Err(SourceError::Protocol(_))
        ));
        assert!(matches!(
            src.open_segment(5),
            Err(SourceError::NoSuchSegment(5))
        ));
    }

    #[test]
    fn test_missing_tables_are_fatal() {
        let records = vec![IndexRecord::new(1, 0, TypeTag::TH2D, 0, 0)];
        let archive = MemoryContainer::new("a").with_table(index_table(&records).unwrap());
        let mut src = source(vec![archive]);
        assert!(matches!(
            src.open_next_segment(),
            Err(SourceError::MissingDataTable { .. })
        ));

        let mut src = source(vec![MemoryContainer::new("b")]);
        assert!(matches!(
            src.open_next_segment(),
            Err(SourceError::MissingIndexTable(_))
        ));

        let mut src = DqmArchiveSource::new(vec!["nowhere".to_string()], MemoryOpener::new());
        assert!(matches!(
            src.open_next_segment(),
            Err(SourceError::Open { .. })
        ));
    }

    #[test]
    fn test_empty_segment() {
        let archive = MemoryContainer::new("a").with_table(index_table(&[]).unwrap());
        let mut src = source(vec![archive]);
        src.open_next_segment().unwrap();
        assert_eq!(src.next_item(), ItemType::Stop);
    }
}
